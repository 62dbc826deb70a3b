//! Solver configuration
//!
//! Sources, highest priority first:
//! 1. Environment variables (`SIMALG_NEWTON_*`)
//! 2. A JSON document
//! 3. Built-in defaults

use crate::policy::{FixedIterations, TerminationPolicy, Tolerance};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use simalg_algebra::{AlgebraicElem, Magnitude, Side};
use simalg_symbolic::{Expr, StagedNormalizer};
use std::env;

pub const ENV_ITERATIONS: &str = "SIMALG_NEWTON_ITERATIONS";
pub const ENV_TOLERANCE: &str = "SIMALG_NEWTON_TOLERANCE";
pub const ENV_SIDE: &str = "SIMALG_NEWTON_SIDE";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Json(String),

    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// When the iteration stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Always run `iterations` steps
    #[default]
    Fixed,
    /// Stop once the residual magnitude reaches `tolerance`, or after
    /// `max_iterations` steps
    Tolerance,
}

/// Rewriting applied to `F` and `dF` once, at construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Simplification {
    None,
    #[default]
    Distribute,
    Aggressive,
}

impl Simplification {
    pub fn apply<V: AlgebraicElem>(self, expr: Expr<V>) -> Expr<V> {
        match self {
            Simplification::None => expr,
            Simplification::Distribute => expr.distribute_simplify(),
            Simplification::Aggressive => StagedNormalizer::aggressive().normalize(expr).0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// A fresh cache for every evaluation of `F` or `dF`
    #[default]
    PerEvaluation,
    /// One cache for a whole `eval` call. Entries are dropped whenever the
    /// guess changes, so reuse is between `F` and `dF` at the same guess.
    SharedPerSolve,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewtonConfig {
    /// Iteration count for fixed termination
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    #[serde(default)]
    pub termination: Termination,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Handedness of the `dF` inverse
    #[serde(default)]
    pub side: Side,
    #[serde(default)]
    pub simplification: Simplification,
    #[serde(default)]
    pub cache_mode: CacheMode,
    /// Halve rejected steps in `eval_configured`
    #[serde(default)]
    pub backtrack: bool,
    #[serde(default = "default_max_backtrack")]
    pub max_backtrack: usize,
}

fn default_iterations() -> usize {
    20
}

fn default_tolerance() -> f64 {
    1e-12
}

fn default_max_iterations() -> usize {
    100
}

fn default_max_backtrack() -> usize {
    100
}

impl Default for NewtonConfig {
    fn default() -> Self {
        NewtonConfig {
            iterations: default_iterations(),
            termination: Termination::default(),
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            side: Side::default(),
            simplification: Simplification::default(),
            cache_mode: CacheMode::default(),
            backtrack: false,
            max_backtrack: default_max_backtrack(),
        }
    }
}

impl NewtonConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: NewtonConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Json(e.to_string()))
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64, max_iterations: usize) -> Self {
        self.termination = Termination::Tolerance;
        self.tolerance = tolerance;
        self.max_iterations = max_iterations;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.termination == Termination::Tolerance {
            if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
                return Err(ConfigError::Invalid {
                    field: "tolerance",
                    reason: format!("must be finite and non-negative, got {}", self.tolerance),
                });
            }
            if self.max_iterations == 0 {
                return Err(ConfigError::Invalid {
                    field: "max_iterations",
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Apply `SIMALG_NEWTON_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Values that fail to parse are
    /// reported and ignored.
    pub fn apply_overrides_from<L>(&mut self, lookup: L)
    where
        L: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_ITERATIONS) {
            match raw.trim().parse::<usize>() {
                Ok(n) => {
                    debug!("{ENV_ITERATIONS} override: {n}");
                    self.iterations = n;
                }
                Err(_) => warn!("ignoring {ENV_ITERATIONS}={raw:?}: not an iteration count"),
            }
        }

        if let Some(raw) = lookup(ENV_TOLERANCE) {
            match raw.trim().parse::<f64>() {
                Ok(tol) if tol.is_finite() && tol >= 0.0 => {
                    debug!("{ENV_TOLERANCE} override: {tol}");
                    self.termination = Termination::Tolerance;
                    self.tolerance = tol;
                }
                _ => warn!("ignoring {ENV_TOLERANCE}={raw:?}: not a tolerance"),
            }
        }

        if let Some(raw) = lookup(ENV_SIDE) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "left" => self.side = Side::Left,
                "right" => self.side = Side::Right,
                _ => warn!("ignoring {ENV_SIDE}={raw:?}: expected left or right"),
            }
        }
    }

    /// The termination policy this configuration describes.
    pub fn termination_policy<V: Magnitude>(&self) -> Box<dyn TerminationPolicy<V>> {
        match self.termination {
            Termination::Fixed => Box::new(FixedIterations::new(self.iterations)),
            Termination::Tolerance => {
                Box::new(Tolerance::new(self.tolerance, self.max_iterations))
            }
        }
    }
}
