//! simalg Newton-Raphson solver
//!
//! [`NewtonRaphson`] takes a first-level symbolic function (an
//! `Expr<Expr<V>>` whose leaves lift to grid samples), forms `F` and its
//! partial derivative `dF` with respect to one unknown once, and then runs
//! the iteration `x <- x - dF^-1 F` against any [`GuessSpace`].

pub mod config;
mod newton;
mod policy;

pub use config::{CacheMode, ConfigError, NewtonConfig, Simplification, Termination};
pub use newton::{GuessSpace, NewtonRaphson};
pub use policy::{residual_decreased, FixedIterations, TerminationPolicy, Tolerance};

use simalg_algebra::AlgebraError;
use simalg_symbolic::SymbolicError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverError {
    #[error(transparent)]
    NotInvertible(#[from] AlgebraError),

    #[error("{stage} needs a distribution that cannot be expanded")]
    NeedsDistribution { stage: &'static str },

    #[error(transparent)]
    Symbolic(SymbolicError),

    #[error("invalid solver configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<SymbolicError> for SolverError {
    fn from(err: SymbolicError) -> Self {
        match err {
            SymbolicError::NotInvertible(e) => SolverError::NotInvertible(e),
            SymbolicError::NeedsDistribution => SolverError::NeedsDistribution {
                stage: "evaluation",
            },
            other => SolverError::Symbolic(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;
