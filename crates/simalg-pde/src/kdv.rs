//! Korteweg-de Vries equation `u_t + u u_x = V u_xxx`
//!
//! The third spatial derivative is the five-point central difference, so
//! every cell is solved in a window reaching two columns to each side:
//!
//! ```text
//! F = V (u[x+2] - 2u[x+1] + 2u[x-1] - u[x-2]) / 2dx^3
//!   - u (u[x+1] - u[x-1]) / 2dx
//!   - (u[t+1] - u[t-1]) / 2dt
//! ```
//!
//! Rows after the first solved one are refined with the predictor-corrector
//! unless it is switched off.

use crate::grid::Grid;
use crate::stepper::{CellObserver, NoopObserver, TimeStepper};
use crate::{PdeError, Result, SPACE, TIME};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use simalg_algebra::{Coefficient, F64Factory};
use simalg_solver::{NewtonConfig, NewtonRaphson};
use simalg_symbolic::{DerivativeOp, Expr, ExprFactory, Leaf, Offset, StepSizes, SymbolicSpace};

/// Columns the `u_xxx` stencil reaches on either side
pub const KDV_REACH: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KdvProblem {
    /// Rows of the finished grid, the two seeded rows included
    #[serde(default = "default_time_rows")]
    pub time_rows: usize,
    #[serde(default = "default_space_columns")]
    pub space_columns: usize,
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_dx")]
    pub dx: f64,
    /// Coefficient `V` of `u_xxx`
    #[serde(default = "default_dispersion")]
    pub dispersion: f64,
    #[serde(default = "default_bump_center")]
    pub bump_center: usize,
    /// Half-width of the plateau in columns
    #[serde(default = "default_bump_radius")]
    pub bump_radius: f64,
    /// The plateau is `bump_height * dx^2`
    #[serde(default = "default_bump_height")]
    pub bump_height: f64,
    #[serde(default = "default_predictor_corrector")]
    pub predictor_corrector: bool,
    #[serde(default)]
    pub newton: NewtonConfig,
}

fn default_time_rows() -> usize {
    150
}

fn default_space_columns() -> usize {
    25
}

fn default_dt() -> f64 {
    0.0025
}

// 0.1 wide, 25 columns
fn default_dx() -> f64 {
    0.004
}

fn default_dispersion() -> f64 {
    1e-8
}

fn default_bump_center() -> usize {
    12
}

fn default_bump_radius() -> f64 {
    2.5
}

fn default_bump_height() -> f64 {
    10000.0
}

fn default_predictor_corrector() -> bool {
    true
}

impl Default for KdvProblem {
    fn default() -> Self {
        KdvProblem {
            time_rows: default_time_rows(),
            space_columns: default_space_columns(),
            dt: default_dt(),
            dx: default_dx(),
            dispersion: default_dispersion(),
            bump_center: default_bump_center(),
            bump_radius: default_bump_radius(),
            bump_height: default_bump_height(),
            predictor_corrector: default_predictor_corrector(),
            newton: NewtonConfig::default(),
        }
    }
}

impl KdvProblem {
    pub fn from_json(text: &str) -> Result<Self> {
        let problem: KdvProblem =
            serde_json::from_str(text).map_err(|e| PdeError::Json(e.to_string()))?;
        problem.validate()?;
        Ok(problem)
    }

    /// Apply `SIMALG_NEWTON_*` overrides to the solver settings.
    pub fn apply_env_overrides(&mut self) {
        self.newton.apply_env_overrides();
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(PdeError::InvalidProblem(msg));
        if self.time_rows < 2 {
            return invalid(format!("time_rows must be at least 2, got {}", self.time_rows));
        }
        if self.space_columns == 0 {
            return invalid("space_columns must be positive".to_string());
        }
        for (name, step) in [("dt", self.dt), ("dx", self.dx)] {
            if !(step.is_finite() && step > 0.0) {
                return invalid(format!("{name} must be a positive step, got {step}"));
            }
        }
        if !self.dispersion.is_finite() {
            return invalid(format!("dispersion must be finite, got {}", self.dispersion));
        }
        if !(self.bump_radius.is_finite() && self.bump_radius > 0.0) {
            return invalid(format!(
                "bump_radius must be positive, got {}",
                self.bump_radius
            ));
        }
        if self.bump_center >= self.space_columns {
            return invalid(format!(
                "bump_center {} is outside {} columns",
                self.bump_center, self.space_columns
            ));
        }
        self.newton
            .validate()
            .map_err(|e| PdeError::InvalidProblem(e.to_string()))
    }

    /// A plateau of `bump_height * dx^2` on the columns strictly within
    /// `bump_radius` of `bump_center`, zero elsewhere.
    pub fn initial_row(&self) -> Vec<f64> {
        let height = self.bump_height * (self.dx * self.dx);
        (0..self.space_columns)
            .map(|x| {
                let d = (x as f64 - self.bump_center as f64) / self.bump_radius;
                if d * d < 1.0 {
                    height
                } else {
                    0.0
                }
            })
            .collect()
    }

    pub fn step_sizes(&self) -> StepSizes {
        StepSizes::new()
            .with(TIME, Coefficient::from_decimal(self.dt))
            .with(SPACE, Coefficient::from_decimal(self.dx))
    }

    /// The unknown each cell solves for: `u[t+1]`
    pub fn unknown() -> Leaf {
        Leaf::sample(Offset::along(TIME, 1))
    }

    pub fn function(&self) -> Expr<Expr<f64>> {
        let fac = ExprFactory::new(F64Factory);
        let d = |ord| Expr::operator(DerivativeOp::partial(ord, 1), fac.clone());

        let u: Expr<Expr<f64>> = Expr::leaf(Leaf::sample(Offset::zero()), fac.clone());
        let u_x = d(SPACE).times(&u);
        // the three first-order operators merge into one third-order stencil
        let u_xxx = d(SPACE).times(&d(SPACE).times(&u_x));
        let u_t = d(TIME).times(&u);
        let v = Expr::constant(Expr::constant(self.dispersion));

        u_xxx.times(&v).minus(&u.times(&u_x)).minus(&u_t)
    }

    pub fn solver(&self) -> Result<NewtonRaphson<f64>> {
        let solver = NewtonRaphson::construct(
            &self.function(),
            Self::unknown(),
            &SymbolicSpace::new(F64Factory),
            self.step_sizes(),
            self.newton.clone(),
        )?;
        trace!("kdv F = {}", solver.function());
        trace!("kdv dF = {}", solver.derivative());
        Ok(solver)
    }

    pub fn solve(&self) -> Result<Grid<f64>> {
        self.solve_with_observer(&mut NoopObserver)
    }

    pub fn solve_with_observer<O>(&self, observer: &mut O) -> Result<Grid<f64>>
    where
        O: CellObserver<f64> + ?Sized,
    {
        self.solve_from_row(self.initial_row(), observer)
    }

    /// March from `initial`, seeded into rows 0 and 1.
    pub fn solve_from_row<O>(&self, initial: Vec<f64>, observer: &mut O) -> Result<Grid<f64>>
    where
        O: CellObserver<f64> + ?Sized,
    {
        self.validate()?;
        if initial.len() != self.space_columns {
            return Err(PdeError::InvalidProblem(format!(
                "initial row has {} columns, expected {}",
                initial.len(),
                self.space_columns
            )));
        }
        debug!(
            "kdv: {} x {} grid, dt={}, dx={}, V={}, corrector={}",
            self.time_rows, self.space_columns, self.dt, self.dx, self.dispersion,
            self.predictor_corrector
        );

        let solver = self.solver()?;
        let mut grid = Grid::new(vec![initial.clone(), initial], F64Factory)?;
        TimeStepper::new(&solver, self.time_rows)
            .with_reach(KDV_REACH)
            .with_predictor_corrector(self.predictor_corrector)
            .march_with_observer(&mut grid, observer)?;
        Ok(grid)
    }
}
