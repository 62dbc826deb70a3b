//! Viscous Burgers' equation `u_t + u u_x = nu u_xx`
//!
//! Discretised with central differences in both axes, the residual at
//! `(t, x)` is
//!
//! ```text
//! F = nu (u[x+1] - 2u + u[x-1]) / dx^2
//!   - u (u[x+1] - u[x-1]) / 2dx
//!   - (u[t+1] - u[t-1]) / 2dt
//! ```
//!
//! and each cell solves `F = 0` for `u[t+1]`.

use crate::grid::Grid;
use crate::stepper::{CellObserver, NoopObserver, TimeStepper};
use crate::{PdeError, Result, SPACE, TIME};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use simalg_algebra::{Coefficient, F64Factory};
use simalg_solver::{NewtonConfig, NewtonRaphson};
use simalg_symbolic::{DerivativeOp, Expr, ExprFactory, Leaf, Offset, StepSizes, SymbolicSpace};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurgersProblem {
    /// Rows of the finished grid, the two seeded rows included
    #[serde(default = "default_time_rows")]
    pub time_rows: usize,
    #[serde(default = "default_space_columns")]
    pub space_columns: usize,
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_dx")]
    pub dx: f64,
    #[serde(default = "default_viscosity")]
    pub viscosity: f64,
    /// Column of the initial bump
    #[serde(default = "default_bump_column")]
    pub bump_column: usize,
    /// The bump is `bump_height * dx^2`
    #[serde(default = "default_bump_height")]
    pub bump_height: f64,
    #[serde(default)]
    pub newton: NewtonConfig,
}

fn default_time_rows() -> usize {
    400
}

fn default_space_columns() -> usize {
    25
}

fn default_dt() -> f64 {
    0.0025
}

fn default_dx() -> f64 {
    0.01
}

fn default_viscosity() -> f64 {
    1e-8
}

fn default_bump_column() -> usize {
    12
}

fn default_bump_height() -> f64 {
    10000.0
}

impl Default for BurgersProblem {
    fn default() -> Self {
        BurgersProblem {
            time_rows: default_time_rows(),
            space_columns: default_space_columns(),
            dt: default_dt(),
            dx: default_dx(),
            viscosity: default_viscosity(),
            bump_column: default_bump_column(),
            bump_height: default_bump_height(),
            newton: NewtonConfig::default(),
        }
    }
}

impl BurgersProblem {
    pub fn from_json(text: &str) -> Result<Self> {
        let problem: BurgersProblem =
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
        if !self.viscosity.is_finite() {
            return invalid(format!("viscosity must be finite, got {}", self.viscosity));
        }
        if self.bump_column >= self.space_columns {
            return invalid(format!(
                "bump_column {} is outside {} columns",
                self.bump_column, self.space_columns
            ));
        }
        self.newton
            .validate()
            .map_err(|e| PdeError::InvalidProblem(e.to_string()))
    }

    /// Zero except for the bump.
    pub fn initial_row(&self) -> Vec<f64> {
        let mut row = vec![0.0; self.space_columns];
        if let Some(cell) = row.get_mut(self.bump_column) {
            *cell = self.bump_height * (self.dx * self.dx);
        }
        row
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

    /// `F` as a first-level expression over the sample `u` at the cell.
    pub fn function(&self) -> Expr<Expr<f64>> {
        let fac = ExprFactory::new(F64Factory);
        let op = |ord, order| Expr::operator(DerivativeOp::partial(ord, order), fac.clone());

        let u: Expr<Expr<f64>> = Expr::leaf(Leaf::sample(Offset::zero()), fac.clone());
        let u_x = op(SPACE, 1).times(&u);
        let u_xx = op(SPACE, 1).times(&u_x);
        let u_t = op(TIME, 1).times(&u);
        let nu = Expr::constant(Expr::constant(self.viscosity));

        u_xx.times(&nu).minus(&u.times(&u_x)).minus(&u_t)
    }

    pub fn solver(&self) -> Result<NewtonRaphson<f64>> {
        let solver = NewtonRaphson::construct(
            &self.function(),
            Self::unknown(),
            &SymbolicSpace::new(F64Factory),
            self.step_sizes(),
            self.newton.clone(),
        )?;
        trace!("burgers F = {}", solver.function());
        trace!("burgers dF = {}", solver.derivative());
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
            "burgers: {} x {} grid, dt={}, dx={}, nu={}",
            self.time_rows, self.space_columns, self.dt, self.dx, self.viscosity
        );

        let solver = self.solver()?;
        let mut grid = Grid::new(vec![initial.clone(), initial], F64Factory)?;
        TimeStepper::new(&solver, self.time_rows).march_with_observer(&mut grid, observer)?;
        Ok(grid)
    }
}

/// Solve Burgers' equation from `initial_row` over `time_steps` rows with the
/// default solver settings.
pub fn solve(
    initial_row: &[f64],
    time_steps: usize,
    space_steps: usize,
    dt: f64,
    dx: f64,
    viscosity: f64,
) -> Result<Grid<f64>> {
    let problem = BurgersProblem {
        time_rows: time_steps,
        space_columns: space_steps,
        dt,
        dx,
        viscosity,
        bump_column: 0,
        ..BurgersProblem::default()
    };
    problem.solve_from_row(initial_row.to_vec(), &mut NoopObserver)
}
