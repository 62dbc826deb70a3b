//! simalg PDE driver
//!
//! A dense time/space [`Grid`] is advanced one row at a time. For every cell
//! of the new row a [`Window`] around `(t, x)` is filled from the grid (zero
//! outside it) and handed to a Newton-Raphson solver whose unknown is the
//! window's `(t + 1, x)` sample. [`burgers`] builds that solver for the
//! viscous Burgers' equation on a 3x3 window, [`kdv`] for the
//! Korteweg-de Vries equation on a 3x5 one.

pub mod burgers;
mod grid;
pub mod kdv;
mod stepper;
mod window;

pub use burgers::{solve, BurgersProblem};
pub use grid::Grid;
pub use kdv::{KdvProblem, KDV_REACH};
pub use stepper::{CellObserver, CellReport, NoopObserver, TimeStepper};
pub use window::{Touches, Window};

use simalg_solver::SolverError;
use simalg_symbolic::Ordinate;

/// Ordinate of the time axis in sample offsets
pub const TIME: Ordinate = Ordinate(0);
/// Ordinate of the space axis in sample offsets
pub const SPACE: Ordinate = Ordinate(1);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PdeError {
    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error("solve failed at t={t}, x={x}: {source}")]
    Cell {
        t: usize,
        x: usize,
        #[source]
        source: SolverError,
    },

    #[error("invalid problem: {0}")]
    InvalidProblem(String),

    #[error("malformed problem description: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, PdeError>;
