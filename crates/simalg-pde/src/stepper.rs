//! Time marching
//!
//! For each row `t` from the last seeded row up to `height - 2`:
//! predict `G[t+1] := G[t]`, then for every column load the window around
//! `(t, x)`, run the solver and write the updated guess into `G[t+1][x]`.
//!
//! With the predictor-corrector enabled, rows past the first solved one get a
//! second solve after the window's centre sample is replaced by the
//! slope-averaged value (see [`Window::correct_center`]).

use crate::grid::Grid;
use crate::window::{Touches, Window};
use crate::{PdeError, Result};
use log::{debug, trace};
use simalg_algebra::AlgebraicElem;
use simalg_solver::NewtonRaphson;

/// What one cell solve produced
#[derive(Debug)]
pub struct CellReport<'a, V> {
    pub t: usize,
    pub x: usize,
    /// `F` at the final guess
    pub residual: &'a V,
    /// The value written into `G[t+1][x]`
    pub value: &'a V,
    pub touches: Touches,
}

pub trait CellObserver<V> {
    fn observe(&mut self, report: &CellReport<'_, V>);
}

impl<V, F: FnMut(&CellReport<'_, V>)> CellObserver<V> for F {
    fn observe(&mut self, report: &CellReport<'_, V>) {
        self(report)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<V> CellObserver<V> for NoopObserver {
    fn observe(&mut self, _report: &CellReport<'_, V>) {}
}

pub struct TimeStepper<'a, V: AlgebraicElem> {
    solver: &'a NewtonRaphson<V>,
    time_rows: usize,
    reach: usize,
    corrector: bool,
}

impl<'a, V: AlgebraicElem> TimeStepper<'a, V> {
    /// March until the grid has `time_rows` rows, with a 3x3 window.
    pub fn new(solver: &'a NewtonRaphson<V>, time_rows: usize) -> Self {
        TimeStepper {
            solver,
            time_rows,
            reach: 1,
            corrector: false,
        }
    }

    /// Spatial half-width of the window; must cover the widest stencil.
    pub fn with_reach(mut self, reach: usize) -> Self {
        self.reach = reach;
        self
    }

    pub fn with_predictor_corrector(mut self, enabled: bool) -> Self {
        self.corrector = enabled;
        self
    }

    pub fn march(&self, grid: &mut Grid<V>) -> Result<()> {
        self.march_with_observer(grid, &mut NoopObserver)
    }

    pub fn march_with_observer<O>(&self, grid: &mut Grid<V>, observer: &mut O) -> Result<()>
    where
        O: CellObserver<V> + ?Sized,
    {
        if grid.height() < 2 {
            return Err(PdeError::InvalidProblem(
                "time marching needs two seeded rows".to_string(),
            ));
        }
        let first = grid.height() - 1;
        let mut window: Window<V> = Window::with_reach(grid.factory(), self.reach);

        for t in first..self.time_rows.saturating_sub(1) {
            let next = grid.extend_by_copy();
            debug_assert_eq!(next, t + 1);
            for x in 0..grid.width() {
                window.load(grid, t, x);
                let cell = |source| PdeError::Cell { t, x, source };
                let mut residual = self.solver.eval(&mut window).map_err(cell)?;
                if self.corrector && t > 1 {
                    window.correct_center().map_err(cell)?;
                    residual = self.solver.eval(&mut window).map_err(cell)?;
                }
                let value = window.guess().clone();
                observer.observe(&CellReport {
                    t,
                    x,
                    residual: &residual,
                    value: &value,
                    touches: window.touches(),
                });
                grid.set(next, x, value);
            }
            trace!("advanced to row {next}");
        }
        debug!(
            "marched {} rows of width {}",
            grid.height().saturating_sub(first + 1),
            grid.width()
        );
        Ok(())
    }
}
