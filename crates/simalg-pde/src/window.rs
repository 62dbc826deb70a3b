//! The local implicit space a single cell is solved in
//!
//! A window spans the rows `t - 1 ..= t + 1` and the columns
//! `x - reach ..= x + reach`, so a reach of 1 is the 3x3 neighbourhood of a
//! second-order scheme and a reach of 2 the 3x5 one a third spatial
//! derivative needs.

use crate::grid::Grid;
use crate::{SPACE, TIME};
use simalg_algebra::{AlgebraicElem, AlgebraicFactory, Coefficient, EvalOutcome};
use simalg_solver::{GuessSpace, SolverError};
use simalg_symbolic::{ImplicitSpace, Leaf, SpaceToken};
use std::cell::Cell;
use std::fmt;

fn slot(reach: i64, dt: i64, dx: i64) -> Option<usize> {
    if (-1..=1).contains(&dt) && (-reach..=reach).contains(&dx) {
        Some(((dt + 1) * (2 * reach + 1) + (dx + reach)) as usize)
    } else {
        None
    }
}

/// Read counts per window cell, indexed by `(dt, dx)` relative to the cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Touches {
    reach: i64,
    counts: Vec<u64>,
}

impl Touches {
    pub fn get(&self, dt: i64, dx: i64) -> u64 {
        slot(self.reach, dt, dx).map_or(0, |i| self.counts[i])
    }

    pub fn touched(&self, dt: i64, dx: i64) -> bool {
        self.get(dt, dx) > 0
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

impl fmt::Display for Touches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for dt in -1..=1 {
            for dx in -self.reach..=self.reach {
                write!(f, "{:>5}", self.get(dt, dx))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Samples `G[t + dt][x + dx]` for `dt` in `-1..=1` and `dx` within the
/// reach. The `(+1, 0)` cell holds the Newton guess.
#[derive(Debug)]
pub struct Window<V: AlgebraicElem> {
    reach: i64,
    cells: Vec<V>,
    reads: Vec<Cell<u64>>,
    saved: Option<V>,
    token: SpaceToken,
}

impl<V: AlgebraicElem> Window<V> {
    /// The 3x3 window
    pub fn new(fac: &V::Factory) -> Self {
        Self::with_reach(fac, 1)
    }

    pub fn with_reach(fac: &V::Factory, reach: usize) -> Self {
        let len = 3 * (2 * reach + 1);
        Window {
            reach: reach as i64,
            cells: vec![fac.zero(); len],
            reads: (0..len).map(|_| Cell::new(0)).collect(),
            saved: None,
            token: SpaceToken::fresh(),
        }
    }

    pub fn reach(&self) -> usize {
        self.reach as usize
    }

    fn index(&self, dt: i64, dx: i64) -> Option<usize> {
        slot(self.reach, dt, dx)
    }

    fn guess_index(&self) -> usize {
        // (1, 0) always lies inside the window
        (2 * (2 * self.reach + 1) + self.reach) as usize
    }

    fn center_index(&self) -> usize {
        ((2 * self.reach + 1) + self.reach) as usize
    }

    /// Fill from `grid` around `(t, x)` and clear the read counters.
    pub fn load(&mut self, grid: &Grid<V>, t: usize, x: usize) {
        let (t, x) = (t as i64, x as i64);
        for dt in -1..=1 {
            for dx in -self.reach..=self.reach {
                if let Some(i) = self.index(dt, dx) {
                    self.cells[i] = grid.neighbor(t + dt, x + dx);
                }
            }
        }
        for r in &self.reads {
            r.set(0);
        }
        self.saved = None;
        self.token = SpaceToken::fresh();
    }

    pub fn get(&self, dt: i64, dx: i64) -> Option<&V> {
        self.index(dt, dx).map(|i| &self.cells[i])
    }

    /// Current guess for `G[t + 1][x]`
    pub fn guess(&self) -> &V {
        &self.cells[self.guess_index()]
    }

    /// Replace the `(0, 0)` sample by `u[t-1] + (s_prev + s_new) / 2`, where
    /// `s_prev = u[t] - u[t-1]` and `s_new = guess - u[t]`.
    pub fn correct_center(&mut self) -> Result<(), SolverError> {
        let center = self.center_index();
        let prev = &self.cells[center - (2 * self.reach + 1) as usize];
        let cur = &self.cells[center];
        let slope_prev = cur.subtract(prev);
        let slope_new = self.guess().subtract(cur);
        let half = prev.factory().coefficient(&Coefficient::rational(1, 2));
        let avg = match half.multiply(&slope_prev.add(&slope_new)) {
            EvalOutcome::Value(v) => v,
            EvalOutcome::NeedsDistribution => {
                return Err(SolverError::NeedsDistribution {
                    stage: "predictor-corrector",
                })
            }
        };
        let corrected = prev.add(&avg);
        self.cells[center] = corrected;
        self.bump();
        Ok(())
    }

    pub fn touches(&self) -> Touches {
        Touches {
            reach: self.reach,
            counts: self.reads.iter().map(Cell::get).collect(),
        }
    }

    fn bump(&mut self) {
        self.token = self.token.with_generation(self.token.generation() + 1);
    }
}

impl<V: AlgebraicElem> ImplicitSpace<V> for Window<V> {
    fn token(&self) -> SpaceToken {
        self.token
    }

    fn lookup(&self, leaf: &Leaf) -> Option<V> {
        let Leaf::Sample(offset) = leaf else {
            return None;
        };
        if offset.iter().any(|(ord, _)| ord != TIME && ord != SPACE) {
            return None;
        }
        let i = self.index(offset.get(TIME), offset.get(SPACE))?;
        let r = &self.reads[i];
        r.set(r.get() + 1);
        Some(self.cells[i].clone())
    }
}

impl<V: AlgebraicElem> GuessSpace<V> for Window<V> {
    fn perform_iteration_update(&mut self, delta: &V) {
        let i = self.guess_index();
        self.cells[i] = self.cells[i].add(delta);
        self.bump();
    }

    fn save_guess(&mut self) {
        self.saved = Some(self.guess().clone());
    }

    fn restore_guess(&mut self) {
        if let Some(saved) = self.saved.clone() {
            let i = self.guess_index();
            self.cells[i] = saved;
            self.bump();
        }
    }
}
