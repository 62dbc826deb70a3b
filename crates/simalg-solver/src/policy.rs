//! Termination policies

use simalg_algebra::Magnitude;

/// Decides, before each iteration, whether the solve is finished. `residual`
/// is the value of `F` at the current guess.
pub trait TerminationPolicy<V> {
    /// Called once at the start of every solve.
    fn reset(&mut self) {}

    fn iterations_done(&mut self, residual: &V) -> bool;
}

impl<V, P: TerminationPolicy<V> + ?Sized> TerminationPolicy<V> for Box<P> {
    fn reset(&mut self) {
        (**self).reset()
    }

    fn iterations_done(&mut self, residual: &V) -> bool {
        (**self).iterations_done(residual)
    }
}

/// Run exactly `limit` iterations; the residual is never inspected.
#[derive(Debug, Clone)]
pub struct FixedIterations {
    limit: usize,
    done: usize,
}

impl FixedIterations {
    pub fn new(limit: usize) -> Self {
        FixedIterations { limit, done: 0 }
    }

    pub fn completed(&self) -> usize {
        self.done
    }
}

impl<V> TerminationPolicy<V> for FixedIterations {
    fn reset(&mut self) {
        self.done = 0;
    }

    fn iterations_done(&mut self, _residual: &V) -> bool {
        if self.done >= self.limit {
            return true;
        }
        self.done += 1;
        false
    }
}

/// Stop once `|F| <= tolerance`, or after `max_iterations`.
#[derive(Debug, Clone)]
pub struct Tolerance {
    tolerance: f64,
    max_iterations: usize,
    done: usize,
}

impl Tolerance {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Tolerance {
            tolerance,
            max_iterations,
            done: 0,
        }
    }

    pub fn completed(&self) -> usize {
        self.done
    }
}

impl<V: Magnitude> TerminationPolicy<V> for Tolerance {
    fn reset(&mut self) {
        self.done = 0;
    }

    fn iterations_done(&mut self, residual: &V) -> bool {
        if residual.magnitude() <= self.tolerance || self.done >= self.max_iterations {
            return true;
        }
        self.done += 1;
        false
    }
}

/// Improvement test for backtracking: the step did not grow the residual.
pub fn residual_decreased<V: Magnitude>(last: &V, next: &V) -> bool {
    next.magnitude() <= last.magnitude()
}
