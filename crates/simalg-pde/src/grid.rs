use crate::{PdeError, Result};
use simalg_algebra::{AlgebraicElem, AlgebraicFactory};

/// Dense `rows x width` grid of samples, indexed `[t][x]`. Rows are only
/// ever appended.
#[derive(Debug, Clone)]
pub struct Grid<V: AlgebraicElem> {
    rows: Vec<Vec<V>>,
    width: usize,
    fac: V::Factory,
}

impl<V: AlgebraicElem> Grid<V> {
    pub fn new(initial: Vec<Vec<V>>, fac: V::Factory) -> Result<Self> {
        let width = match initial.first() {
            Some(row) if !row.is_empty() => row.len(),
            _ => {
                return Err(PdeError::InvalidProblem(
                    "a grid needs at least one non-empty row".to_string(),
                ))
            }
        };
        if let Some(t) = initial.iter().position(|row| row.len() != width) {
            return Err(PdeError::InvalidProblem(format!(
                "row {t} has {} columns, expected {width}",
                initial[t].len()
            )));
        }
        Ok(Grid {
            rows: initial,
            width,
            fac,
        })
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn factory(&self) -> &V::Factory {
        &self.fac
    }

    pub fn get(&self, t: usize, x: usize) -> Option<&V> {
        self.rows.get(t).and_then(|row| row.get(x))
    }

    /// The sample at `(t, x)`, or zero anywhere outside the grid.
    pub fn neighbor(&self, t: i64, x: i64) -> V {
        usize::try_from(t)
            .ok()
            .zip(usize::try_from(x).ok())
            .and_then(|(t, x)| self.get(t, x))
            .cloned()
            .unwrap_or_else(|| self.fac.zero())
    }

    pub fn set(&mut self, t: usize, x: usize, value: V) {
        self.rows[t][x] = value;
    }

    pub fn row(&self, t: usize) -> &[V] {
        &self.rows[t]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[V]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Append a copy of the last row and return its index.
    pub fn extend_by_copy(&mut self) -> usize {
        let next = self.rows.last().cloned().unwrap_or_default();
        self.rows.push(next);
        self.rows.len() - 1
    }

    pub fn into_rows(self) -> Vec<Vec<V>> {
        self.rows
    }
}
