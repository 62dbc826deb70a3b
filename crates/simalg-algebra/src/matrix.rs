//! Square matrices over an arbitrary inner algebra
//!
//! Entries are stored row-major. Products respect the inner algebra's
//! operand order, so matrices over non-commutative payloads (including other
//! matrices) compose correctly. Inversion is Gauss-Jordan: the left inverse
//! is built from row operations, the right inverse from column operations.

use crate::{
    try_value, AlgebraError, AlgebraicElem, AlgebraicFactory, Coefficient, EvalOutcome,
    InvertResult, Magnitude, Side,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SquareMatrixFactory<F> {
    dim: usize,
    inner: F,
}

impl<F: AlgebraicFactory> SquareMatrixFactory<F> {
    pub fn new(dim: usize, inner: F) -> Self {
        Self { dim, inner }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    fn diagonal(&self, value: F::Elem) -> SquareMatrix<F::Elem> {
        let mut m = self.zero();
        for i in 0..self.dim {
            m.set(i, i, value.clone());
        }
        m
    }
}

impl<F: AlgebraicFactory> AlgebraicFactory for SquareMatrixFactory<F> {
    type Elem = SquareMatrix<F::Elem>;

    fn zero(&self) -> Self::Elem {
        SquareMatrix {
            dim: self.dim,
            entries: vec![self.inner.zero(); self.dim * self.dim],
            inner: self.inner.clone(),
        }
    }

    fn identity(&self) -> Self::Elem {
        self.diagonal(self.inner.identity())
    }

    fn coefficient(&self, value: &Coefficient) -> Self::Elem {
        self.diagonal(self.inner.coefficient(value))
    }

    fn is_mult_commutative(&self) -> bool {
        self.dim <= 1 && self.inner.is_mult_commutative()
    }
}

#[derive(Debug, Clone)]
pub struct SquareMatrix<E: AlgebraicElem> {
    dim: usize,
    entries: Vec<E>,
    inner: E::Factory,
}

impl<E: AlgebraicElem> SquareMatrix<E> {
    /// Build from rows; every row must have `rows.len()` entries.
    pub fn from_rows(inner: E::Factory, rows: Vec<Vec<E>>) -> Self {
        let dim = rows.len();
        assert!(
            rows.iter().all(|r| r.len() == dim),
            "square matrix rows must all have length {dim}"
        );
        Self {
            dim,
            entries: rows.into_iter().flatten().collect(),
            inner,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, row: usize, col: usize) -> &E {
        &self.entries[row * self.dim + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: E) {
        self.entries[row * self.dim + col] = value;
    }

    pub fn rows(&self) -> impl Iterator<Item = &[E]> {
        self.entries.chunks(self.dim.max(1))
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for c in 0..self.dim {
            self.entries.swap(a * self.dim + c, b * self.dim + c);
        }
    }

    fn swap_cols(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for r in 0..self.dim {
            self.entries.swap(r * self.dim + a, r * self.dim + b);
        }
    }

    /// row <- by * row
    fn scale_row_left(&mut self, row: usize, by: &E) -> EvalOutcome<()> {
        for c in 0..self.dim {
            let v = try_value!(by.multiply(self.get(row, c)));
            self.set(row, c, v);
        }
        EvalOutcome::Value(())
    }

    /// col <- col * by
    fn scale_col_right(&mut self, col: usize, by: &E) -> EvalOutcome<()> {
        for r in 0..self.dim {
            let v = try_value!(self.get(r, col).multiply(by));
            self.set(r, col, v);
        }
        EvalOutcome::Value(())
    }

    /// dest <- dest - factor * src
    fn subtract_row_left(&mut self, src: usize, dest: usize, factor: &E) -> EvalOutcome<()> {
        for c in 0..self.dim {
            let scaled = try_value!(factor.multiply(self.get(src, c)));
            let v = self.get(dest, c).subtract(&scaled);
            self.set(dest, c, v);
        }
        EvalOutcome::Value(())
    }

    /// dest <- dest - src * factor
    fn subtract_col_right(&mut self, src: usize, dest: usize, factor: &E) -> EvalOutcome<()> {
        for r in 0..self.dim {
            let scaled = try_value!(self.get(r, src).multiply(factor));
            let v = self.get(r, dest).subtract(&scaled);
            self.set(r, dest, v);
        }
        EvalOutcome::Value(())
    }

    fn left_pivot(&self, col: usize) -> InvertResult<(usize, E)> {
        for row in col..self.dim {
            match self.get(row, col).invert_left() {
                Ok(EvalOutcome::Value(inv)) => return Ok(EvalOutcome::Value((row, inv))),
                Ok(EvalOutcome::NeedsDistribution) => return Ok(EvalOutcome::NeedsDistribution),
                Err(_) => continue,
            }
        }
        Err(AlgebraError::not_invertible(
            Side::Left,
            format!("singular matrix: no invertible pivot in column {col}"),
        ))
    }

    fn right_pivot(&self, row: usize) -> InvertResult<(usize, E)> {
        for col in row..self.dim {
            match self.get(row, col).invert_right() {
                Ok(EvalOutcome::Value(inv)) => return Ok(EvalOutcome::Value((col, inv))),
                Ok(EvalOutcome::NeedsDistribution) => return Ok(EvalOutcome::NeedsDistribution),
                Err(_) => continue,
            }
        }
        Err(AlgebraError::not_invertible(
            Side::Right,
            format!("singular matrix: no invertible pivot in row {row}"),
        ))
    }

    fn gauss_jordan_left(&self) -> InvertResult<Self> {
        let mut work = self.clone();
        let mut ret = self.factory().identity();
        for col in 0..self.dim {
            let (row, inv) = try_value!(work.left_pivot(col)?);
            work.swap_rows(row, col);
            ret.swap_rows(row, col);
            try_value!(work.scale_row_left(col, &inv));
            try_value!(ret.scale_row_left(col, &inv));
            work.set(col, col, self.inner.identity());
            for dest in 0..self.dim {
                if dest == col {
                    continue;
                }
                let factor = work.get(dest, col).clone();
                try_value!(work.subtract_row_left(col, dest, &factor));
                try_value!(ret.subtract_row_left(col, dest, &factor));
                work.set(dest, col, self.inner.zero());
            }
        }
        Ok(EvalOutcome::Value(ret))
    }

    fn gauss_jordan_right(&self) -> InvertResult<Self> {
        let mut work = self.clone();
        let mut ret = self.factory().identity();
        for row in 0..self.dim {
            let (col, inv) = try_value!(work.right_pivot(row)?);
            work.swap_cols(col, row);
            ret.swap_cols(col, row);
            try_value!(work.scale_col_right(row, &inv));
            try_value!(ret.scale_col_right(row, &inv));
            work.set(row, row, self.inner.identity());
            for dest in 0..self.dim {
                if dest == row {
                    continue;
                }
                let factor = work.get(row, dest).clone();
                try_value!(work.subtract_col_right(row, dest, &factor));
                try_value!(ret.subtract_col_right(row, dest, &factor));
                work.set(row, dest, self.inner.zero());
            }
        }
        Ok(EvalOutcome::Value(ret))
    }
}

impl<E: AlgebraicElem> AlgebraicElem for SquareMatrix<E> {
    type Factory = SquareMatrixFactory<E::Factory>;

    fn factory(&self) -> Self::Factory {
        SquareMatrixFactory::new(self.dim, self.inner.clone())
    }

    fn add(&self, rhs: &Self) -> Self {
        debug_assert_eq!(self.dim, rhs.dim);
        Self {
            dim: self.dim,
            entries: self
                .entries
                .iter()
                .zip(&rhs.entries)
                .map(|(a, b)| a.add(b))
                .collect(),
            inner: self.inner.clone(),
        }
    }

    fn negate(&self) -> Self {
        Self {
            dim: self.dim,
            entries: self.entries.iter().map(AlgebraicElem::negate).collect(),
            inner: self.inner.clone(),
        }
    }

    fn multiply(&self, rhs: &Self) -> EvalOutcome<Self> {
        debug_assert_eq!(self.dim, rhs.dim);
        let n = self.dim;
        let mut out = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                let mut acc = self.inner.zero();
                for k in 0..n {
                    acc = acc.add(&try_value!(self.get(i, k).multiply(rhs.get(k, j))));
                }
                out.push(acc);
            }
        }
        EvalOutcome::Value(Self {
            dim: n,
            entries: out,
            inner: self.inner.clone(),
        })
    }

    fn invert_left(&self) -> InvertResult<Self> {
        self.gauss_jordan_left()
    }

    fn invert_right(&self) -> InvertResult<Self> {
        self.gauss_jordan_right()
    }
}

impl<E: AlgebraicElem + Magnitude> Magnitude for SquareMatrix<E> {
    /// Frobenius norm over entry magnitudes
    fn magnitude(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| {
                let m = e.magnitude();
                m * m
            })
            .sum::<f64>()
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Complex, ComplexFactory, F64Factory};

    fn real(rows: &[&[f64]]) -> SquareMatrix<f64> {
        SquareMatrix::from_rows(F64Factory, rows.iter().map(|r| r.to_vec()).collect())
    }

    fn max_identity_error(m: &SquareMatrix<f64>) -> f64 {
        let mut worst: f64 = 0.0;
        for i in 0..m.dim() {
            for j in 0..m.dim() {
                let expected = if i == j { 1.0 } else { 0.0 };
                worst = worst.max((m.get(i, j) - expected).abs());
            }
        }
        worst
    }

    #[test]
    fn test_left_and_right_inverse_3x3() {
        // zero in the leading position forces a pivot swap
        let a = real(&[&[0.0, 2.0, 1.0], &[1.0, 1.0, 0.0], &[3.0, 0.0, 4.0]]);

        let left = a.invert_left().unwrap().value().unwrap();
        let prod = left.multiply(&a).value().unwrap();
        assert!(max_identity_error(&prod) < 1e-12);

        let right = a.invert_right().unwrap().value().unwrap();
        let prod = a.multiply(&right).value().unwrap();
        assert!(max_identity_error(&prod) < 1e-12);
    }

    #[test]
    fn test_singular_matrix_is_not_invertible() {
        let a = real(&[&[1.0, 2.0], &[2.0, 4.0]]);
        match a.invert_left() {
            Err(AlgebraError::NotInvertible { side, .. }) => assert_eq!(side, Side::Left),
            other => panic!("expected NotInvertible, got {other:?}"),
        }
        assert!(a.invert_right().is_err());
    }

    #[test]
    fn test_factory_elements() {
        let fac = SquareMatrixFactory::new(2, F64Factory);
        let half = fac.coefficient(&Coefficient::rational(1, 2));
        assert_eq!(*half.get(0, 0), 0.5);
        assert_eq!(*half.get(0, 1), 0.0);
        assert!(!fac.is_mult_commutative());
        assert!(SquareMatrixFactory::new(1, F64Factory).is_mult_commutative());
        assert_eq!(fac.identity().magnitude(), 2f64.sqrt());
    }

    #[test]
    fn test_matrix_over_complex_inverts() {
        let fac = ComplexFactory::new(F64Factory);
        let a = SquareMatrix::from_rows(
            fac,
            vec![
                vec![Complex::new(1.0, 1.0), Complex::new(2.0, 0.0)],
                vec![Complex::new(0.0, -1.0), Complex::new(3.0, 0.5)],
            ],
        );
        let inv = a.invert_left().unwrap().value().unwrap();
        let prod = inv.multiply(&a).value().unwrap();
        let error = prod.subtract(&prod.factory().identity()).magnitude();
        assert!(error < 1e-12, "residual {error}");
    }
}
