//! Complex numbers over an arbitrary inner algebra
//!
//! `num_complex::Complex<E>` is used directly as the payload. Products follow
//! `(a + bi)(c + di) = (ac - bd) + (ad + bc)i` with every inner product kept in
//! operand order, which makes the type usable over non-commutative inners.

use crate::{
    try_value, AlgebraicElem, AlgebraicFactory, Coefficient, EvalOutcome, InvertResult,
    Magnitude, Side, SquareMatrix,
};
use num_complex::Complex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComplexFactory<F> {
    inner: F,
}

impl<F> ComplexFactory<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl<F: AlgebraicFactory> AlgebraicFactory for ComplexFactory<F> {
    type Elem = Complex<F::Elem>;

    fn zero(&self) -> Self::Elem {
        Complex::new(self.inner.zero(), self.inner.zero())
    }

    fn identity(&self) -> Self::Elem {
        Complex::new(self.inner.identity(), self.inner.zero())
    }

    fn coefficient(&self, value: &Coefficient) -> Self::Elem {
        Complex::new(self.inner.coefficient(value), self.inner.zero())
    }

    fn is_mult_commutative(&self) -> bool {
        self.inner.is_mult_commutative()
    }
}

/// Inverse through the modulus when the inner algebra commutes, otherwise
/// through the 2x2 real representation `[[a, b], [-b, a]]`.
fn invert_complex<E: AlgebraicElem>(z: &Complex<E>, side: Side) -> InvertResult<Complex<E>> {
    let fac = z.re.factory();
    if fac.is_mult_commutative() {
        let re2 = try_value!(z.re.multiply(&z.re));
        let im2 = try_value!(z.im.multiply(&z.im));
        let div = try_value!(re2.add(&im2).invert(side)?);
        let re = try_value!(z.re.multiply(&div));
        let im = try_value!(z.im.multiply(&div));
        return Ok(EvalOutcome::Value(Complex::new(re, im.negate())));
    }

    let repr = SquareMatrix::from_rows(
        fac,
        vec![
            vec![z.re.clone(), z.im.clone()],
            vec![z.im.negate(), z.re.clone()],
        ],
    );
    let inv = try_value!(repr.invert(side)?);
    // [1, 0] * inv is the first row
    Ok(EvalOutcome::Value(Complex::new(
        inv.get(0, 0).clone(),
        inv.get(0, 1).clone(),
    )))
}

impl<E: AlgebraicElem> AlgebraicElem for Complex<E> {
    type Factory = ComplexFactory<E::Factory>;

    fn factory(&self) -> Self::Factory {
        ComplexFactory::new(self.re.factory())
    }

    fn add(&self, rhs: &Self) -> Self {
        Complex::new(self.re.add(&rhs.re), self.im.add(&rhs.im))
    }

    fn negate(&self) -> Self {
        Complex::new(self.re.negate(), self.im.negate())
    }

    fn multiply(&self, rhs: &Self) -> EvalOutcome<Self> {
        let ac = try_value!(self.re.multiply(&rhs.re));
        let bd = try_value!(self.im.multiply(&rhs.im));
        let ad = try_value!(self.re.multiply(&rhs.im));
        let bc = try_value!(self.im.multiply(&rhs.re));
        EvalOutcome::Value(Complex::new(ac.subtract(&bd), ad.add(&bc)))
    }

    fn invert_left(&self) -> InvertResult<Self> {
        invert_complex(self, Side::Left)
    }

    fn invert_right(&self) -> InvertResult<Self> {
        invert_complex(self, Side::Right)
    }
}

impl<E: Magnitude> Magnitude for Complex<E> {
    fn magnitude(&self) -> f64 {
        self.re.magnitude().hypot(self.im.magnitude())
    }
}
