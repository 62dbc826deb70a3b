//! `f64` as an algebra

use crate::{
    AlgebraError, AlgebraicElem, AlgebraicFactory, Coefficient, ElementaryFn, EvalOutcome,
    InvertResult, Magnitude, Side,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct F64Factory;

impl AlgebraicFactory for F64Factory {
    type Elem = f64;

    fn zero(&self) -> f64 {
        0.0
    }

    fn identity(&self) -> f64 {
        1.0
    }

    fn coefficient(&self, value: &Coefficient) -> f64 {
        value.to_f64()
    }

    fn is_mult_commutative(&self) -> bool {
        true
    }
}

fn reciprocal(value: f64, side: Side) -> InvertResult<f64> {
    if value == 0.0 {
        return Err(AlgebraError::not_invertible(side, "zero scalar"));
    }
    Ok(EvalOutcome::Value(1.0 / value))
}

impl AlgebraicElem for f64 {
    type Factory = F64Factory;

    fn factory(&self) -> F64Factory {
        F64Factory
    }

    fn add(&self, rhs: &f64) -> f64 {
        self + rhs
    }

    fn negate(&self) -> f64 {
        -self
    }

    fn multiply(&self, rhs: &f64) -> EvalOutcome<f64> {
        EvalOutcome::Value(self * rhs)
    }

    fn invert_left(&self) -> InvertResult<f64> {
        reciprocal(*self, Side::Left)
    }

    fn invert_right(&self) -> InvertResult<f64> {
        reciprocal(*self, Side::Right)
    }

    fn subtract(&self, rhs: &f64) -> f64 {
        self - rhs
    }

    fn elementary(&self, f: ElementaryFn) -> Option<f64> {
        Some(match f {
            ElementaryFn::Sin => self.sin(),
            ElementaryFn::Cos => self.cos(),
            ElementaryFn::Sqrt => self.sqrt(),
            ElementaryFn::Abs => self.abs(),
        })
    }
}

impl Magnitude for f64 {
    fn magnitude(&self) -> f64 {
        self.abs()
    }
}
