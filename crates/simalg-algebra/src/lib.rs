//! Algebra contract for the simalg evaluation engine
//!
//! Every value the engine touches implements [`AlgebraicElem`]: plain scalars,
//! complex pairs, square matrices and symbolic expressions over any of these.
//! Composite payloads are generic over an inner `AlgebraicElem`, so nesting is
//! checked by the type system rather than discovered at runtime.
//!
//! # Protocol
//!
//! - [`AlgebraicElem::multiply`] returns an [`EvalOutcome`]. A payload whose
//!   operands must first be symbolically expanded answers
//!   [`EvalOutcome::NeedsDistribution`]; this is a protocol step, not an error.
//! - Inversion is handed: [`AlgebraicElem::invert_left`] yields `x` with
//!   `x * a = 1`, [`AlgebraicElem::invert_right`] yields `x` with `a * x = 1`.
//!   Missing inverses are reported as [`AlgebraError::NotInvertible`].
//! - Elementary functions ([`ElementaryFn`]) are optional. A payload that
//!   has no meaning for one answers `None` from [`AlgebraicElem::elementary`].
//! - Factories are values. A square-matrix factory carries its dimension, so
//!   `zero()` and `identity()` need no extra arguments.

mod coeff;
mod complex;
mod matrix;
mod outcome;
mod scalar;

pub use coeff::Coefficient;
pub use complex::ComplexFactory;
pub use matrix::{SquareMatrix, SquareMatrixFactory};
pub use num_complex::Complex;
pub use outcome::{DistributionSignal, EvalOutcome};
pub use scalar::F64Factory;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handedness of an inverse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// `x * a = 1`
    #[default]
    Left,
    /// `a * x = 1`
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}

/// Scalar functions a payload may choose to support
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementaryFn {
    Sin,
    Cos,
    Sqrt,
    Abs,
}

impl fmt::Display for ElementaryFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ElementaryFn::Sin => "sin",
            ElementaryFn::Cos => "cos",
            ElementaryFn::Sqrt => "sqrt",
            ElementaryFn::Abs => "abs",
        })
    }
}

/// Error type for algebraic operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlgebraError {
    #[error("element has no {side} inverse: {reason}")]
    NotInvertible { side: Side, reason: String },
}

impl AlgebraError {
    pub fn not_invertible(side: Side, reason: impl Into<String>) -> Self {
        AlgebraError::NotInvertible {
            side,
            reason: reason.into(),
        }
    }
}

/// Result of an inversion: a value, a distribution request, or a missing inverse
pub type InvertResult<T> = std::result::Result<EvalOutcome<T>, AlgebraError>;

/// Produces the distinguished elements of an algebra.
pub trait AlgebraicFactory: Clone + fmt::Debug {
    type Elem: AlgebraicElem<Factory = Self>;

    /// Additive identity
    fn zero(&self) -> Self::Elem;

    /// Multiplicative identity
    fn identity(&self) -> Self::Elem;

    /// Embed an exact rational into the algebra
    fn coefficient(&self, value: &Coefficient) -> Self::Elem;

    /// Whether `a * b == b * a` holds for every pair of elements
    fn is_mult_commutative(&self) -> bool {
        false
    }
}

/// A value participating in the generic add / multiply / invert algebra.
///
/// Values are immutable: every operation returns a new value.
pub trait AlgebraicElem: Clone + fmt::Debug + Sized {
    type Factory: AlgebraicFactory<Elem = Self>;

    fn factory(&self) -> Self::Factory;

    fn add(&self, rhs: &Self) -> Self;

    fn negate(&self) -> Self;

    /// Non-commutative product `self * rhs`.
    fn multiply(&self, rhs: &Self) -> EvalOutcome<Self>;

    fn invert_left(&self) -> InvertResult<Self>;

    fn invert_right(&self) -> InvertResult<Self>;

    fn invert(&self, side: Side) -> InvertResult<Self> {
        match side {
            Side::Left => self.invert_left(),
            Side::Right => self.invert_right(),
        }
    }

    fn subtract(&self, rhs: &Self) -> Self {
        self.add(&rhs.negate())
    }

    /// `f(self)`, or `None` when the algebra does not define `f`.
    fn elementary(&self, _f: ElementaryFn) -> Option<Self> {
        None
    }
}

/// Non-negative size of an element, used for tolerance checks.
pub trait Magnitude {
    fn magnitude(&self) -> f64;
}
