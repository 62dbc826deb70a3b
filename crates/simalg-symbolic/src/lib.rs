//! simalg symbolic engine
//!
//! Symbolic expressions over any [`simalg_algebra::AlgebraicElem`] payload,
//! with memoized evaluation and partial differentiation, and a
//! finite-difference synthesizer that lowers derivative operators into exact
//! rational stencils.
//!
//! # Architecture
//!
//! - [`Expr`]: persistent, `Arc`-shared trees; itself an algebra element, so
//!   expressions nest to any depth.
//! - [`ExprArena`]: integer-indexed node storage built from an `Expr` by
//!   interning; evaluation caches key on node ids.
//! - [`ImplicitSpace`]: the leaf bindings an expression is evaluated in,
//!   identified by a [`SpaceToken`].
//! - [`Evaluator`]: evaluation and partial derivatives against one space with
//!   a caller-supplied [`EvalCache`].
//! - [`StagedNormalizer`]: structural simplification passes.
//! - [`stencil`]: central-difference stencils with exact weights.

mod arena;
mod cache;
mod eval;
mod expr;
mod leaf;
mod normalize;
mod space;
pub mod stencil;

pub use arena::{ExprArena, Node, NodeId};
pub use cache::{CacheKey, CacheStats, EvalCache};
pub use eval::{eval_expr, eval_partial_derivative_expr, Evaluator};
pub use expr::{Expr, ExprFactory, ExprKind};
pub use leaf::{wrt, Leaf, Offset, Ordinate, WrtSet};
pub use normalize::{NormPass, NormProof, NormStep, StagedNormalizer};
pub use space::{ImplicitSpace, MapSpace, SpaceToken, SymbolicSpace};
pub use stencil::{CoefficientTerm, DerivativeOp, Stencil, StepSizes};

use simalg_algebra::{AlgebraError, ElementaryFn};

/// Error type for symbolic operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SymbolicError {
    #[error("no binding for leaf {0}")]
    UnboundLeaf(Leaf),

    #[error("no step size for ordinate {0}")]
    MissingStepSize(Ordinate),

    #[error(transparent)]
    NotInvertible(#[from] AlgebraError),

    #[error("{0} is not defined for this payload algebra")]
    UnsupportedFunction(ElementaryFn),

    #[error("division of an expression by zero")]
    DivisionByZero,

    #[error("expression needs a distribution that cannot be expanded further")]
    NeedsDistribution,
}

pub type Result<T> = std::result::Result<T, SymbolicError>;
