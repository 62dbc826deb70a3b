//! Persistent symbolic expressions
//!
//! An [`Expr<V>`] is an immutable tree whose leaves resolve to values of the
//! payload algebra `V`. Subtrees are shared through `Arc`, so one tree can be
//! reused for every grid cell. `Expr<V>` is itself an [`AlgebraicElem`], which
//! is how expressions nest: evaluating an `Expr<Expr<f64>>` yields an
//! `Expr<f64>`.

use crate::leaf::Leaf;
use crate::stencil::DerivativeOp;
use simalg_algebra::{
    AlgebraicElem, AlgebraicFactory, Coefficient, ElementaryFn, EvalOutcome, InvertResult, Side,
};
use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub enum ExprKind<V: AlgebraicElem> {
    Leaf(Leaf),
    Constant(V),
    /// Structural additive identity
    Zero,
    /// Structural multiplicative identity
    Identity,
    Add(Vec<Expr<V>>),
    Negate(Expr<V>),
    /// Ordered product `left * right`
    Multiply(Expr<V>, Expr<V>),
    Invert(Side, Expr<V>),
    /// A derivative operator acting on whatever it multiplies from the left
    Operator(DerivativeOp),
    /// `f(inner)`
    Function(ElementaryFn, Expr<V>),
    /// `inner / n` for a nonzero integer `n`
    DivideBy(Expr<V>, i64),
}

#[derive(Debug, Clone)]
pub struct Expr<V: AlgebraicElem> {
    kind: Arc<ExprKind<V>>,
    fac: V::Factory,
}

impl<V: AlgebraicElem> Expr<V> {
    fn new(kind: ExprKind<V>, fac: V::Factory) -> Self {
        Expr {
            kind: Arc::new(kind),
            fac,
        }
    }

    pub fn leaf(leaf: Leaf, fac: V::Factory) -> Self {
        Expr::new(ExprKind::Leaf(leaf), fac)
    }

    pub fn constant(value: V) -> Self {
        let fac = value.factory();
        Expr::new(ExprKind::Constant(value), fac)
    }

    pub fn zero(fac: V::Factory) -> Self {
        Expr::new(ExprKind::Zero, fac)
    }

    pub fn identity(fac: V::Factory) -> Self {
        Expr::new(ExprKind::Identity, fac)
    }

    pub fn operator(op: DerivativeOp, fac: V::Factory) -> Self {
        Expr::new(ExprKind::Operator(op), fac)
    }

    /// Sum of `terms`; an empty sum is `Zero` and a single term is returned as is.
    pub fn sum(mut terms: Vec<Expr<V>>, fac: V::Factory) -> Self {
        match terms.len() {
            0 => Expr::zero(fac),
            1 => terms.remove(0),
            _ => Expr::new(ExprKind::Add(terms), fac),
        }
    }

    pub fn negated(&self) -> Self {
        Expr::new(ExprKind::Negate(self.clone()), self.fac.clone())
    }

    pub fn inverse(&self, side: Side) -> Self {
        Expr::new(ExprKind::Invert(side, self.clone()), self.fac.clone())
    }

    pub fn apply_fn(&self, f: ElementaryFn) -> Self {
        Expr::new(ExprKind::Function(f, self.clone()), self.fac.clone())
    }

    /// `self / n`. Nested divisions merge while the product of divisors fits
    /// in `i64`; a zero divisor is reported when the node is evaluated.
    pub fn divided_by(&self, n: i64) -> Self {
        if let ExprKind::DivideBy(inner, m) = self.kind() {
            if let Some(mn) = m.checked_mul(n) {
                return Expr::new(ExprKind::DivideBy(inner.clone(), mn), self.fac.clone());
            }
        }
        Expr::new(ExprKind::DivideBy(self.clone(), n), self.fac.clone())
    }

    /// Ordered product.
    ///
    /// An operator applied to a structural constant is `Zero`, and an
    /// operator applied to an operator application merges the two operators.
    pub fn times(&self, rhs: &Expr<V>) -> Self {
        if let ExprKind::Operator(outer) = self.kind() {
            match rhs.kind() {
                ExprKind::Zero | ExprKind::Identity | ExprKind::Constant(_) => {
                    return Expr::zero(self.fac.clone());
                }
                ExprKind::Operator(inner) => {
                    return Expr::operator(outer.then(inner), self.fac.clone());
                }
                ExprKind::Multiply(head, tail) => {
                    if let ExprKind::Operator(inner) = head.kind() {
                        return Expr::operator(outer.then(inner), self.fac.clone()).times(tail);
                    }
                }
                _ => {}
            }
        }
        Expr::new(
            ExprKind::Multiply(self.clone(), rhs.clone()),
            self.fac.clone(),
        )
    }

    pub fn plus(&self, rhs: &Expr<V>) -> Self {
        Expr::new(
            ExprKind::Add(vec![self.clone(), rhs.clone()]),
            self.fac.clone(),
        )
    }

    pub fn minus(&self, rhs: &Expr<V>) -> Self {
        self.plus(&rhs.negated())
    }

    pub fn kind(&self) -> &ExprKind<V> {
        &self.kind
    }

    /// Factory of the values this expression evaluates to
    pub fn value_factory(&self) -> &V::Factory {
        &self.fac
    }

    pub fn is_zero(&self) -> bool {
        matches!(self.kind(), ExprKind::Zero)
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.kind(), ExprKind::Identity)
    }

    pub fn is_operator(&self) -> bool {
        matches!(self.kind(), ExprKind::Operator(_))
    }

    /// Whether this is a constant of any kind (structural or embedded)
    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind(),
            ExprKind::Zero | ExprKind::Identity | ExprKind::Constant(_)
        )
    }

    pub fn node_count(&self) -> usize {
        1 + match self.kind() {
            ExprKind::Add(terms) => terms.iter().map(Expr::node_count).sum(),
            ExprKind::Negate(inner)
            | ExprKind::Invert(_, inner)
            | ExprKind::Function(_, inner)
            | ExprKind::DivideBy(inner, _) => inner.node_count(),
            ExprKind::Multiply(a, b) => a.node_count() + b.node_count(),
            _ => 0,
        }
    }

    /// Structural equality. Embedded constants compare by identity only, so
    /// no numeric comparison of payloads is ever made.
    pub fn same_structure(&self, other: &Expr<V>) -> bool {
        if Arc::ptr_eq(&self.kind, &other.kind) {
            return true;
        }
        match (self.kind(), other.kind()) {
            (ExprKind::Leaf(a), ExprKind::Leaf(b)) => a == b,
            (ExprKind::Zero, ExprKind::Zero) | (ExprKind::Identity, ExprKind::Identity) => true,
            (ExprKind::Add(a), ExprKind::Add(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_structure(y))
            }
            (ExprKind::Negate(a), ExprKind::Negate(b)) => a.same_structure(b),
            (ExprKind::Multiply(a1, b1), ExprKind::Multiply(a2, b2)) => {
                a1.same_structure(a2) && b1.same_structure(b2)
            }
            (ExprKind::Invert(s1, a), ExprKind::Invert(s2, b)) => s1 == s2 && a.same_structure(b),
            (ExprKind::Operator(a), ExprKind::Operator(b)) => a == b,
            (ExprKind::Function(f1, a), ExprKind::Function(f2, b)) => {
                f1 == f2 && a.same_structure(b)
            }
            (ExprKind::DivideBy(a, n1), ExprKind::DivideBy(b, n2)) => {
                n1 == n2 && a.same_structure(b)
            }
            _ => false,
        }
    }
}

impl<V: AlgebraicElem> fmt::Display for Expr<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Leaf(leaf) => write!(f, "{leaf}"),
            ExprKind::Constant(value) => write!(f, "{value:?}"),
            ExprKind::Zero => write!(f, "0"),
            ExprKind::Identity => write!(f, "1"),
            ExprKind::Add(terms) => {
                write!(f, "(")?;
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    write!(f, "{term}")?;
                }
                write!(f, ")")
            }
            ExprKind::Negate(inner) => write!(f, "-{inner}"),
            ExprKind::Multiply(a, b) => write!(f, "{a} * {b}"),
            ExprKind::Invert(Side::Left, inner) => write!(f, "inv_l({inner})"),
            ExprKind::Invert(Side::Right, inner) => write!(f, "inv_r({inner})"),
            ExprKind::Operator(op) => write!(f, "{op}"),
            ExprKind::Function(fun, inner) => write!(f, "{fun}({inner})"),
            ExprKind::DivideBy(inner, n) => write!(f, "({inner} / {n})"),
        }
    }
}

/// Factory for expressions evaluating into the algebra of `F`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExprFactory<F> {
    inner: F,
}

impl<F: AlgebraicFactory> ExprFactory<F> {
    pub fn new(inner: F) -> Self {
        ExprFactory { inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn leaf(&self, leaf: Leaf) -> Expr<F::Elem> {
        Expr::leaf(leaf, self.inner.clone())
    }

    pub fn operator(&self, op: DerivativeOp) -> Expr<F::Elem> {
        Expr::operator(op, self.inner.clone())
    }
}

impl<F: AlgebraicFactory> AlgebraicFactory for ExprFactory<F> {
    type Elem = Expr<F::Elem>;

    fn zero(&self) -> Self::Elem {
        Expr::zero(self.inner.clone())
    }

    fn identity(&self) -> Self::Elem {
        Expr::identity(self.inner.clone())
    }

    fn coefficient(&self, value: &Coefficient) -> Self::Elem {
        Expr::constant(self.inner.coefficient(value))
    }
}

impl<V: AlgebraicElem> AlgebraicElem for Expr<V> {
    type Factory = ExprFactory<V::Factory>;

    fn factory(&self) -> Self::Factory {
        ExprFactory::new(self.fac.clone())
    }

    fn add(&self, rhs: &Self) -> Self {
        self.plus(rhs)
    }

    fn negate(&self) -> Self {
        self.negated()
    }

    fn multiply(&self, rhs: &Self) -> EvalOutcome<Self> {
        EvalOutcome::Value(self.times(rhs))
    }

    fn invert_left(&self) -> InvertResult<Self> {
        Ok(EvalOutcome::Value(self.inverse(Side::Left)))
    }

    fn invert_right(&self) -> InvertResult<Self> {
        Ok(EvalOutcome::Value(self.inverse(Side::Right)))
    }

    fn elementary(&self, f: ElementaryFn) -> Option<Self> {
        Some(self.apply_fn(f))
    }
}
