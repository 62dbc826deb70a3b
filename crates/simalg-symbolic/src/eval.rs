//! Memoized evaluation and partial differentiation over an [`ExprArena`]
//!
//! Values are computed relative to a *shift*: the grid offset of the point
//! being evaluated. Sample leaves are displaced by the shift before lookup,
//! and lowering a derivative operator re-evaluates its operand at the shift
//! plus each stencil offset.
//!
//! Products are evaluated as chains `f0 * f1 * ... * fn`. A factor that
//! answers `NeedsDistribution` (a bare operator, or a sum or negation of
//! operators) is expanded structurally against the rest of the chain:
//!
//! - `(-a) * rest = -(a * rest)`
//! - `(a + b) * rest = a * rest + b * rest`
//! - `(a * b) * rest = a * (b * rest)`
//!
//! Elementary functions differentiate by the chain rule, `f'(u) * du`, with
//! `f'` built from the payload's own elementary functions and inverses.

use crate::arena::{ExprArena, Node, NodeId};
use crate::cache::{CacheKey, CacheStats, EvalCache};
use crate::expr::Expr;
use crate::leaf::{Offset, WrtSet};
use crate::space::{ImplicitSpace, SpaceToken};
use crate::stencil::{synthesize, DerivativeOp, StepSizes, Stencil};
use crate::{Result, SymbolicError};
use simalg_algebra::{
    try_value, AlgebraicElem, AlgebraicFactory, Coefficient, ElementaryFn, EvalOutcome,
};
use std::collections::HashMap;
use std::rc::Rc;

/// One evaluation context: an arena, the space it is evaluated in, step sizes
/// for operator lowering, and the caller's cache.
pub struct Evaluator<'a, V: AlgebraicElem, S: ImplicitSpace<V>> {
    arena: &'a ExprArena<V>,
    space: &'a S,
    steps: &'a StepSizes,
    cache: &'a mut EvalCache<V>,
    token: SpaceToken,
    stencils: HashMap<DerivativeOp, Rc<Stencil>>,
}

impl<'a, V: AlgebraicElem, S: ImplicitSpace<V>> Evaluator<'a, V, S> {
    pub fn new(
        arena: &'a ExprArena<V>,
        space: &'a S,
        steps: &'a StepSizes,
        cache: &'a mut EvalCache<V>,
    ) -> Self {
        let token = space.token();
        cache.bind(arena.id(), token);
        Evaluator {
            arena,
            space,
            steps,
            cache,
            token,
            stencils: HashMap::new(),
        }
    }

    pub fn eval(&mut self, id: NodeId) -> Result<EvalOutcome<V>> {
        self.eval_at(id, &Offset::zero())
    }

    pub fn eval_partial_derivative(&mut self, id: NodeId, wrt: &WrtSet) -> Result<EvalOutcome<V>> {
        self.derivative_at(id, wrt, &Offset::zero())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn key(&self, id: NodeId, shift: &Offset, wrt: Option<&WrtSet>) -> CacheKey {
        CacheKey {
            node: id,
            token: self.token,
            shift: shift.clone(),
            wrt: wrt.cloned(),
        }
    }

    fn eval_at(&mut self, id: NodeId, shift: &Offset) -> Result<EvalOutcome<V>> {
        let key = self.key(id, shift, None);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(EvalOutcome::Value(hit));
        }
        let arena = self.arena;
        let fac = arena.factory();
        let value = match arena.node(id) {
            Node::Leaf(leaf) => {
                let at = leaf.shifted(shift);
                match self.space.lookup(&at) {
                    Some(v) => v,
                    None => return Err(SymbolicError::UnboundLeaf(at)),
                }
            }
            Node::Constant(v) => v.clone(),
            Node::Zero => fac.zero(),
            Node::Identity => fac.identity(),
            Node::Add(ids) => try_value!(self.sum(ids, shift, None)?),
            Node::Negate(inner) => try_value!(self.eval_at(*inner, shift)?).negate(),
            Node::Multiply(a, b) => try_value!(self.chain(&[*a, *b], shift, None)?),
            Node::Invert(side, inner) => {
                let v = try_value!(self.eval_at(*inner, shift)?);
                try_value!(v.invert(*side)?)
            }
            Node::Operator(_) => return Ok(EvalOutcome::NeedsDistribution),
            Node::Function(fun, inner) => {
                let u = try_value!(self.eval_at(*inner, shift)?);
                apply(&u, *fun)?
            }
            Node::DivideBy(inner, n) => {
                let scale = self.reciprocal(*n)?;
                let v = try_value!(self.eval_at(*inner, shift)?);
                try_value!(v.multiply(&scale))
            }
        };
        self.cache.insert(key, value.clone());
        Ok(EvalOutcome::Value(value))
    }

    fn derivative_at(&mut self, id: NodeId, wrt: &WrtSet, shift: &Offset) -> Result<EvalOutcome<V>> {
        let key = self.key(id, shift, Some(wrt));
        if let Some(hit) = self.cache.get(&key) {
            return Ok(EvalOutcome::Value(hit));
        }
        let arena = self.arena;
        let fac = arena.factory();
        let value = match arena.node(id) {
            Node::Leaf(leaf) => {
                let at = leaf.shifted(shift);
                if wrt.len() == 1 && wrt.contains(&at) {
                    fac.identity()
                } else {
                    fac.zero()
                }
            }
            Node::Constant(_) | Node::Zero | Node::Identity => fac.zero(),
            Node::Add(ids) => try_value!(self.sum(ids, shift, Some(wrt))?),
            Node::Negate(inner) => try_value!(self.derivative_at(*inner, wrt, shift)?).negate(),
            Node::Multiply(a, b) => try_value!(self.chain(&[*a, *b], shift, Some(wrt))?),
            Node::Invert(side, inner) => {
                // d(c^-1) = -(c^-1 * dc * c^-1)
                let c = try_value!(self.eval_at(*inner, shift)?);
                let inv = try_value!(c.invert(*side)?);
                let dc = try_value!(self.derivative_at(*inner, wrt, shift)?);
                let left = try_value!(inv.multiply(&dc));
                try_value!(left.multiply(&inv)).negate()
            }
            Node::Operator(_) => return Ok(EvalOutcome::NeedsDistribution),
            Node::Function(fun, inner) => {
                let u = try_value!(self.eval_at(*inner, shift)?);
                let slope = try_value!(self.slope(*fun, &u)?);
                let du = try_value!(self.derivative_at(*inner, wrt, shift)?);
                try_value!(slope.multiply(&du))
            }
            Node::DivideBy(inner, n) => {
                let scale = self.reciprocal(*n)?;
                let dv = try_value!(self.derivative_at(*inner, wrt, shift)?);
                try_value!(dv.multiply(&scale))
            }
        };
        self.cache.insert(key, value.clone());
        Ok(EvalOutcome::Value(value))
    }

    /// `f'(u)`
    fn slope(&self, fun: ElementaryFn, u: &V) -> Result<EvalOutcome<V>> {
        let fac = self.arena.factory();
        let value = match fun {
            ElementaryFn::Sin => apply(u, ElementaryFn::Cos)?,
            ElementaryFn::Cos => apply(u, ElementaryFn::Sin)?.negate(),
            // inv_l(sqrt(u)) / 2
            ElementaryFn::Sqrt => {
                let root = apply(u, ElementaryFn::Sqrt)?;
                let inv = try_value!(root.invert_left()?);
                try_value!(inv.multiply(&fac.coefficient(&Coefficient::rational(1, 2))))
            }
            // u * inv_l(|u|)
            ElementaryFn::Abs => {
                let size = apply(u, ElementaryFn::Abs)?;
                let inv = try_value!(size.invert_left()?);
                try_value!(u.multiply(&inv))
            }
        };
        Ok(EvalOutcome::Value(value))
    }

    fn reciprocal(&self, n: i64) -> Result<V> {
        if n == 0 {
            return Err(SymbolicError::DivisionByZero);
        }
        Ok(self.arena.factory().coefficient(&Coefficient::rational(1, n)))
    }

    fn node_at(&mut self, id: NodeId, shift: &Offset, wrt: Option<&WrtSet>) -> Result<EvalOutcome<V>> {
        match wrt {
            None => self.eval_at(id, shift),
            Some(wrt) => self.derivative_at(id, wrt, shift),
        }
    }

    fn sum(&mut self, ids: &[NodeId], shift: &Offset, wrt: Option<&WrtSet>) -> Result<EvalOutcome<V>> {
        let mut acc: Option<V> = None;
        for &id in ids {
            let v = try_value!(self.node_at(id, shift, wrt)?);
            acc = Some(match acc {
                Some(a) => a.add(&v),
                None => v,
            });
        }
        Ok(EvalOutcome::Value(
            acc.unwrap_or_else(|| self.arena.factory().zero()),
        ))
    }

    /// Value (`wrt == None`) or partial derivative of the ordered product of
    /// `factors`.
    fn chain(&mut self, factors: &[NodeId], shift: &Offset, wrt: Option<&WrtSet>) -> Result<EvalOutcome<V>> {
        let arena = self.arena;
        let (head, rest) = match factors.split_first() {
            Some((head, rest)) => (*head, rest),
            None => {
                let fac = arena.factory();
                return Ok(EvalOutcome::Value(match wrt {
                    None => fac.identity(),
                    Some(_) => fac.zero(),
                }));
            }
        };
        if rest.is_empty() {
            return self.node_at(head, shift, wrt);
        }
        if let Node::Operator(op) = arena.node(head) {
            return self.lower_operator(op, rest, shift, wrt);
        }
        let h = match self.eval_at(head, shift)? {
            EvalOutcome::Value(h) => h,
            EvalOutcome::NeedsDistribution => return self.distribute(head, rest, shift, wrt),
        };
        let r = try_value!(self.chain(rest, shift, None)?);
        match wrt {
            None => Ok(h.multiply(&r)),
            Some(wrt) => {
                // product rule
                let dh = try_value!(self.derivative_at(head, wrt, shift)?);
                let dr = try_value!(self.chain(rest, shift, Some(wrt))?);
                let a = try_value!(dh.multiply(&r));
                let b = try_value!(h.multiply(&dr));
                Ok(EvalOutcome::Value(a.add(&b)))
            }
        }
    }

    fn distribute(
        &mut self,
        head: NodeId,
        rest: &[NodeId],
        shift: &Offset,
        wrt: Option<&WrtSet>,
    ) -> Result<EvalOutcome<V>> {
        let arena = self.arena;
        let prepend = |front: &[NodeId]| -> Vec<NodeId> {
            front.iter().chain(rest).copied().collect()
        };
        match arena.node(head) {
            Node::Negate(inner) => {
                let v = try_value!(self.chain(&prepend(&[*inner]), shift, wrt)?);
                Ok(EvalOutcome::Value(v.negate()))
            }
            Node::Add(ids) => {
                let mut acc: Option<V> = None;
                for &id in ids {
                    let v = try_value!(self.chain(&prepend(&[id]), shift, wrt)?);
                    acc = Some(match acc {
                        Some(a) => a.add(&v),
                        None => v,
                    });
                }
                Ok(EvalOutcome::Value(
                    acc.unwrap_or_else(|| arena.factory().zero()),
                ))
            }
            Node::Multiply(a, b) => self.chain(&prepend(&[*a, *b]), shift, wrt),
            _ => Ok(EvalOutcome::NeedsDistribution),
        }
    }

    /// Operators are linear: the weighted sum of the operand chain evaluated
    /// at every stencil offset.
    fn lower_operator(
        &mut self,
        op: &DerivativeOp,
        operand: &[NodeId],
        shift: &Offset,
        wrt: Option<&WrtSet>,
    ) -> Result<EvalOutcome<V>> {
        let stencil = self.stencil(op)?;
        let arena = self.arena;
        let fac = arena.factory();
        let mut acc = fac.zero();
        for (offset, term) in stencil.terms() {
            if term.numer.is_zero() {
                continue;
            }
            let v = try_value!(self.chain(operand, &shift.shifted(offset), wrt)?);
            let weight = fac.coefficient(&term.value());
            acc = acc.add(&try_value!(weight.multiply(&v)));
        }
        Ok(EvalOutcome::Value(acc))
    }

    fn stencil(&mut self, op: &DerivativeOp) -> Result<Rc<Stencil>> {
        if let Some(s) = self.stencils.get(op) {
            return Ok(Rc::clone(s));
        }
        let s = Rc::new(synthesize(op, self.steps)?);
        log::trace!("synthesized {op} with {} terms", s.len());
        self.stencils.insert(op.clone(), Rc::clone(&s));
        Ok(s)
    }
}

fn apply<V: AlgebraicElem>(u: &V, fun: ElementaryFn) -> Result<V> {
    u.elementary(fun)
        .ok_or(SymbolicError::UnsupportedFunction(fun))
}

/// Evaluate a single expression with a private arena and cache.
pub fn eval_expr<V, S>(expr: &Expr<V>, space: &S, steps: &StepSizes) -> Result<EvalOutcome<V>>
where
    V: AlgebraicElem,
    S: ImplicitSpace<V>,
{
    let mut arena = ExprArena::new(expr.value_factory().clone());
    let id = arena.intern(expr);
    let mut cache = EvalCache::new();
    Evaluator::new(&arena, space, steps, &mut cache).eval(id)
}

/// Partial derivative of a single expression with a private arena and cache.
pub fn eval_partial_derivative_expr<V, S>(
    expr: &Expr<V>,
    wrt: &WrtSet,
    space: &S,
    steps: &StepSizes,
) -> Result<EvalOutcome<V>>
where
    V: AlgebraicElem,
    S: ImplicitSpace<V>,
{
    let mut arena = ExprArena::new(expr.value_factory().clone());
    let id = arena.intern(expr);
    let mut cache = EvalCache::new();
    Evaluator::new(&arena, space, steps, &mut cache).eval_partial_derivative(id, wrt)
}
