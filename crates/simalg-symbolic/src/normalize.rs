//! Staged structural simplification
//!
//! Passes rewrite an [`Expr`] bottom-up without binding any leaf, so they can
//! run once on a function before it is evaluated for every grid cell. All
//! checks are structural: `Zero` and `Identity` nodes are recognised by kind,
//! never by comparing payload values.

use crate::expr::{Expr, ExprKind};
use serde::{Deserialize, Serialize};
use simalg_algebra::{AlgebraicElem, ElementaryFn, EvalOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormPass {
    /// `-(-x) = x`, `-0 = 0`
    SimplifyNeg,
    /// Flatten nested sums
    Flatten,
    /// `x + 0 = x`, `x * 0 = 0`, `x * 1 = x`, operator of a constant is 0,
    /// `f(0)` and `0 / n` fold to structural constants
    RemoveIdentity,
    /// Expand products over sums and negations, keeping operand order
    Distribute,
    /// Combine embedded constants
    FoldConstants,
}

#[derive(Debug, Clone, Default)]
pub struct NormProof {
    pub steps: Vec<NormStep>,
    pub initial_size: usize,
    pub final_size: usize,
}

#[derive(Debug, Clone)]
pub struct NormStep {
    pub pass: NormPass,
    pub before_size: usize,
    pub after_size: usize,
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct StagedNormalizer {
    passes: Vec<NormPass>,
    record_proof: bool,
}

impl StagedNormalizer {
    pub fn new(passes: Vec<NormPass>) -> Self {
        StagedNormalizer {
            passes,
            record_proof: false,
        }
    }

    /// Collapse every subtree combined with a structural zero or identity
    pub fn default_pipeline() -> Self {
        Self::new(vec![
            NormPass::SimplifyNeg,
            NormPass::RemoveIdentity,
            NormPass::Flatten,
            NormPass::SimplifyNeg,
        ])
    }

    pub fn minimal() -> Self {
        Self::new(vec![NormPass::RemoveIdentity])
    }

    /// Default pipeline plus distribution and constant folding
    pub fn aggressive() -> Self {
        Self::new(vec![
            NormPass::SimplifyNeg,
            NormPass::RemoveIdentity,
            NormPass::Distribute,
            NormPass::Flatten,
            NormPass::SimplifyNeg,
            NormPass::RemoveIdentity,
            NormPass::FoldConstants,
            NormPass::RemoveIdentity,
            NormPass::Flatten,
        ])
    }

    pub fn with_proof_recording(mut self) -> Self {
        self.record_proof = true;
        self
    }

    pub fn passes(&self) -> &[NormPass] {
        &self.passes
    }

    pub fn normalize<V: AlgebraicElem>(&self, expr: Expr<V>) -> (Expr<V>, Option<NormProof>) {
        let mut current = expr;
        let mut proof = self.record_proof.then(|| NormProof {
            initial_size: current.node_count(),
            ..Default::default()
        });

        for pass in &self.passes {
            let next = apply_pass(&current, pass);
            if let Some(ref mut p) = proof {
                p.steps.push(NormStep {
                    pass: pass.clone(),
                    before_size: current.node_count(),
                    after_size: next.node_count(),
                    changed: !current.same_structure(&next),
                });
            }
            current = next;
        }

        if let Some(ref mut p) = proof {
            p.final_size = current.node_count();
            log::trace!(
                "normalized {} -> {} nodes in {} passes",
                p.initial_size,
                p.final_size,
                p.steps.len()
            );
        }
        (current, proof)
    }
}

impl Default for StagedNormalizer {
    fn default() -> Self {
        Self::default_pipeline()
    }
}

impl<V: AlgebraicElem> Expr<V> {
    /// Run the default structural pipeline.
    pub fn distribute_simplify(&self) -> Expr<V> {
        StagedNormalizer::default_pipeline().normalize(self.clone()).0
    }
}

fn apply_pass<V: AlgebraicElem>(expr: &Expr<V>, pass: &NormPass) -> Expr<V> {
    match pass {
        NormPass::SimplifyNeg => simplify_neg(expr),
        NormPass::Flatten => flatten(expr),
        NormPass::RemoveIdentity => remove_identity(expr),
        NormPass::Distribute => distribute(expr),
        NormPass::FoldConstants => fold_constants(expr),
    }
}

/// Rebuild `expr` with `f` applied to each direct child.
fn rebuild<V: AlgebraicElem>(expr: &Expr<V>, f: fn(&Expr<V>) -> Expr<V>) -> Expr<V> {
    match expr.kind() {
        ExprKind::Add(terms) => Expr::sum(
            terms.iter().map(f).collect(),
            expr.value_factory().clone(),
        ),
        ExprKind::Negate(inner) => f(inner).negated(),
        ExprKind::Multiply(a, b) => f(a).times(&f(b)),
        ExprKind::Invert(side, inner) => f(inner).inverse(*side),
        ExprKind::Function(fun, inner) => f(inner).apply_fn(*fun),
        ExprKind::DivideBy(inner, n) => f(inner).divided_by(*n),
        _ => expr.clone(),
    }
}

fn simplify_neg<V: AlgebraicElem>(expr: &Expr<V>) -> Expr<V> {
    let expr = rebuild(expr, simplify_neg);
    if let ExprKind::Negate(inner) = expr.kind() {
        match inner.kind() {
            ExprKind::Negate(double_inner) => return double_inner.clone(),
            ExprKind::Zero => return inner.clone(),
            _ => {}
        }
    }
    expr
}

fn flatten<V: AlgebraicElem>(expr: &Expr<V>) -> Expr<V> {
    let expr = rebuild(expr, flatten);
    if let ExprKind::Add(terms) = expr.kind() {
        if terms.iter().any(|t| matches!(t.kind(), ExprKind::Add(_))) {
            let mut flat = Vec::with_capacity(terms.len());
            for t in terms {
                match t.kind() {
                    ExprKind::Add(inner) => flat.extend(inner.iter().cloned()),
                    _ => flat.push(t.clone()),
                }
            }
            return Expr::sum(flat, expr.value_factory().clone());
        }
    }
    expr
}

fn remove_identity<V: AlgebraicElem>(expr: &Expr<V>) -> Expr<V> {
    let expr = rebuild(expr, remove_identity);
    let fac = expr.value_factory().clone();
    match expr.kind() {
        ExprKind::Add(terms) if terms.iter().any(Expr::is_zero) => Expr::sum(
            terms.iter().filter(|t| !t.is_zero()).cloned().collect(),
            fac,
        ),
        ExprKind::Multiply(a, b) => {
            if a.is_zero() || b.is_zero() || (a.is_operator() && b.is_constant()) {
                Expr::zero(fac)
            } else if a.is_identity() {
                b.clone()
            } else if b.is_identity() {
                a.clone()
            } else {
                expr
            }
        }
        ExprKind::Negate(inner) if inner.is_zero() => Expr::zero(fac),
        ExprKind::Invert(_, inner) if inner.is_identity() => Expr::identity(fac),
        ExprKind::Function(ElementaryFn::Cos, inner) if inner.is_zero() => Expr::identity(fac),
        ExprKind::Function(_, inner) if inner.is_zero() => Expr::zero(fac),
        ExprKind::DivideBy(inner, n) if inner.is_zero() && *n != 0 => Expr::zero(fac),
        ExprKind::DivideBy(inner, 1) => inner.clone(),
        _ => expr,
    }
}

fn distribute<V: AlgebraicElem>(expr: &Expr<V>) -> Expr<V> {
    let expr = rebuild(expr, distribute);
    let ExprKind::Multiply(a, b) = expr.kind() else {
        return expr;
    };
    let fac = expr.value_factory().clone();
    match (a.kind(), b.kind()) {
        (ExprKind::Add(terms), _) => Expr::sum(
            terms.iter().map(|t| distribute(&t.times(b))).collect(),
            fac,
        ),
        (ExprKind::Negate(inner), _) => distribute(&inner.times(b)).negated(),
        (_, ExprKind::Add(terms)) => Expr::sum(
            terms.iter().map(|t| distribute(&a.times(t))).collect(),
            fac,
        ),
        (_, ExprKind::Negate(inner)) => distribute(&a.times(inner)).negated(),
        _ => expr.clone(),
    }
}

fn fold_constants<V: AlgebraicElem>(expr: &Expr<V>) -> Expr<V> {
    let expr = rebuild(expr, fold_constants);
    match expr.kind() {
        ExprKind::Add(terms) => {
            let mut folded: Option<V> = None;
            let mut rest = Vec::new();
            let mut constants = 0usize;
            for t in terms {
                match t.kind() {
                    ExprKind::Constant(v) => {
                        constants += 1;
                        folded = Some(match folded {
                            Some(acc) => acc.add(v),
                            None => v.clone(),
                        });
                    }
                    _ => rest.push(t.clone()),
                }
            }
            match folded {
                Some(v) if constants > 1 => {
                    rest.insert(0, Expr::constant(v));
                    Expr::sum(rest, expr.value_factory().clone())
                }
                _ => expr,
            }
        }
        ExprKind::Negate(inner) => match inner.kind() {
            ExprKind::Constant(v) => Expr::constant(v.negate()),
            _ => expr,
        },
        ExprKind::Multiply(a, b) => match (a.kind(), b.kind()) {
            (ExprKind::Constant(x), ExprKind::Constant(y)) => match x.multiply(y) {
                EvalOutcome::Value(v) => Expr::constant(v),
                EvalOutcome::NeedsDistribution => expr,
            },
            _ => expr,
        },
        _ => expr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::{Leaf, Ordinate};
    use crate::stencil::DerivativeOp;
    use simalg_algebra::F64Factory;

    fn var(name: &str) -> Expr<f64> {
        Expr::leaf(Leaf::named(name), F64Factory)
    }

    fn zero() -> Expr<f64> {
        Expr::zero(F64Factory)
    }

    fn one() -> Expr<f64> {
        Expr::identity(F64Factory)
    }

    #[test]
    fn test_flatten() {
        let nested = Expr::sum(
            vec![var("x"), Expr::sum(vec![var("y"), var("z")], F64Factory)],
            F64Factory,
        );
        match flatten(&nested).kind() {
            ExprKind::Add(terms) => assert_eq!(terms.len(), 3),
            other => panic!("expected Add, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_and_identity_collapse() {
        // (0 * x + 1 * y) * 1 + -(-0)
        let expr = zero()
            .times(&var("x"))
            .plus(&one().times(&var("y")))
            .times(&one())
            .plus(&zero().negated().negated());
        let simplified = expr.distribute_simplify();
        assert!(simplified.same_structure(&var("y")));
    }

    #[test]
    fn test_operator_of_identity_is_zero() {
        let dx = Expr::operator(DerivativeOp::partial(Ordinate(1), 1), F64Factory);
        // built by hand so the smart constructor does not fire first
        let manual = Expr::sum(vec![dx.clone(), zero()], F64Factory).times(&one());
        let (result, _) = StagedNormalizer::aggressive().normalize(manual);
        assert!(result.is_zero(), "got {result}");
    }

    #[test]
    fn test_functions_of_zero_fold() {
        let expr = zero()
            .times(&var("x"))
            .apply_fn(ElementaryFn::Cos)
            .plus(&zero().apply_fn(ElementaryFn::Sqrt).divided_by(4))
            .times(&var("y").divided_by(1));
        let simplified = expr.distribute_simplify();
        assert!(simplified.same_structure(&var("y")), "got {simplified}");

        // a zero divisor survives to evaluation
        let bad = zero().divided_by(0);
        assert!(matches!(remove_identity(&bad).kind(), ExprKind::DivideBy(_, 0)));
    }

    #[test]
    fn test_distribute_keeps_operand_order() {
        // (a + b) * c -> a*c + b*c ; c * -(d) -> -(c*d)
        let expr = var("a").plus(&var("b")).times(&var("c"));
        let expanded = distribute(&expr);
        assert_eq!(expanded.to_string(), "(a * c + b * c)");

        let neg = var("c").times(&var("d").negated());
        assert_eq!(distribute(&neg).to_string(), "-c * d");
    }

    #[test]
    fn test_fold_constants_and_proof() {
        let expr = Expr::constant(2.0)
            .plus(&var("x"))
            .plus(&Expr::constant(3.0))
            .plus(&Expr::constant(4.0).times(&Expr::constant(0.5)));
        let normalizer = StagedNormalizer::aggressive().with_proof_recording();
        let (result, proof) = normalizer.normalize(expr);
        match result.kind() {
            ExprKind::Add(terms) => {
                assert_eq!(terms.len(), 2);
                assert!(matches!(terms[0].kind(), ExprKind::Constant(v) if *v == 7.0));
            }
            other => panic!("expected Add, got {other:?}"),
        }
        let proof = proof.unwrap();
        assert_eq!(proof.steps.len(), normalizer.passes().len());
        assert!(proof.final_size < proof.initial_size);
        assert!(proof.steps.iter().any(|s| s.changed));
    }
}
