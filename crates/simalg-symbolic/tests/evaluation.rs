use simalg_algebra::{
    Coefficient, Complex, ComplexFactory, ElementaryFn, EvalOutcome, F64Factory, Side,
};
use simalg_symbolic::{
    eval_expr, eval_partial_derivative_expr, wrt, DerivativeOp, EvalCache, Evaluator, Expr,
    ExprArena, ExprFactory, Leaf, MapSpace, Offset, Ordinate, StepSizes, SymbolicError,
    SymbolicSpace, WrtSet,
};

const T: Ordinate = Ordinate(0);
const X: Ordinate = Ordinate(1);

fn var(name: &str) -> Expr<f64> {
    Expr::leaf(Leaf::named(name), F64Factory)
}

fn sample(pairs: &[(Ordinate, i64)]) -> Leaf {
    Leaf::sample(Offset::from_pairs(pairs.iter().copied()))
}

fn u() -> Expr<f64> {
    Expr::leaf(sample(&[]), F64Factory)
}

fn value(outcome: Result<EvalOutcome<f64>, SymbolicError>) -> f64 {
    match outcome {
        Ok(EvalOutcome::Value(v)) => v,
        other => panic!("expected a value, got {other:?}"),
    }
}

fn unit_steps() -> StepSizes {
    StepSizes::new()
        .with(T, Coefficient::int(1))
        .with(X, Coefficient::int(1))
}

#[test]
fn evaluates_sums_products_and_negation() {
    // -(x * y) + x
    let expr = var("x").times(&var("y")).negated().plus(&var("x"));
    let space = MapSpace::new()
        .with(Leaf::named("x"), 3.0)
        .with(Leaf::named("y"), 4.0);
    assert_eq!(value(eval_expr(&expr, &space, &StepSizes::new())), -9.0);
}

#[test]
fn unbound_leaf_is_an_error() {
    let space: MapSpace<f64> = MapSpace::new();
    let err = eval_expr(&var("missing"), &space, &StepSizes::new()).unwrap_err();
    assert_eq!(err, SymbolicError::UnboundLeaf(Leaf::named("missing")));
}

#[test]
fn singular_inverse_surfaces_not_invertible() {
    let expr = var("x").inverse(Side::Left);
    let space = MapSpace::new().with(Leaf::named("x"), 0.0);
    assert!(matches!(
        eval_expr(&expr, &space, &StepSizes::new()),
        Err(SymbolicError::NotInvertible(_))
    ));
}

#[test]
fn bare_operator_needs_distribution() {
    let dx = Expr::operator(DerivativeOp::partial(X, 1), F64Factory);
    let space: MapSpace<f64> = MapSpace::new();
    assert_eq!(
        eval_expr(&dx, &space, &unit_steps()),
        Ok(EvalOutcome::NeedsDistribution)
    );
}

#[test]
fn operator_lowers_to_central_difference() {
    let dx = Expr::operator(DerivativeOp::partial(X, 1), F64Factory);
    let expr = dx.times(&u());
    let space = MapSpace::new()
        .with(sample(&[(X, -1)]), 1.0)
        .with(sample(&[(X, 1)]), 5.0);
    assert_eq!(value(eval_expr(&expr, &space, &unit_steps())), 2.0);
}

#[test]
fn sums_and_negations_of_operators_distribute() {
    let dx = Expr::operator(DerivativeOp::partial(X, 1), F64Factory);
    let dt = Expr::operator(DerivativeOp::partial(T, 1), F64Factory);
    let space = MapSpace::new()
        .with(sample(&[(X, -1)]), 1.0)
        .with(sample(&[(X, 1)]), 5.0)
        .with(sample(&[(T, -1)]), 2.0)
        .with(sample(&[(T, 1)]), 10.0);

    // (dx + dt) u = 2 + 4
    let sum = Expr::sum(vec![dx.clone(), dt.clone()], F64Factory).times(&u());
    assert_eq!(value(eval_expr(&sum, &space, &unit_steps())), 6.0);

    // (-dx) u
    let neg = dx.negated().times(&u());
    assert_eq!(value(eval_expr(&neg, &space, &unit_steps())), -2.0);

    // dt * dx merges into one mixed operator
    let chain = Expr::sum(vec![dt.times(&dx)], F64Factory).times(&u());
    let mixed_space = MapSpace::new()
        .with(sample(&[(T, 1), (X, 1)]), 4.0)
        .with(sample(&[(T, 1), (X, -1)]), 0.0)
        .with(sample(&[(T, -1), (X, 1)]), 0.0)
        .with(sample(&[(T, -1), (X, -1)]), 0.0);
    assert_eq!(value(eval_expr(&chain, &mixed_space, &unit_steps())), 1.0);
}

#[test]
fn partial_derivatives_follow_product_and_inverse_rules() {
    let x = var("x");
    let space = MapSpace::new()
        .with(Leaf::named("x"), 3.0)
        .with(Leaf::named("y"), 5.0);
    let dx = wrt(Leaf::named("x"));

    // d(x * x) = 2x
    let square = x.times(&x);
    assert_eq!(
        value(eval_partial_derivative_expr(&square, &dx, &space, &StepSizes::new())),
        6.0
    );

    // d(x * y)/dx = y
    let xy = x.times(&var("y"));
    assert_eq!(
        value(eval_partial_derivative_expr(&xy, &dx, &space, &StepSizes::new())),
        5.0
    );

    // d(1/x) = -1/x^2
    let inv = x.inverse(Side::Right);
    let d = value(eval_partial_derivative_expr(&inv, &dx, &space, &StepSizes::new()));
    assert!((d + 1.0 / 9.0).abs() < 1e-15);
}

#[test]
fn derivative_with_respect_to_two_leaves_is_zero() {
    let expr = var("x").times(&var("y"));
    let space = MapSpace::new()
        .with(Leaf::named("x"), 3.0)
        .with(Leaf::named("y"), 5.0);
    let both: WrtSet = [Leaf::named("x"), Leaf::named("y")].into_iter().collect();
    assert_eq!(
        value(eval_partial_derivative_expr(&expr, &both, &space, &StepSizes::new())),
        0.0
    );
}

#[test]
fn derivative_through_stencil_picks_the_shifted_sample() {
    let h = Coefficient::rational(1, 4);
    let steps = StepSizes::new().with(X, h);
    let dx = Expr::operator(DerivativeOp::partial(X, 1), F64Factory);
    let expr = dx.times(&u());
    let space = MapSpace::new()
        .with(sample(&[(X, -1)]), 0.0)
        .with(sample(&[(X, 1)]), 0.0);

    let ahead = wrt(sample(&[(X, 1)]));
    assert_eq!(
        value(eval_partial_derivative_expr(&expr, &ahead, &space, &steps)),
        2.0
    );
    let centre = wrt(sample(&[]));
    assert_eq!(
        value(eval_partial_derivative_expr(&expr, &centre, &space, &steps)),
        0.0
    );
}

#[test]
fn cache_hits_on_shared_subtrees_and_never_goes_stale() {
    let shared = var("x").times(&var("y"));
    let expr = shared.plus(&shared);
    let mut arena = ExprArena::new(F64Factory);
    let id = arena.intern(&expr);
    let mut cache = EvalCache::new();
    let steps = StepSizes::new();

    let first = MapSpace::new()
        .with(Leaf::named("x"), 2.0)
        .with(Leaf::named("y"), 3.0);
    let mut ev = Evaluator::new(&arena, &first, &steps, &mut cache);
    assert_eq!(value(ev.eval(id)), 12.0);
    assert!(ev.cache_stats().hits >= 1);

    let second = MapSpace::new()
        .with(Leaf::named("x"), 1.0)
        .with(Leaf::named("y"), 1.0);
    let mut ev = Evaluator::new(&arena, &second, &steps, &mut cache);
    assert_eq!(value(ev.eval(id)), 2.0);
}

#[test]
fn nested_expressions_lower_to_grid_expressions() {
    // second derivative at the outer level, then bound at the inner level
    let outer_u: Expr<Expr<f64>> = Expr::leaf(sample(&[]), ExprFactory::new(F64Factory));
    let dxx = Expr::operator(DerivativeOp::partial(X, 2), ExprFactory::new(F64Factory));
    let f = dxx.times(&outer_u);
    let lift = SymbolicSpace::new(F64Factory);
    let inner = match eval_expr(&f, &lift, &unit_steps()) {
        Ok(EvalOutcome::Value(e)) => e,
        other => panic!("expected an expression, got {other:?}"),
    };

    let grid = MapSpace::new()
        .with(sample(&[(X, -1)]), 1.0)
        .with(sample(&[]), 4.0)
        .with(sample(&[(X, 1)]), 9.0);
    assert_eq!(value(eval_expr(&inner, &grid, &StepSizes::new())), 2.0);
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-12
}

#[test]
fn elementary_functions_evaluate_on_scalars() {
    let space = MapSpace::new().with(Leaf::named("x"), 0.5);
    let x = var("x");
    let steps = StepSizes::new();

    let sin = value(eval_expr(&x.apply_fn(ElementaryFn::Sin), &space, &steps));
    assert!(close(sin, 0.5f64.sin()));
    let cos = value(eval_expr(&x.apply_fn(ElementaryFn::Cos), &space, &steps));
    assert!(close(cos, 0.5f64.cos()));
    let root = value(eval_expr(&x.apply_fn(ElementaryFn::Sqrt), &space, &steps));
    assert!(close(root, 0.5f64.sqrt()));
    let abs = value(eval_expr(&x.negated().apply_fn(ElementaryFn::Abs), &space, &steps));
    assert_eq!(abs, 0.5);
    assert_eq!(value(eval_expr(&x.divided_by(-4), &space, &steps)), -0.125);
}

#[test]
fn elementary_derivatives_follow_the_chain_rule() {
    let x = var("x");
    let dx = wrt(Leaf::named("x"));
    let steps = StepSizes::new();
    let at = |v: f64| MapSpace::new().with(Leaf::named("x"), v);
    let d = |e: &Expr<f64>, v: f64| value(eval_partial_derivative_expr(e, &dx, &at(v), &steps));

    // d sin(x^2) = cos(x^2) * 2x
    let sin_sq = x.times(&x).apply_fn(ElementaryFn::Sin);
    assert!(close(d(&sin_sq, 1.5), 2.25f64.cos() * 3.0));

    let cos = x.apply_fn(ElementaryFn::Cos);
    assert!(close(d(&cos, 0.7), -(0.7f64.sin())));

    let root = x.apply_fn(ElementaryFn::Sqrt);
    assert!(close(d(&root, 4.0), 0.25));

    let abs = x.apply_fn(ElementaryFn::Abs);
    assert_eq!(d(&abs, -3.0), -1.0);
    assert_eq!(d(&abs, 2.0), 1.0);

    // d(x * x / 4) = x / 2
    let quarter = x.times(&x).divided_by(4);
    assert_eq!(d(&quarter, 3.0), 1.5);
}

#[test]
fn elementary_failures_are_reported() {
    let space = MapSpace::new().with(Leaf::named("x"), 0.0);
    let steps = StepSizes::new();
    let x = var("x");

    assert_eq!(
        eval_expr(&x.divided_by(0), &space, &steps),
        Err(SymbolicError::DivisionByZero)
    );
    // |x| has no slope at the origin
    let abs = x.apply_fn(ElementaryFn::Abs);
    assert!(matches!(
        eval_partial_derivative_expr(&abs, &wrt(Leaf::named("x")), &space, &steps),
        Err(SymbolicError::NotInvertible(_))
    ));

    let z: Expr<Complex<f64>> = Expr::leaf(Leaf::named("z"), ComplexFactory::new(F64Factory));
    let complex_space = MapSpace::new().with(Leaf::named("z"), Complex::new(1.0, 2.0));
    assert_eq!(
        eval_expr(&z.apply_fn(ElementaryFn::Cos), &complex_space, &steps),
        Err(SymbolicError::UnsupportedFunction(ElementaryFn::Cos))
    );
}

#[test]
fn nested_elementary_functions_lower_to_grid_expressions() {
    let outer_u: Expr<Expr<f64>> = Expr::leaf(sample(&[]), ExprFactory::new(F64Factory));
    let f = outer_u.apply_fn(ElementaryFn::Sin).divided_by(2);
    let lift = SymbolicSpace::new(F64Factory);
    let steps = StepSizes::new();
    let grid = MapSpace::new().with(sample(&[]), 0.3);

    let inner = match eval_expr(&f, &lift, &steps) {
        Ok(EvalOutcome::Value(e)) => e,
        other => panic!("expected an expression, got {other:?}"),
    };
    assert!(close(value(eval_expr(&inner, &grid, &steps)), 0.3f64.sin() / 2.0));

    // slope built at the outer level, evaluated at the inner one
    let slope = match eval_partial_derivative_expr(&f, &wrt(sample(&[])), &lift, &steps) {
        Ok(EvalOutcome::Value(e)) => e,
        other => panic!("expected an expression, got {other:?}"),
    };
    assert!(close(value(eval_expr(&slope, &grid, &steps)), 0.3f64.cos() / 2.0));
}
