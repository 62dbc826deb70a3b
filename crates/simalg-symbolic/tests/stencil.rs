use simalg_algebra::Coefficient;
use simalg_symbolic::stencil::synthesize;
use simalg_symbolic::{CoefficientTerm, DerivativeOp, Offset, Ordinate, Stencil, StepSizes};

const X: Ordinate = Ordinate(1);

fn steps(h: Coefficient) -> StepSizes {
    StepSizes::new().with(X, h)
}

fn weights(stencil: &Stencil) -> Vec<(i64, Coefficient)> {
    stencil
        .terms()
        .filter(|(_, t)| !t.numer.is_zero())
        .map(|(o, t)| (o.get(X), t.value()))
        .collect()
}

/// sum of weight * p(x0 + k h) over the stencil
fn apply<P: Fn(Coefficient) -> Coefficient>(
    stencil: &Stencil,
    x0: &Coefficient,
    h: &Coefficient,
    p: P,
) -> Coefficient {
    stencil.terms().fold(Coefficient::zero(), |acc, (o, t)| {
        let x = x0.clone() + Coefficient::int(o.get(X)) * h.clone();
        acc + t.value() * p(x)
    })
}

fn c(n: i64) -> Coefficient {
    Coefficient::int(n)
}

#[test]
fn textbook_central_differences() {
    let h = Coefficient::rational(1, 100);
    let st = |n| synthesize(&DerivativeOp::partial(X, n), &steps(h.clone())).unwrap();

    assert_eq!(weights(&st(0)), vec![(0, c(1))]);
    assert_eq!(weights(&st(1)), vec![(-1, c(-50)), (1, c(50))]);
    assert_eq!(
        weights(&st(2)),
        vec![(-1, c(10_000)), (0, c(-20_000)), (1, c(10_000))]
    );
    assert_eq!(
        weights(&st(3)),
        vec![
            (-2, c(-500_000)),
            (-1, c(1_000_000)),
            (1, c(-1_000_000)),
            (2, c(500_000))
        ]
    );
}

#[test]
fn first_order_twice_matches_second_order() {
    let h = Coefficient::rational(1, 100);
    let once = Stencil::identity().apply_derivative(X, 1, &h);
    let twice = once.apply_derivative(X, 1, &h);
    let direct = Stencil::identity().apply_derivative(X, 2, &h);

    // the composed operator is the wide form of the same derivative
    assert_eq!(
        weights(&twice),
        vec![(-2, c(2_500)), (0, c(-5_000)), (2, c(2_500))]
    );

    let x0 = Coefficient::rational(1, 3);
    let quadratic = |x: Coefficient| c(3) * x.clone() * x.clone() + x + c(7);
    assert_eq!(apply(&twice, &x0, &h, quadratic), c(6));
    assert_eq!(apply(&direct, &x0, &h, quadratic), c(6));

    let cubic = |x: Coefficient| x.clone() * x.clone() * x;
    assert_eq!(apply(&twice, &x0, &h, cubic), c(2));
    assert_eq!(apply(&direct, &x0, &h, cubic), c(2));
}

#[test]
fn fourth_order_composes_third_then_first() {
    let h = Coefficient::rational(1, 2);
    let s = synthesize(&DerivativeOp::partial(X, 4), &steps(h.clone())).unwrap();
    let support: Vec<i64> = weights(&s).into_iter().map(|(k, _)| k).collect();
    assert_eq!(support.first(), Some(&-3));
    assert_eq!(support.last(), Some(&3));

    let quartic = |x: Coefficient| x.pow_int(4);
    assert_eq!(apply(&s, &c(1), &h, quartic), c(24));
}

#[test]
fn third_order_is_exact_on_cubics() {
    let h = Coefficient::rational(1, 10);
    let s = synthesize(&DerivativeOp::partial(X, 3), &steps(h.clone())).unwrap();
    let cubic = |x: Coefficient| c(5) * x.pow_int(3) - c(2) * x;
    assert_eq!(apply(&s, &Coefficient::rational(2, 5), &h, cubic), c(30));
}

#[test]
fn apply_add_merges_exactly() {
    let mut s = Stencil::identity();
    let origin = Offset::zero();
    s.apply_add(
        origin.clone(),
        CoefficientTerm::new(c(2), c(1)),
    );
    assert_eq!(s.weight(&origin), Some(c(3)));

    let side = Offset::along(X, 1);
    s.apply_add(side.clone(), CoefficientTerm::new(c(1), c(3)));
    s.apply_add(side.clone(), CoefficientTerm::new(c(1), c(6)));
    let merged: Vec<_> = s.terms().filter(|(o, _)| **o == side).collect();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].1.numer, c(9));
    assert_eq!(merged[0].1.denom, c(18));
    assert_eq!(s.weight(&side), Some(Coefficient::rational(1, 2)));
}
