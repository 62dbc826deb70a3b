//! Finite-difference stencil synthesis
//!
//! A [`DerivativeOp`] names a (possibly mixed) partial derivative. Lowering it
//! against per-ordinate [`StepSizes`] produces a [`Stencil`]: a map from grid
//! offset to an exact rational weight, such that summing
//! `weight * sample(offset)` gives the central-difference approximation.
//!
//! Weights are kept as `numerator / denominator` pairs of [`Coefficient`]s
//! and merged exactly; no floating point enters until a payload embeds the
//! final weight.

use crate::leaf::{Offset, Ordinate};
use crate::{Result, SymbolicError};
use serde::{Deserialize, Serialize};
use simalg_algebra::Coefficient;
use std::collections::BTreeMap;
use std::fmt;

/// Partial derivative request: order per ordinate
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DerivativeOp {
    orders: BTreeMap<Ordinate, u32>,
}

impl DerivativeOp {
    pub fn partial(ord: Ordinate, order: u32) -> Self {
        let mut orders = BTreeMap::new();
        if order > 0 {
            orders.insert(ord, order);
        }
        DerivativeOp { orders }
    }

    pub fn mixed<I: IntoIterator<Item = (Ordinate, u32)>>(parts: I) -> Self {
        parts
            .into_iter()
            .fold(DerivativeOp::default(), |acc, (ord, order)| {
                acc.then(&DerivativeOp::partial(ord, order))
            })
    }

    pub fn order(&self, ord: Ordinate) -> u32 {
        self.orders.get(&ord).copied().unwrap_or(0)
    }

    pub fn orders(&self) -> impl Iterator<Item = (Ordinate, u32)> + '_ {
        self.orders.iter().map(|(o, n)| (*o, *n))
    }

    /// Composition `self ∘ other`; partial derivatives commute, so orders add.
    pub fn then(&self, other: &DerivativeOp) -> DerivativeOp {
        let mut orders = self.orders.clone();
        for (ord, n) in other.orders() {
            *orders.entry(ord).or_insert(0) += n;
        }
        DerivativeOp { orders }
    }
}

impl fmt::Display for DerivativeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d[")?;
        for (i, (ord, n)) in self.orders().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{ord}^{n}")?;
        }
        write!(f, "]")
    }
}

/// Grid spacing per ordinate, kept exact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepSizes {
    steps: BTreeMap<Ordinate, Coefficient>,
}

impl StepSizes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ord: Ordinate, step: Coefficient) -> Self {
        self.steps.insert(ord, step);
        self
    }

    pub fn insert(&mut self, ord: Ordinate, step: Coefficient) {
        self.steps.insert(ord, step);
    }

    pub fn get(&self, ord: Ordinate) -> Result<&Coefficient> {
        self.steps
            .get(&ord)
            .ok_or(SymbolicError::MissingStepSize(ord))
    }
}

/// Exact weight held as an unreduced fraction of coefficients
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoefficientTerm {
    pub numer: Coefficient,
    pub denom: Coefficient,
}

impl CoefficientTerm {
    pub fn new(numer: Coefficient, denom: Coefficient) -> Self {
        CoefficientTerm { numer, denom }
    }

    pub fn one() -> Self {
        CoefficientTerm::new(Coefficient::one(), Coefficient::one())
    }

    /// Exact sum: numerators add over a shared denominator, otherwise the
    /// fractions are cross-multiplied.
    pub fn merge(&self, other: &CoefficientTerm) -> CoefficientTerm {
        if self.denom == other.denom {
            return CoefficientTerm::new(
                self.numer.clone() + other.numer.clone(),
                self.denom.clone(),
            );
        }
        let numer = self.numer.clone() * other.denom.clone()
            + other.numer.clone() * self.denom.clone();
        CoefficientTerm::new(numer, self.denom.clone() * other.denom.clone())
    }

    fn scaled(&self, numer_factor: i64, denom_factor: &Coefficient) -> CoefficientTerm {
        CoefficientTerm::new(
            self.numer.clone() * Coefficient::int(numer_factor),
            self.denom.clone() * denom_factor.clone(),
        )
    }

    /// The weight as a single rational
    pub fn value(&self) -> Coefficient {
        self.numer.clone() / self.denom.clone()
    }
}

/// Map from offset to weight
#[derive(Debug, Clone, PartialEq)]
pub struct Stencil {
    terms: BTreeMap<Offset, CoefficientTerm>,
}

impl Stencil {
    /// Order zero: weight 1 at the origin
    pub fn identity() -> Self {
        let mut terms = BTreeMap::new();
        terms.insert(Offset::zero(), CoefficientTerm::one());
        Stencil { terms }
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Offset, &CoefficientTerm)> {
        self.terms.iter()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn weight(&self, offset: &Offset) -> Option<Coefficient> {
        self.terms.get(offset).map(CoefficientTerm::value)
    }

    /// Insert a term, merging exactly with whatever already sits at `offset`.
    pub fn apply_add(&mut self, offset: Offset, term: CoefficientTerm) {
        match self.terms.get_mut(&offset) {
            Some(existing) => *existing = existing.merge(&term),
            None => {
                self.terms.insert(offset, term);
            }
        }
    }

    /// Apply the order-`n` central difference along `ord` with step `h` to
    /// every term of this stencil.
    pub fn apply_derivative(&self, ord: Ordinate, n: u32, h: &Coefficient) -> Stencil {
        match n {
            0 => self.clone(),
            1 => {
                let denom = Coefficient::int(2) * h.clone();
                self.spread(ord, &[(-1, -1), (1, 1)], &denom)
            }
            2 => {
                let denom = h.clone() * h.clone();
                self.spread(ord, &[(-1, 1), (0, -2), (1, 1)], &denom)
            }
            3 => {
                let denom = Coefficient::int(2) * h.pow_int(3);
                self.spread(ord, &[(-2, -1), (-1, 2), (1, -2), (2, 1)], &denom)
            }
            _ => self
                .apply_derivative(ord, 3, h)
                .apply_derivative(ord, n - 3, h),
        }
    }

    fn spread(&self, ord: Ordinate, pattern: &[(i64, i64)], denom: &Coefficient) -> Stencil {
        let mut out = Stencil {
            terms: BTreeMap::new(),
        };
        for (offset, term) in &self.terms {
            for &(delta, weight) in pattern {
                let mut at = offset.clone();
                at.bump(ord, delta);
                out.apply_add(at, term.scaled(weight, denom));
            }
        }
        out
    }
}

/// Lower a derivative request to its stencil. Mixed derivatives feed the
/// stencil of one ordinate into the expansion of the next.
pub fn synthesize(op: &DerivativeOp, steps: &StepSizes) -> Result<Stencil> {
    let mut stencil = Stencil::identity();
    for (ord, n) in op.orders() {
        let h = steps.get(ord)?;
        stencil = stencil.apply_derivative(ord, n, h);
    }
    Ok(stencil)
}
