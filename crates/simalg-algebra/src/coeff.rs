//! Exact scalar weights
//!
//! Stencil weights, step sizes and equation constants are kept as exact
//! rationals for as long as the arithmetic fits in `i64`, and only then fall
//! back to floating point. Payload algebras embed them through
//! [`crate::AlgebraicFactory::coefficient`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Largest power of ten tried when recovering a decimal literal
const MAX_DECIMAL_DIGITS: u32 = 15;

fn gcd(a: i64, b: i64) -> u64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// An exact rational, or a float once exactness has been lost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Coefficient {
    /// Invariant: denominator > 0, gcd(num, den) == 1
    Rational(i64, i64),
    Float(f64),
}

impl Coefficient {
    pub fn int(n: i64) -> Self {
        Coefficient::Rational(n, 1)
    }

    pub fn zero() -> Self {
        Coefficient::int(0)
    }

    pub fn one() -> Self {
        Coefficient::int(1)
    }

    /// Create a reduced rational with the sign on the numerator
    pub fn rational(num: i64, den: i64) -> Self {
        if den == 0 {
            return Coefficient::Float(match num.cmp(&0) {
                Ordering::Less => f64::NEG_INFINITY,
                Ordering::Equal => f64::NAN,
                Ordering::Greater => f64::INFINITY,
            });
        }
        // reduce before moving the sign so that i64::MIN halves first
        let (num, den) = match i64::try_from(gcd(num, den)) {
            Ok(g) => (num / g, den / g),
            // gcd of 2^63: den is i64::MIN and num is 0 or i64::MIN
            Err(_) if num == 0 => (0, 1),
            Err(_) => (1, 1),
        };
        if den > 0 {
            return Coefficient::Rational(num, den);
        }
        match (num.checked_neg(), den.checked_neg()) {
            (Some(num), Some(den)) => Coefficient::Rational(num, den),
            _ => Coefficient::Float(num as f64 / den as f64),
        }
    }

    pub fn float(f: f64) -> Self {
        Coefficient::Float(f)
    }

    /// Recover the exact rational behind a short decimal literal such as
    /// `0.0025` (= 1/400). Values that are not short decimals stay floats.
    pub fn from_decimal(value: f64) -> Self {
        if !value.is_finite() {
            return Coefficient::Float(value);
        }
        let mut scale: i64 = 1;
        for _ in 0..=MAX_DECIMAL_DIGITS {
            let scaled = value * scale as f64;
            let rounded = scaled.round();
            if rounded.abs() < (1i64 << 53) as f64
                && (scaled - rounded).abs() <= 1e-9 * scaled.abs()
            {
                return Coefficient::rational(rounded as i64, scale);
            }
            scale = match scale.checked_mul(10) {
                Some(s) => s,
                None => break,
            };
        }
        Coefficient::Float(value)
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Coefficient::Rational(n, _) => *n == 0,
            Coefficient::Float(f) => *f == 0.0,
        }
    }

    pub fn is_one(&self) -> bool {
        match self {
            Coefficient::Rational(n, d) => *n == 1 && *d == 1,
            Coefficient::Float(f) => *f == 1.0,
        }
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Coefficient::Rational(n, _) => *n < 0,
            Coefficient::Float(f) => *f < 0.0,
        }
    }

    /// Whether the value is still held exactly
    pub fn is_exact(&self) -> bool {
        matches!(self, Coefficient::Rational(_, _))
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Coefficient::Rational(n, d) => *n as f64 / *d as f64,
            Coefficient::Float(f) => *f,
        }
    }

    pub fn recip(&self) -> Self {
        Coefficient::one() / self.clone()
    }

    pub fn pow_int(&self, exp: i32) -> Self {
        match self {
            Coefficient::Rational(n, d) => {
                let e = exp.unsigned_abs();
                match (n.checked_pow(e), d.checked_pow(e)) {
                    (Some(n), Some(d)) if exp >= 0 => Coefficient::Rational(n, d),
                    (Some(n), Some(d)) => Coefficient::rational(d, n),
                    _ => Coefficient::Float(self.to_f64().powi(exp)),
                }
            }
            Coefficient::Float(f) => Coefficient::Float(f.powi(exp)),
        }
    }
}

impl PartialEq for Coefficient {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Coefficient::Rational(n1, d1), Coefficient::Rational(n2, d2)) => n1 == n2 && d1 == d2,
            (Coefficient::Float(f1), Coefficient::Float(f2)) => {
                f1 == f2 || (f1.is_nan() && f2.is_nan())
            }
            _ => self.to_f64() == other.to_f64(),
        }
    }
}

impl Eq for Coefficient {}

impl PartialOrd for Coefficient {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coefficient {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Coefficient::Rational(n1, d1), Coefficient::Rational(n2, d2)) => {
                match (n1.checked_mul(*d2), n2.checked_mul(*d1)) {
                    (Some(a), Some(b)) => a.cmp(&b),
                    _ => self.to_f64().total_cmp(&other.to_f64()),
                }
            }
            _ => self.to_f64().total_cmp(&other.to_f64()),
        }
    }
}

// Hashes the numeric value so that `rational(1, 2)` and `Float(0.5)`,
// which compare equal, land in the same bucket.
impl std::hash::Hash for Coefficient {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        let f = self.to_f64();
        let bits = if f == 0.0 {
            0
        } else if f.is_nan() {
            f64::NAN.to_bits()
        } else {
            f.to_bits()
        };
        bits.hash(state);
    }
}

impl Default for Coefficient {
    fn default() -> Self {
        Coefficient::zero()
    }
}

impl From<i64> for Coefficient {
    fn from(n: i64) -> Self {
        Coefficient::int(n)
    }
}

impl From<i32> for Coefficient {
    fn from(n: i32) -> Self {
        Coefficient::int(n as i64)
    }
}

impl Neg for Coefficient {
    type Output = Coefficient;

    fn neg(self) -> Self::Output {
        match self {
            Coefficient::Rational(n, d) => match n.checked_neg() {
                Some(n) => Coefficient::Rational(n, d),
                None => Coefficient::Float(-(n as f64) / d as f64),
            },
            Coefficient::Float(f) => Coefficient::Float(-f),
        }
    }
}

impl Add for Coefficient {
    type Output = Coefficient;

    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Coefficient::Rational(n1, d1), Coefficient::Rational(n2, d2)) => {
                let exact = n1
                    .checked_mul(d2)
                    .zip(n2.checked_mul(d1))
                    .and_then(|(a, b)| a.checked_add(b))
                    .zip(d1.checked_mul(d2));
                match exact {
                    Some((num, den)) => Coefficient::rational(num, den),
                    None => Coefficient::Float(n1 as f64 / d1 as f64 + n2 as f64 / d2 as f64),
                }
            }
            (a, b) => Coefficient::Float(a.to_f64() + b.to_f64()),
        }
    }
}

impl Sub for Coefficient {
    type Output = Coefficient;

    fn sub(self, rhs: Self) -> Self::Output {
        self + (-rhs)
    }
}

impl Mul for Coefficient {
    type Output = Coefficient;

    fn mul(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Coefficient::Rational(n1, d1), Coefficient::Rational(n2, d2)) => {
                // cross-reduce first; denominators are never zero here
                // gcd <= denominator, so it fits back into i64
                let g1 = gcd(n1, d2).max(1) as i64;
                let g2 = gcd(n2, d1).max(1) as i64;
                let (n1, d2) = (n1 / g1, d2 / g1);
                let (n2, d1) = (n2 / g2, d1 / g2);
                match (n1.checked_mul(n2), d1.checked_mul(d2)) {
                    (Some(num), Some(den)) => Coefficient::rational(num, den),
                    _ => Coefficient::Float(n1 as f64 * n2 as f64 / (d1 as f64 * d2 as f64)),
                }
            }
            (a, b) => Coefficient::Float(a.to_f64() * b.to_f64()),
        }
    }
}

impl Div for Coefficient {
    type Output = Coefficient;

    fn div(self, rhs: Self) -> Self::Output {
        match rhs {
            Coefficient::Rational(0, _) => Coefficient::Float(self.to_f64() / 0.0),
            Coefficient::Rational(n, d) => self * Coefficient::rational(d, n),
            Coefficient::Float(f) => Coefficient::Float(self.to_f64() / f),
        }
    }
}

impl fmt::Display for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coefficient::Rational(n, 1) => write!(f, "{n}"),
            Coefficient::Rational(n, d) => write!(f, "{n}/{d}"),
            Coefficient::Float(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational_arithmetic() {
        let a = Coefficient::rational(1, 2);
        let b = Coefficient::rational(1, 3);

        assert_eq!(a.clone() + b.clone(), Coefficient::rational(5, 6));
        assert_eq!(a.clone() - b.clone(), Coefficient::rational(1, 6));
        assert_eq!(a.clone() * b.clone(), Coefficient::rational(1, 6));
        assert_eq!(a / b, Coefficient::rational(3, 2));
    }

    #[test]
    fn test_sign_and_reduction() {
        assert_eq!(Coefficient::rational(4, -6), Coefficient::Rational(-2, 3));
        assert!(Coefficient::rational(0, 5).is_zero());
        assert!(Coefficient::rational(7, 7).is_one());
    }

    #[test]
    fn test_decimal_literals_recover_exact_fractions() {
        assert_eq!(Coefficient::from_decimal(0.0025), Coefficient::rational(1, 400));
        assert_eq!(Coefficient::from_decimal(0.01), Coefficient::rational(1, 100));
        assert_eq!(Coefficient::from_decimal(1e-8), Coefficient::rational(1, 100_000_000));
        assert_eq!(Coefficient::from_decimal(-2.5), Coefficient::rational(-5, 2));
        assert!(!Coefficient::from_decimal(std::f64::consts::PI).is_exact());
    }

    #[test]
    fn test_power_and_reciprocal() {
        let h = Coefficient::rational(1, 100);
        assert_eq!(h.pow_int(2), Coefficient::rational(1, 10_000));
        assert_eq!(h.pow_int(-1), Coefficient::int(100));
        assert_eq!(Coefficient::rational(-2, 3).recip(), Coefficient::rational(-3, 2));
    }

    #[test]
    fn test_overflow_falls_back_to_float() {
        let big = Coefficient::int(i64::MAX / 2);
        let product = big.clone() * Coefficient::int(4);
        assert!(!product.is_exact());
        assert!((product.to_f64() - (i64::MAX / 2) as f64 * 4.0).abs() < 1e6);
    }

    #[test]
    fn test_extreme_numerators_do_not_panic() {
        let half_min = Coefficient::int(-(1i64 << 62));
        let sum = half_min.clone() + half_min;
        assert_eq!(sum, Coefficient::Rational(i64::MIN, 1));
        assert!(sum.is_exact());

        // 2^63 has no i64 numerator
        let flipped = Coefficient::rational(i64::MIN, -1);
        assert!(!flipped.is_exact());
        assert_eq!(flipped.to_f64(), 9.223372036854776e18);

        assert_eq!(Coefficient::rational(2, i64::MIN), Coefficient::Rational(-1, 1i64 << 62));
        assert_eq!(Coefficient::rational(i64::MIN, i64::MIN), Coefficient::one());
        assert!(Coefficient::rational(0, i64::MIN).is_zero());
        assert_eq!(
            Coefficient::int(i64::MIN) * Coefficient::rational(1, 2),
            Coefficient::int(-(1i64 << 62))
        );
        assert_eq!(Coefficient::int(2).pow_int(i32::MIN).to_f64(), 0.0);
    }

    #[test]
    fn test_equal_values_hash_alike() {
        use std::collections::hash_map::DefaultHasher;
        use std::collections::HashSet;
        use std::hash::{Hash, Hasher};

        fn hash_of(c: &Coefficient) -> u64 {
            let mut h = DefaultHasher::new();
            c.hash(&mut h);
            h.finish()
        }

        let exact = Coefficient::rational(1, 2);
        let float = Coefficient::float(0.5);
        assert_eq!(exact, float);
        assert_eq!(hash_of(&exact), hash_of(&float));
        assert_eq!(hash_of(&Coefficient::zero()), hash_of(&Coefficient::float(-0.0)));

        let set: HashSet<Coefficient> = [exact, float, Coefficient::rational(2, 4)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_ordering_is_exact_for_rationals() {
        let mut values = vec![
            Coefficient::rational(1, 3),
            Coefficient::rational(-1, 2),
            Coefficient::rational(1, 4),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Coefficient::rational(-1, 2),
                Coefficient::rational(1, 4),
                Coefficient::rational(1, 3)
            ]
        );
        assert_eq!(Coefficient::rational(3, 4).to_string(), "3/4");
    }
}
