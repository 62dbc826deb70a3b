//! Terminal identities: ordinates, offsets and leaves

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A grid axis (time, a spatial direction, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ordinate(pub u32);

impl fmt::Display for Ordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "o{}", self.0)
    }
}

/// Integer displacement per ordinate.
///
/// Zero components are never stored, so `{t: 0}` and `{}` compare and hash
/// equal. Offsets order by signed displacement along each ordinate in turn,
/// so along one axis `-1 < 0 < +1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Offset(BTreeMap<Ordinate, i64>);

impl Ord for Offset {
    fn cmp(&self, other: &Self) -> Ordering {
        let axes: BTreeSet<Ordinate> = self.0.keys().chain(other.0.keys()).copied().collect();
        axes.into_iter()
            .map(|ord| self.get(ord).cmp(&other.get(ord)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for Offset {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Offset {
    pub fn zero() -> Self {
        Offset(BTreeMap::new())
    }

    pub fn from_pairs<I: IntoIterator<Item = (Ordinate, i64)>>(pairs: I) -> Self {
        let mut out = Offset::zero();
        for (ord, delta) in pairs {
            out.bump(ord, delta);
        }
        out
    }

    pub fn along(ord: Ordinate, delta: i64) -> Self {
        Offset::from_pairs([(ord, delta)])
    }

    pub fn get(&self, ord: Ordinate) -> i64 {
        self.0.get(&ord).copied().unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Ordinate, i64)> + '_ {
        self.0.iter().map(|(o, d)| (*o, *d))
    }

    /// Add `delta` along `ord`, dropping the component if it cancels.
    pub fn bump(&mut self, ord: Ordinate, delta: i64) {
        if delta == 0 {
            return;
        }
        let next = self.get(ord) + delta;
        if next == 0 {
            self.0.remove(&ord);
        } else {
            self.0.insert(ord, next);
        }
    }

    pub fn shifted(&self, by: &Offset) -> Offset {
        let mut out = self.clone();
        for (ord, delta) in by.iter() {
            out.bump(ord, delta);
        }
        out
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (ord, delta)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{ord}{delta:+}")?;
        }
        write!(f, "]")
    }
}

/// Opaque terminal of an expression tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Leaf {
    /// A free quantity identified by name; never shifted by stencils.
    Named(Arc<str>),
    /// The sampled unknown at a grid offset relative to the evaluation point.
    Sample(Offset),
}

impl Leaf {
    pub fn named(name: &str) -> Self {
        Leaf::Named(Arc::from(name))
    }

    pub fn sample(offset: Offset) -> Self {
        Leaf::Sample(offset)
    }

    /// The leaf as seen from an evaluation point displaced by `by`.
    pub fn shifted(&self, by: &Offset) -> Leaf {
        match self {
            Leaf::Named(_) => self.clone(),
            Leaf::Sample(offset) if by.is_zero() => Leaf::Sample(offset.clone()),
            Leaf::Sample(offset) => Leaf::Sample(offset.shifted(by)),
        }
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leaf::Named(name) => write!(f, "{name}"),
            Leaf::Sample(offset) => write!(f, "u{offset}"),
        }
    }
}

/// Set of leaves a partial derivative is taken with respect to
pub type WrtSet = BTreeSet<Leaf>;

/// Convenience for the common single-variable case
pub fn wrt(leaf: Leaf) -> WrtSet {
    let mut set = WrtSet::new();
    set.insert(leaf);
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: Ordinate = Ordinate(0);
    const X: Ordinate = Ordinate(1);

    #[test]
    fn test_zero_components_are_dropped() {
        let a = Offset::from_pairs([(T, 1), (X, 0)]);
        assert_eq!(a, Offset::along(T, 1));
        let back = a.shifted(&Offset::along(T, -1));
        assert!(back.is_zero());
        assert_eq!(back, Offset::zero());
    }

    #[test]
    fn test_shifting_leaves() {
        let u = Leaf::sample(Offset::along(X, -1));
        let moved = u.shifted(&Offset::from_pairs([(T, 1), (X, 1)]));
        assert_eq!(moved, Leaf::sample(Offset::along(T, 1)));

        let nu = Leaf::named("nu");
        assert_eq!(nu.shifted(&Offset::along(X, 3)), nu);
        assert_eq!(moved.to_string(), "u[o0+1]");
    }

    #[test]
    fn test_offsets_order_by_signed_displacement() {
        let mut row: Vec<Offset> = [1, 0, -2, -1, 2].map(|d| Offset::along(X, d)).to_vec();
        row.sort();
        let deltas: Vec<i64> = row.iter().map(|o| o.get(X)).collect();
        assert_eq!(deltas, vec![-2, -1, 0, 1, 2]);

        // earlier ordinates dominate
        let past = Offset::from_pairs([(T, -1), (X, 5)]);
        let now = Offset::along(X, -5);
        assert!(past < now);
        assert!(Offset::along(T, 1) > Offset::along(X, 9));
    }
}
