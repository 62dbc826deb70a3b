//! Implicit spaces: the binding environment an expression is evaluated in

use crate::expr::{Expr, ExprFactory};
use crate::leaf::Leaf;
use simalg_algebra::AlgebraicFactory;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SPACE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a binding state. Two evaluations may share cache entries only
/// when their tokens are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpaceToken {
    id: u64,
    generation: u64,
}

impl SpaceToken {
    /// A token no other space has handed out
    pub fn fresh() -> Self {
        SpaceToken {
            id: NEXT_SPACE_ID.fetch_add(1, Ordering::Relaxed),
            generation: 0,
        }
    }

    pub fn with_generation(self, generation: u64) -> Self {
        SpaceToken { generation, ..self }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Resolves leaves to values.
pub trait ImplicitSpace<V> {
    fn token(&self) -> SpaceToken;

    fn lookup(&self, leaf: &Leaf) -> Option<V>;
}

impl<V, S: ImplicitSpace<V> + ?Sized> ImplicitSpace<V> for &S {
    fn token(&self) -> SpaceToken {
        (**self).token()
    }

    fn lookup(&self, leaf: &Leaf) -> Option<V> {
        (**self).lookup(leaf)
    }
}

/// Hash-map bindings. Every mutation hands out a fresh token.
#[derive(Debug, Clone)]
pub struct MapSpace<V> {
    token: SpaceToken,
    values: HashMap<Leaf, V>,
}

impl<V: Clone> MapSpace<V> {
    pub fn new() -> Self {
        MapSpace {
            token: SpaceToken::fresh(),
            values: HashMap::new(),
        }
    }

    pub fn bind(&mut self, leaf: Leaf, value: V) {
        self.values.insert(leaf, value);
        self.token = SpaceToken::fresh();
    }

    pub fn with(mut self, leaf: Leaf, value: V) -> Self {
        self.bind(leaf, value);
        self
    }

    pub fn get(&self, leaf: &Leaf) -> Option<&V> {
        self.values.get(leaf)
    }
}

impl<V: Clone> Default for MapSpace<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ImplicitSpace<V> for MapSpace<V> {
    fn token(&self) -> SpaceToken {
        self.token
    }

    fn lookup(&self, leaf: &Leaf) -> Option<V> {
        self.values.get(leaf).cloned()
    }
}

/// First-level space for nested expressions: every leaf resolves to itself
/// as a leaf of the inner expression algebra.
#[derive(Debug, Clone)]
pub struct SymbolicSpace<F> {
    token: SpaceToken,
    fac: ExprFactory<F>,
}

impl<F: AlgebraicFactory> SymbolicSpace<F> {
    pub fn new(inner: F) -> Self {
        SymbolicSpace {
            token: SpaceToken::fresh(),
            fac: ExprFactory::new(inner),
        }
    }
}

impl<F: AlgebraicFactory> ImplicitSpace<Expr<F::Elem>> for SymbolicSpace<F> {
    fn token(&self) -> SpaceToken {
        self.token
    }

    fn lookup(&self, leaf: &Leaf) -> Option<Expr<F::Elem>> {
        Some(self.fac.leaf(leaf.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprKind;
    use simalg_algebra::F64Factory;

    #[test]
    fn test_tokens_change_on_rebinding() {
        let mut space = MapSpace::new().with(Leaf::named("a"), 1.0);
        let before = space.token();
        space.bind(Leaf::named("b"), 2.0);
        assert_ne!(before, space.token());
        assert_eq!(space.lookup(&Leaf::named("b")), Some(2.0));
        assert_eq!(space.lookup(&Leaf::named("c")), None);
    }

    #[test]
    fn test_symbolic_space_lifts_leaves() {
        let space = SymbolicSpace::new(F64Factory);
        let lifted = space.lookup(&Leaf::named("nu")).unwrap();
        assert!(matches!(lifted.kind(), ExprKind::Leaf(l) if *l == Leaf::named("nu")));
        let token = space.token();
        assert_eq!(token.with_generation(3).generation(), 3);
        assert_ne!(token, token.with_generation(3));
    }
}
