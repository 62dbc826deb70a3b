//! Memo table for evaluation results
//!
//! A cache is bound to one arena and one [`SpaceToken`] at a time; binding
//! anything else discards every stored entry, so results never leak across
//! distinct implicit spaces or arenas.

use crate::arena::NodeId;
use crate::leaf::{Offset, WrtSet};
use crate::space::SpaceToken;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub node: NodeId,
    pub token: SpaceToken,
    pub shift: Offset,
    pub wrt: Option<WrtSet>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Clone)]
pub struct EvalCache<V> {
    bound: Option<(u64, SpaceToken)>,
    entries: HashMap<CacheKey, V>,
    hits: u64,
    misses: u64,
}

impl<V: Clone> EvalCache<V> {
    pub fn new() -> Self {
        EvalCache {
            bound: None,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Attach to `arena` and `token`, dropping entries recorded under any
    /// other binding.
    pub fn bind(&mut self, arena: u64, token: SpaceToken) {
        if self.bound != Some((arena, token)) {
            if !self.entries.is_empty() {
                log::trace!(
                    "evaluation cache rebound, dropping {} entries",
                    self.entries.len()
                );
            }
            self.entries.clear();
            self.bound = Some((arena, token));
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<V> {
        match self.entries.get(key) {
            Some(v) => {
                self.hits += 1;
                Some(v.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, value: V) {
        debug_assert_eq!(Some(key.token), self.bound.map(|(_, t)| t));
        self.entries.insert(key, value);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.bound = None;
    }
}

impl<V: Clone> Default for EvalCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
