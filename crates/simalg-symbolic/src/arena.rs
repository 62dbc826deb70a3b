//! Integer-addressed node storage for expression evaluation
//!
//! Interning flattens an [`Expr`] tree into a vector of [`Node`]s. Structurally
//! equal subtrees share one [`NodeId`], which is what evaluation caches key
//! on. Embedded constants are stored as given and never deduplicated, since
//! payload values are not compared.

use crate::expr::{Expr, ExprKind};
use crate::leaf::Leaf;
use crate::stencil::DerivativeOp;
use simalg_algebra::{AlgebraicElem, ElementaryFn, Side};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ARENA_ID: AtomicU64 = AtomicU64::new(1);

fn next_arena_id() -> u64 {
    NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Node<V> {
    Leaf(Leaf),
    Constant(V),
    Zero,
    Identity,
    Add(Vec<NodeId>),
    Negate(NodeId),
    Multiply(NodeId, NodeId),
    Invert(Side, NodeId),
    Operator(DerivativeOp),
    Function(ElementaryFn, NodeId),
    DivideBy(NodeId, i64),
}

/// Dedup key: a node minus any payload value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Shape {
    Leaf(Leaf),
    Zero,
    Identity,
    Add(Vec<NodeId>),
    Negate(NodeId),
    Multiply(NodeId, NodeId),
    Invert(Side, NodeId),
    Operator(DerivativeOp),
    Function(ElementaryFn, NodeId),
    DivideBy(NodeId, i64),
}

impl<V> Node<V> {
    fn shape(&self) -> Option<Shape> {
        Some(match self {
            Node::Leaf(l) => Shape::Leaf(l.clone()),
            Node::Constant(_) => return None,
            Node::Zero => Shape::Zero,
            Node::Identity => Shape::Identity,
            Node::Add(ids) => Shape::Add(ids.clone()),
            Node::Negate(id) => Shape::Negate(*id),
            Node::Multiply(a, b) => Shape::Multiply(*a, *b),
            Node::Invert(side, id) => Shape::Invert(*side, *id),
            Node::Operator(op) => Shape::Operator(op.clone()),
            Node::Function(f, id) => Shape::Function(*f, *id),
            Node::DivideBy(id, n) => Shape::DivideBy(*id, *n),
        })
    }
}

#[derive(Debug)]
pub struct ExprArena<V: AlgebraicElem> {
    id: u64,
    nodes: Vec<Node<V>>,
    index: HashMap<Shape, NodeId>,
    fac: V::Factory,
}

impl<V: AlgebraicElem> ExprArena<V> {
    pub fn new(fac: V::Factory) -> Self {
        ExprArena {
            id: next_arena_id(),
            nodes: Vec::new(),
            index: HashMap::new(),
            fac,
        }
    }

    /// Process-unique identity; caches keyed on node ids are bound to it.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Factory of the values nodes evaluate to
    pub fn factory(&self) -> &V::Factory {
        &self.fac
    }

    pub fn node(&self, id: NodeId) -> &Node<V> {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn intern(&mut self, expr: &Expr<V>) -> NodeId {
        let node = match expr.kind() {
            ExprKind::Leaf(leaf) => Node::Leaf(leaf.clone()),
            ExprKind::Constant(value) => Node::Constant(value.clone()),
            ExprKind::Zero => Node::Zero,
            ExprKind::Identity => Node::Identity,
            ExprKind::Add(terms) => Node::Add(terms.iter().map(|t| self.intern(t)).collect()),
            ExprKind::Negate(inner) => Node::Negate(self.intern(inner)),
            ExprKind::Multiply(a, b) => {
                let a = self.intern(a);
                let b = self.intern(b);
                Node::Multiply(a, b)
            }
            ExprKind::Invert(side, inner) => Node::Invert(*side, self.intern(inner)),
            ExprKind::Operator(op) => Node::Operator(op.clone()),
            ExprKind::Function(f, inner) => Node::Function(*f, self.intern(inner)),
            ExprKind::DivideBy(inner, n) => Node::DivideBy(self.intern(inner), *n),
        };
        self.push(node)
    }

    fn push(&mut self, node: Node<V>) -> NodeId {
        let shape = node.shape();
        if let Some(id) = shape.as_ref().and_then(|s| self.index.get(s)) {
            return *id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        if let Some(shape) = shape {
            self.index.insert(shape, id);
        }
        id
    }
}

impl<V: AlgebraicElem> Clone for ExprArena<V> {
    // a clone may grow independently, so it must not share cache entries
    fn clone(&self) -> Self {
        ExprArena {
            id: next_arena_id(),
            nodes: self.nodes.clone(),
            index: self.index.clone(),
            fac: self.fac.clone(),
        }
    }
}
