//! Height-balanced (AVL) trees over arena-resident nodes.
//!
//! Every bucket of the pool owns one tree. Nodes live in a shared
//! [`NodeStore`] and refer to each other by [`ArenaIndex`]; `ArenaIndex::NIL`
//! marks an absent child or parent. The functions here never allocate: the
//! caller places a leaf in the store first and then calls [`attach`], which
//! links it and restores the balance invariant with at most one rotation.

use std::cmp::Ordering;

use thiserror::Error;

use crate::memory::{ArenaIndex, BlockArena};

pub type NodeStore = BlockArena<TreeNode>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Small,
    Large,
}

impl Side {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Self::Small => Self::Large,
            Self::Large => Self::Small,
        }
    }
}

/// One interned string inside one bucket tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeNode {
    pub small: ArenaIndex,
    pub large: ArenaIndex,
    /// Back-reference only; the store owns every node.
    pub parent: ArenaIndex,
    pub height: i32,
    /// Index of the string record this node stands for.
    pub record: ArenaIndex,
}

impl TreeNode {
    /// A fresh leaf: no children, height 0.
    pub fn leaf(record: ArenaIndex, parent: ArenaIndex) -> Self {
        Self {
            small: ArenaIndex::NIL,
            large: ArenaIndex::NIL,
            parent,
            height: 0,
            record,
        }
    }

    #[inline]
    pub fn child(&self, side: Side) -> ArenaIndex {
        match side {
            Side::Small => self.small,
            Side::Large => self.large,
        }
    }

    #[inline]
    fn set_child(&mut self, side: Side, child: ArenaIndex) {
        match side {
            Side::Small => self.small = child,
            Side::Large => self.large = child,
        }
    }
}

/// Outcome of walking a tree for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Found(ArenaIndex),
    /// The key belongs at `parent.side`. A NIL `parent` means the tree is
    /// empty and the key becomes the root.
    Vacant { parent: ArenaIndex, side: Side },
}

/// Walk from `root`. `cmp` orders the searched key against a node's value.
pub fn probe(
    nodes: &NodeStore,
    root: ArenaIndex,
    mut cmp: impl FnMut(&TreeNode) -> Ordering,
) -> Probe {
    let mut parent = ArenaIndex::NIL;
    let mut side = Side::Small;
    let mut cursor = root;
    while !cursor.is_nil() {
        let node = &nodes[cursor];
        side = match cmp(node) {
            Ordering::Equal => return Probe::Found(cursor),
            Ordering::Less => Side::Small,
            Ordering::Greater => Side::Large,
        };
        parent = cursor;
        cursor = node.child(side);
    }
    Probe::Vacant { parent, side }
}

pub fn find(
    nodes: &NodeStore,
    root: ArenaIndex,
    cmp: impl FnMut(&TreeNode) -> Ordering,
) -> Option<ArenaIndex> {
    match probe(nodes, root, cmp) {
        Probe::Found(idx) => Some(idx),
        Probe::Vacant { .. } => None,
    }
}

/// Link `leaf` (already stored, with its parent index set) at the position
/// reported by [`probe`] and rebalance.
pub fn attach(nodes: &mut NodeStore, root_slot: &mut ArenaIndex, leaf: ArenaIndex, side: Side) {
    let parent = nodes[leaf].parent;
    if parent.is_nil() {
        *root_slot = leaf;
        return;
    }
    nodes[parent].set_child(side, leaf);
    rebalance_after_insert(nodes, root_slot, leaf);
}

#[inline]
fn height_of(nodes: &NodeStore, idx: ArenaIndex) -> i32 {
    if idx.is_nil() {
        -1
    } else {
        nodes[idx].height
    }
}

#[inline]
fn balance_of(nodes: &NodeStore, idx: ArenaIndex) -> i32 {
    let node = &nodes[idx];
    height_of(nodes, node.small) - height_of(nodes, node.large)
}

#[inline]
fn refresh_height(nodes: &mut NodeStore, idx: ArenaIndex) {
    let node = nodes[idx];
    let height = height_of(nodes, node.small).max(height_of(nodes, node.large)) + 1;
    nodes[idx].height = height;
}

#[inline]
fn side_of(nodes: &NodeStore, parent: ArenaIndex, child: ArenaIndex) -> Side {
    if nodes[parent].small == child {
        Side::Small
    } else {
        Side::Large
    }
}

#[inline]
fn set_parent(nodes: &mut NodeStore, idx: ArenaIndex, parent: ArenaIndex) {
    if !idx.is_nil() {
        nodes[idx].parent = parent;
    }
}

/// Put `new` where `old` hangs: in `old`'s parent's child slot, or in the
/// bucket root slot when `old` was the root. Also fixes `new.parent`.
/// Every rotation reattaches its subtree through this one primitive.
fn replace_child(
    nodes: &mut NodeStore,
    root_slot: &mut ArenaIndex,
    old: ArenaIndex,
    new: ArenaIndex,
) {
    let parent = nodes[old].parent;
    nodes[new].parent = parent;
    if parent.is_nil() {
        *root_slot = new;
        return;
    }
    let side = side_of(nodes, parent, old);
    nodes[parent].set_child(side, new);
}

fn rebalance_after_insert(nodes: &mut NodeStore, root_slot: &mut ArenaIndex, leaf: ArenaIndex) {
    let mut child = leaf;
    let mut parent = nodes[leaf].parent;
    if parent.is_nil() || nodes[parent].height > 0 {
        // root, or the parent already had a child on its other side
        return;
    }
    nodes[parent].height = 1;
    let mut grand = nodes[parent].parent;
    while !grand.is_nil() {
        let heavy = match balance_of(nodes, grand) {
            0 => return,
            2 => Side::Small,
            -2 => Side::Large,
            _ => {
                let height = nodes[parent].height + 1;
                nodes[grand].height = height;
                child = parent;
                parent = grand;
                grand = nodes[grand].parent;
                continue;
            }
        };
        let rotation = Rotation::classify(heavy, side_of(nodes, parent, child));
        rotation.apply(nodes, root_slot, grand, parent, child);
        return;
    }
}

/// The four insertion rebalancing cases, named by the heavy side of the
/// unbalanced node G followed by the side of the inserted path under its
/// child P.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    SmallSmall,
    SmallLarge,
    LargeSmall,
    LargeLarge,
}

impl Rotation {
    pub fn classify(heavy: Side, path: Side) -> Self {
        match (heavy, path) {
            (Side::Small, Side::Small) => Self::SmallSmall,
            (Side::Small, Side::Large) => Self::SmallLarge,
            (Side::Large, Side::Small) => Self::LargeSmall,
            (Side::Large, Side::Large) => Self::LargeLarge,
        }
    }

    /// Restructure the G/P/N path in place.
    fn apply(
        self,
        nodes: &mut NodeStore,
        root_slot: &mut ArenaIndex,
        grand: ArenaIndex,
        parent: ArenaIndex,
        child: ArenaIndex,
    ) {
        match self {
            Self::SmallSmall => rotate_single(nodes, root_slot, grand, parent, Side::Small),
            Self::LargeLarge => rotate_single(nodes, root_slot, grand, parent, Side::Large),
            Self::SmallLarge => rotate_double(nodes, root_slot, grand, parent, child, Side::Small),
            Self::LargeSmall => rotate_double(nodes, root_slot, grand, parent, child, Side::Large),
        }
    }
}

/// P takes G's place; G becomes P's child on the light side and inherits
/// P's former light-side subtree.
fn rotate_single(
    nodes: &mut NodeStore,
    root_slot: &mut ArenaIndex,
    grand: ArenaIndex,
    parent: ArenaIndex,
    heavy: Side,
) {
    let light = heavy.opposite();
    let moved = nodes[parent].child(light);

    replace_child(nodes, root_slot, grand, parent);
    nodes[parent].set_child(light, grand);

    let g = &mut nodes[grand];
    g.parent = parent;
    g.set_child(heavy, moved);
    g.height -= 1;
    set_parent(nodes, moved, grand);
}

/// N takes G's place with G's height; P and G become its children and split
/// N's former subtrees between them.
fn rotate_double(
    nodes: &mut NodeStore,
    root_slot: &mut ArenaIndex,
    grand: ArenaIndex,
    parent: ArenaIndex,
    child: ArenaIndex,
    heavy: Side,
) {
    let light = heavy.opposite();
    let to_parent = nodes[child].child(heavy);
    let to_grand = nodes[child].child(light);

    replace_child(nodes, root_slot, grand, child);
    let height = nodes[grand].height;
    let n = &mut nodes[child];
    n.set_child(heavy, parent);
    n.set_child(light, grand);
    n.height = height;

    let g = &mut nodes[grand];
    g.parent = child;
    g.set_child(heavy, to_grand);
    set_parent(nodes, to_grand, grand);
    refresh_height(nodes, grand);

    let p = &mut nodes[parent];
    p.parent = child;
    p.set_child(light, to_parent);
    set_parent(nodes, to_parent, parent);
    refresh_height(nodes, parent);
}

/// Height of the tree under `root`; -1 when empty.
pub fn height(nodes: &NodeStore, root: ArenaIndex) -> i32 {
    height_of(nodes, root)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeViolation {
    #[error("node {node:?} does not point back at its parent {expected:?}")]
    BrokenParentLink {
        node: ArenaIndex,
        expected: ArenaIndex,
    },

    #[error("node {node:?} stores height {stored} but its children give {computed}")]
    HeightMismatch {
        node: ArenaIndex,
        stored: i32,
        computed: i32,
    },

    #[error("node {node:?} has balance factor {balance}")]
    Unbalanced { node: ArenaIndex, balance: i32 },

    #[error("node {node:?} is out of order")]
    OutOfOrder { node: ArenaIndex },

    #[error("bucket counts {usage} insertions but its tree holds {nodes} nodes")]
    UsageMismatch { usage: u32, nodes: usize },
}

/// Verify ordering, parent links, stored heights and balance of the whole
/// tree under `root`. `order` compares the values of two nodes. Returns the
/// number of nodes.
pub fn check_subtree(
    nodes: &NodeStore,
    root: ArenaIndex,
    mut order: impl FnMut(&TreeNode, &TreeNode) -> Ordering,
) -> Result<usize, TreeViolation> {
    let mut in_order = Vec::new();
    if !root.is_nil() && !nodes[root].parent.is_nil() {
        return Err(TreeViolation::BrokenParentLink {
            node: root,
            expected: ArenaIndex::NIL,
        });
    }
    check_node(nodes, root, &mut in_order)?;
    for pair in in_order.windows(2) {
        if order(&nodes[pair[0]], &nodes[pair[1]]) != Ordering::Less {
            return Err(TreeViolation::OutOfOrder { node: pair[1] });
        }
    }
    Ok(in_order.len())
}

fn check_node(
    nodes: &NodeStore,
    idx: ArenaIndex,
    in_order: &mut Vec<ArenaIndex>,
) -> Result<i32, TreeViolation> {
    if idx.is_nil() {
        return Ok(-1);
    }
    let node = &nodes[idx];
    for child in [node.small, node.large] {
        if !child.is_nil() && nodes[child].parent != idx {
            return Err(TreeViolation::BrokenParentLink {
                node: child,
                expected: idx,
            });
        }
    }
    let small = check_node(nodes, node.small, in_order)?;
    in_order.push(idx);
    let large = check_node(nodes, node.large, in_order)?;

    let computed = small.max(large) + 1;
    if node.height != computed {
        return Err(TreeViolation::HeightMismatch {
            node: idx,
            stored: node.height,
            computed,
        });
    }
    let balance = small - large;
    if balance.abs() > 1 {
        return Err(TreeViolation::Unbalanced { node: idx, balance });
    }
    Ok(computed)
}
