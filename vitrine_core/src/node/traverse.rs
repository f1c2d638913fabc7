// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use super::id::{INVALID, NodeId};
use super::tree::SceneTree;

/// An iterator over the direct children of a node.
///
/// Created by [`SceneTree::children`].
#[derive(Debug)]
pub struct Children<'a> {
    tree: &'a SceneTree,
    current: u32,
}

impl<'a> Children<'a> {
    pub(crate) fn new(tree: &'a SceneTree, first: u32) -> Self {
        Self {
            tree,
            current: first,
        }
    }
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.current == INVALID {
            return None;
        }
        let idx = self.current;
        self.current = self.tree.next_sibling[idx as usize];
        Some(self.tree.ids[idx as usize])
    }
}

impl SceneTree {
    /// Iterates the slots of the direct children of `idx`.
    pub(crate) fn child_slots(&self, idx: u32) -> impl Iterator<Item = u32> + '_ {
        let first = self.first_child[idx as usize];
        core::iter::successors((first != INVALID).then_some(first), |&c| {
            let next = self.next_sibling[c as usize];
            (next != INVALID).then_some(next)
        })
    }

    /// Collects the slots below `idx` in depth-first pre-order, excluding
    /// `idx` itself.
    pub(crate) fn descendant_slots(&self, idx: u32) -> Vec<u32> {
        let mut out = Vec::new();
        let mut stack: Vec<u32> = self.child_slots(idx).collect();
        stack.reverse();
        while let Some(c) = stack.pop() {
            out.push(c);
            let first = stack.len();
            stack.extend(self.child_slots(c));
            stack[first..].reverse();
        }
        out
    }

    /// Returns `true` if `ancestor` is `idx` or lies on its parent chain.
    pub(crate) fn is_ancestor_or_self(&self, ancestor: u32, idx: u32) -> bool {
        let mut cur = idx;
        while cur != INVALID {
            if cur == ancestor {
                return true;
            }
            cur = self.parent[cur as usize];
        }
        false
    }

    /// Rebuilds the depth-first pre-order traversal of all live nodes.
    pub(crate) fn rebuild_traversal_order(&mut self) {
        let mut order = Vec::with_capacity(self.index.len());
        for idx in 0..self.len {
            if self.parent[idx as usize] == INVALID && self.nodes[idx as usize].is_some() {
                order.push(idx);
                order.extend(self.descendant_slots(idx));
            }
        }
        self.traversal_order = order;
        self.traversal_dirty = false;
    }
}
