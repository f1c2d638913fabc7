// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Special-layer tags consulted when capturing.
//!
//! A node tagged [`SpecialLayers::SECURITY`] or [`SpecialLayers::SKIP`] must
//! never appear in a capture. The tag applies to the node's whole subtree.

use std::collections::BTreeMap;
use std::ops::{BitOr, BitOrAssign};

use crate::node::NodeId;

/// A set of special-layer tags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecialLayers(u8);

impl SpecialLayers {
    /// No tags.
    pub const NONE: Self = Self(0);
    /// Protected content (e.g. password fields); redacted in captures.
    pub const SECURITY: Self = Self(1 << 0);
    /// Excluded from captures and mirrored output.
    pub const SKIP: Self = Self(1 << 1);

    /// Tags that force redaction during capture.
    pub const REDACTED: Self = Self(Self::SECURITY.0 | Self::SKIP.0);

    /// Returns `true` if any tag in `other` is present.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` if every tag in `other` is present.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no tag is present.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Adds or removes the tags in `other`.
    #[inline]
    pub fn set(&mut self, other: Self, enabled: bool) {
        if enabled {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }
}

impl BitOr for SpecialLayers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for SpecialLayers {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Tags found in a display's subtree, keyed by the node that carries them.
///
/// Built on the producer side while staging and read-only afterwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpecialLayerRegistry {
    tagged: BTreeMap<NodeId, SpecialLayers>,
    union: SpecialLayers,
}

impl SpecialLayerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the tags of `node`. Empty tag sets are not stored.
    pub fn insert(&mut self, node: NodeId, tags: SpecialLayers) {
        if tags.is_empty() {
            return;
        }
        *self.tagged.entry(node).or_default() |= tags;
        self.union |= tags;
    }

    /// Returns `true` if any node in the subtree carries one of `tags`.
    #[must_use]
    pub fn find(&self, tags: SpecialLayers) -> bool {
        self.union.intersects(tags)
    }

    /// Returns the tags recorded for `node`.
    #[must_use]
    pub fn tags_of(&self, node: NodeId) -> SpecialLayers {
        self.tagged.get(&node).copied().unwrap_or_default()
    }

    /// Returns the ids of nodes carrying any of `tags`, in id order.
    pub fn ids(&self, tags: SpecialLayers) -> impl Iterator<Item = NodeId> + '_ {
        self.tagged
            .iter()
            .filter(move |(_, t)| t.intersects(tags))
            .map(|(id, _)| *id)
    }

    /// Returns the number of tagged nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tagged.len()
    }

    /// Returns `true` if no node is tagged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tagged.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_clear_tags() {
        let mut tags = SpecialLayers::NONE;
        tags.set(SpecialLayers::SECURITY, true);
        assert!(tags.contains(SpecialLayers::SECURITY));
        assert!(tags.intersects(SpecialLayers::REDACTED));
        tags.set(SpecialLayers::SECURITY, false);
        assert!(tags.is_empty());
    }

    #[test]
    fn registry_tracks_union_and_ids() {
        let mut reg = SpecialLayerRegistry::new();
        reg.insert(NodeId(7), SpecialLayers::SKIP);
        reg.insert(NodeId(3), SpecialLayers::SECURITY);
        reg.insert(NodeId(9), SpecialLayers::NONE);

        assert!(reg.find(SpecialLayers::SECURITY));
        assert!(reg.find(SpecialLayers::SKIP));
        assert_eq!(reg.len(), 2);
        let secure: Vec<_> = reg.ids(SpecialLayers::SECURITY).collect();
        assert_eq!(secure, vec![NodeId(3)]);
        assert_eq!(reg.tags_of(NodeId(9)), SpecialLayers::NONE);
    }
}
