// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Client-owned property modifiers attached to nodes.

use std::collections::BTreeMap;

use kurbo::{Affine, Rect};

use super::id::NodeId;

/// Which property a modifier drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModifierType {
    /// Bounds rectangle.
    Bounds,
    /// Frame rectangle.
    Frame,
    /// Alpha.
    Alpha,
    /// Transform.
    Transform,
    /// Custom client property.
    Custom,
}

/// A value written by a modifier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    /// Scalar value.
    Float(f32),
    /// Rectangle value.
    Rect(Rect),
    /// Affine transform value.
    Transform(Affine),
}

/// A property modifier. Its id carries the owning process in the upper bits
/// (see [`NodeId::pid`]).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Modifier {
    /// Modifier identity.
    pub id: NodeId,
    /// Driven property.
    pub ty: ModifierType,
    /// Current value.
    pub value: PropertyValue,
}

/// Modifiers of one node, bucketed by type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModifierSlots {
    slots: BTreeMap<ModifierType, Vec<Modifier>>,
}

impl ModifierSlots {
    /// Attaches a modifier, replacing any with the same id and type.
    pub fn add(&mut self, modifier: Modifier) {
        let slot = self.slots.entry(modifier.ty).or_default();
        slot.retain(|m| m.id != modifier.id);
        slot.push(modifier);
    }

    /// Removes every modifier owned by `pid`, across all types.
    ///
    /// Returns the number of modifiers removed.
    pub fn clear_by_pid(&mut self, pid: u32) -> usize {
        let mut removed = 0;
        for slot in self.slots.values_mut() {
            let before = slot.len();
            slot.retain(|m| m.id.pid() != pid);
            removed += before - slot.len();
        }
        self.slots.retain(|_, slot| !slot.is_empty());
        removed
    }

    /// Returns the modifiers of type `ty`.
    #[must_use]
    pub fn of_type(&self, ty: ModifierType) -> &[Modifier] {
        self.slots.get(&ty).map_or(&[], Vec::as_slice)
    }

    /// Returns the total number of modifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.values().map(Vec::len).sum()
    }

    /// Returns `true` if no modifier is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
