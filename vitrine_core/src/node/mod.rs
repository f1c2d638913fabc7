// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene tree data model.
//!
//! The scene is a forest of three node kinds:
//!
//! - [`ScreenNode`]: one per display sink. Always a root. Owns the damage
//!   tracker, the HDR headroom map, and the screen-to-screen mirror
//!   relationship.
//! - [`LogicalDisplayNode`]: one content rectangle of a screen, attached
//!   under the screen whose [`ScreenId`](crate::output::ScreenId) it names.
//! - [`SurfaceNode`]: a leaf content producer.
//!
//! All nodes live in one [`SceneTree`] arena owned by the producer context.
//! Relationships (parent, mirror source) are stored as ids rather than
//! references, so there are no ownership cycles to break.
//!
//! # Dirty tracking
//!
//! Mutations mark the channels in [`dirty`](crate::dirty):
//!
//! - **GEOMETRY**: transform changes; propagates to every descendant.
//! - **PARAMS**: any render-relevant field; local to the node (and to the
//!   display whose special-layer registry it feeds).
//! - **TOPOLOGY**: child list changes on both ends of the edge.
//!
//! [`SceneTree::sync`] drains the channels into a
//! [`SyncBatch`](crate::sync::SyncBatch).

mod display;
mod id;
mod modifier;
mod screen;
mod surface;
mod sync;
mod traverse;
mod tree;

pub(crate) use display::DisplayCommandTarget;
pub use display::{LogicalDisplayConfig, LogicalDisplayNode, rotation_from_angle};
pub use id::{INVALID, NodeId};
pub use modifier::{Modifier, ModifierSlots, ModifierType, PropertyValue};
pub use screen::{SKIP_FRAME_JITTER, ScreenNode, ScreenNodeConfig};
pub use surface::SurfaceNode;
pub use traverse::Children;
pub use tree::{NodeKind, NodeType, SceneTree};
