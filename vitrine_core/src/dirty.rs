// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! The scene tree uses multi-channel dirty tracking (via [`understory_dirty`])
//! keyed by arena slot. Each channel is an independent category of change.
//!
//! # Propagation semantics
//!
//! - **Propagating**: [`GEOMETRY`] uses
//!   [`EagerPolicy`](understory_dirty::EagerPolicy) with dependency edges from
//!   child to parent. Moving a node moves every descendant, so the whole
//!   subtree gets its accumulated transform recomputed at the next sync.
//!
//! - **Local-only**: [`PARAMS`] is the tree-wide pending-sync list. Marking
//!   it means "this node's staging params may differ from what the consumer
//!   last saw". Only the marked node is drained.
//!
//! - **Structural**: [`TOPOLOGY`] is marked when children are added or
//!   removed. Topology is carried in each node's sync entry, so draining it
//!   only needs to re-stage the affected parents.
//!
//! # Consumption
//!
//! [`SceneTree::sync`](crate::node::SceneTree::sync) drains all channels and
//! turns the result into a [`SyncBatch`](crate::sync::SyncBatch).

use understory_dirty::Channel;

/// Local transform changed; accumulated transforms of the subtree are stale.
pub const GEOMETRY: Channel = Channel::new(0);

/// Render-relevant staging state changed; the node is pending sync.
pub const PARAMS: Channel = Channel::new(1);

/// Child list changed.
pub const TOPOLOGY: Channel = Channel::new(2);
