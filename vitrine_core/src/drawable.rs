// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Consumer-side drawables built from sync batches.
//!
//! The consumer context owns a [`DrawableTree`]. Each [`Drawable`] is an
//! immutable `Arc` snapshot of one node's synced state; rendering and capture
//! clone the `Arc` to hold a handle across a frame. Applying a batch swaps in
//! new snapshots and never mutates one a handle can observe.
//!
//! Destroyed or replaced snapshots that still carry a client buffer, or that
//! are still held elsewhere, go to a graveyard.
//! [`collect_garbage`](DrawableTree::collect_garbage) frees the ones no
//! handle references anymore and hands their buffers back through the
//! buffer-release hook.

use std::collections::HashMap;
use std::sync::Arc;

use kurbo::Affine;

use crate::hooks::CallbackSlots;
use crate::node::{NodeId, NodeType};
use crate::params::{
    DisplayRenderParams, NodeParams, ScreenRenderParams, SurfaceBuffer, SurfaceRenderParams,
    SyncedParams,
};
use crate::sync::{SyncBatch, SyncEntry};
use crate::trace::{ApplyEvent, GcEvent, Tracer};

/// Synced snapshot of one node.
#[derive(Clone, Debug)]
pub struct Drawable {
    id: NodeId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    abs_transform: Affine,
    params: SyncedParams<NodeParams>,
}

impl Drawable {
    fn from_entry(entry: SyncEntry, frame_index: u64) -> Self {
        Self {
            id: entry.id,
            parent: entry.parent,
            children: entry.children,
            abs_transform: entry.abs_transform,
            params: SyncedParams::new(entry.params, frame_index),
        }
    }

    /// Node identity.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Parent node.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in draw order.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Accumulated transform from the root.
    #[must_use]
    pub fn abs_transform(&self) -> Affine {
        self.abs_transform
    }

    /// Frame in which the snapshot was written.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.params.frame_index()
    }

    /// Synced render parameters.
    #[must_use]
    pub fn params(&self) -> &NodeParams {
        self.params.get()
    }

    /// Kind of the node.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self.params.get() {
            NodeParams::Screen(_) => NodeType::Screen,
            NodeParams::Display(_) => NodeType::Display,
            NodeParams::Surface(_) => NodeType::Surface,
        }
    }

    /// Screen parameters, if this is a screen.
    #[must_use]
    pub fn as_screen(&self) -> Option<&ScreenRenderParams> {
        match self.params.get() {
            NodeParams::Screen(p) => Some(p),
            _ => None,
        }
    }

    /// Display parameters, if this is a logical display.
    #[must_use]
    pub fn as_display(&self) -> Option<&DisplayRenderParams> {
        match self.params.get() {
            NodeParams::Display(p) => Some(p),
            _ => None,
        }
    }

    /// Surface parameters, if this is a surface.
    #[must_use]
    pub fn as_surface(&self) -> Option<&SurfaceRenderParams> {
        match self.params.get() {
            NodeParams::Surface(p) => Some(p),
            _ => None,
        }
    }

    fn buffer(&self) -> Option<&SurfaceBuffer> {
        self.as_surface().and_then(|s| s.buffer.as_ref())
    }
}

/// Resolves node ids to synced drawables.
///
/// Implemented by [`DrawableTree`]; capture requests are written against this
/// trait.
pub trait NodeRegistry {
    /// Returns a handle to the drawable of `id`.
    fn drawable(&self, id: NodeId) -> Option<Arc<Drawable>>;

    /// Returns the ids of all screens, in the order they were first synced.
    fn screens(&self) -> Vec<NodeId>;
}

/// Consumer-owned tree of synced snapshots.
#[derive(Debug)]
pub struct DrawableTree {
    drawables: HashMap<NodeId, Arc<Drawable>>,
    screens: Vec<NodeId>,
    graveyard: Vec<Arc<Drawable>>,
    frame_index: u64,
    hooks: Arc<CallbackSlots>,
}

impl Default for DrawableTree {
    fn default() -> Self {
        Self::new(Arc::new(CallbackSlots::new()))
    }
}

impl DrawableTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new(hooks: Arc<CallbackSlots>) -> Self {
        Self {
            drawables: HashMap::new(),
            screens: Vec::new(),
            graveyard: Vec::new(),
            frame_index: 0,
            hooks,
        }
    }

    /// Frame index of the last applied batch.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Number of live drawables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.drawables.len()
    }

    /// Returns `true` if no drawable is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drawables.is_empty()
    }

    /// Number of retired snapshots awaiting collection.
    #[must_use]
    pub fn graveyard_len(&self) -> usize {
        self.graveyard.len()
    }

    /// Returns a handle to the drawable of `id`.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<Arc<Drawable>> {
        self.drawables.get(&id).cloned()
    }

    /// Applies one frame's batch.
    ///
    /// Each node's synced half is written at most once per frame; an entry
    /// for a node already written in this or a later frame is rejected.
    /// Returns the number of entries written.
    pub fn apply(&mut self, batch: SyncBatch) -> usize {
        self.apply_with_tracer(batch, &mut Tracer::none())
    }

    /// Like [`apply`](Self::apply), reporting to `tracer`.
    pub fn apply_with_tracer(&mut self, batch: SyncBatch, tracer: &mut Tracer<'_>) -> usize {
        let frame_index = batch.frame_index;
        for id in batch.removed {
            if let Some(old) = self.drawables.remove(&id) {
                self.graveyard.push(old);
            }
            self.screens.retain(|&s| s != id);
        }

        let mut applied = 0;
        let mut rejected = 0;
        for entry in batch.entries {
            let id = entry.id;
            if let Some(existing) = self.drawables.get(&id) {
                if existing.frame_index() >= frame_index {
                    log::warn!(
                        "{id:?} already synced for frame {}, rejecting frame {frame_index}",
                        existing.frame_index()
                    );
                    rejected += 1;
                    continue;
                }
            }
            let is_screen = matches!(entry.params, NodeParams::Screen(_));
            let fresh = Arc::new(Drawable::from_entry(entry, frame_index));
            match self.drawables.insert(id, fresh) {
                Some(old) => self.retire(old),
                None if is_screen => self.screens.push(id),
                None => {}
            }
            applied += 1;
        }

        self.frame_index = self.frame_index.max(frame_index);
        tracer.apply(&ApplyEvent {
            frame_index,
            applied,
            rejected,
        });
        applied
    }

    /// Frees retired snapshots no longer referenced by any handle.
    ///
    /// Client buffers the live tree no longer points at are handed to the
    /// buffer-release hook. Returns the number of snapshots freed.
    pub fn collect_garbage(&mut self) -> usize {
        self.collect_garbage_with_tracer(&mut Tracer::none())
    }

    /// Like [`collect_garbage`](Self::collect_garbage), reporting to
    /// `tracer`.
    pub fn collect_garbage_with_tracer(&mut self, tracer: &mut Tracer<'_>) -> usize {
        let (free, keep): (Vec<_>, Vec<_>) = core::mem::take(&mut self.graveyard)
            .into_iter()
            .partition(|d| Arc::strong_count(d) == 1);
        self.graveyard = keep;

        for dead in &free {
            let Some(buffer) = dead.buffer() else {
                continue;
            };
            let still_live = self
                .drawables
                .get(&dead.id)
                .and_then(|live| live.buffer())
                .is_some_and(|live| live == buffer);
            if !still_live {
                self.hooks.release_buffer(dead.id, buffer);
            }
        }

        let freed = free.len();
        if freed > 0 {
            log::debug!(
                "gc freed {freed} drawables, {} deferred",
                self.graveyard.len()
            );
        }
        tracer.gc(&GcEvent {
            freed,
            deferred: self.graveyard.len(),
        });
        freed
    }

    fn retire(&mut self, old: Arc<Drawable>) {
        if Arc::strong_count(&old) > 1 || old.buffer().is_some() {
            self.graveyard.push(old);
        }
    }
}

impl NodeRegistry for DrawableTree {
    fn drawable(&self, id: NodeId) -> Option<Arc<Drawable>> {
        self.get(id)
    }

    fn screens(&self) -> Vec<NodeId> {
        self.screens.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use kurbo::Rect;

    use super::*;
    use crate::node::{LogicalDisplayConfig, SceneTree, ScreenNodeConfig};
    use crate::output::ScreenId;

    fn nid(n: u32) -> NodeId {
        NodeId::from_parts(1, n)
    }

    fn scene() -> SceneTree {
        let mut tree = SceneTree::default();
        assert!(tree.create_screen(
            nid(1),
            ScreenNodeConfig {
                screen_id: ScreenId(1),
                is_mirrored: false,
            },
        ));
        assert!(tree.create_display(
            nid(10),
            LogicalDisplayConfig {
                screen_id: ScreenId(1),
                ..LogicalDisplayConfig::default()
            },
        ));
        assert!(tree.create_surface(nid(20)));
        assert!(tree.add_child(nid(10), nid(20)));
        assert!(tree.set_surface_bounds(nid(20), Rect::new(0.0, 0.0, 2.0, 2.0)));
        assert!(tree.set_surface_buffer(nid(20), Some(SurfaceBuffer::solid(2, 2, [1; 4]))));
        tree
    }

    #[test]
    fn apply_builds_snapshots() {
        let mut tree = scene();
        let mut drawables = DrawableTree::default();
        assert_eq!(drawables.apply(tree.sync()), 3);
        assert_eq!(drawables.screens(), [nid(1)]);
        let display = drawables.get(nid(10)).expect("display synced");
        assert_eq!(display.children(), [nid(20)]);
        assert_eq!(display.parent(), Some(nid(1)));
        assert!(drawables.get(nid(20)).is_some_and(|d| d.as_surface().is_some()));
    }

    #[test]
    fn second_write_in_same_frame_is_rejected() {
        let mut tree = scene();
        let mut drawables = DrawableTree::default();
        let batch = tree.sync();
        assert_eq!(drawables.apply(batch.clone()), 3);
        assert_eq!(drawables.apply(batch), 0);
    }

    #[test]
    fn in_flight_handle_sees_its_own_frame() {
        let mut tree = scene();
        let mut drawables = DrawableTree::default();
        let _ = drawables.apply(tree.sync());
        let handle = drawables.get(nid(20)).expect("surface synced");

        assert!(tree.set_surface_alpha(nid(20), 0.25));
        let _ = drawables.apply(tree.sync());
        assert_eq!(handle.as_surface().map(|s| s.alpha), Some(1.0));
        assert_eq!(
            drawables.get(nid(20)).and_then(|d| d.as_surface().map(|s| s.alpha)),
            Some(0.25)
        );
    }

    #[test]
    fn gc_defers_until_handles_drop_and_releases_buffers() {
        let hooks = Arc::new(CallbackSlots::new());
        let released = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&released);
        assert!(hooks.set_buffer_release_hook(move |id, _| sink.lock().unwrap().push(id)));

        let mut tree = scene();
        let mut drawables = DrawableTree::new(hooks);
        let _ = drawables.apply(tree.sync());
        let handle = drawables.get(nid(20)).expect("surface synced");

        assert!(tree.destroy(nid(20)));
        let _ = drawables.apply(tree.sync());
        assert!(drawables.get(nid(20)).is_none());

        assert_eq!(drawables.collect_garbage(), 0, "handle still in flight");
        assert_eq!(drawables.graveyard_len(), 1);
        drop(handle);
        assert_eq!(drawables.collect_garbage(), 1);
        assert_eq!(*released.lock().unwrap(), [nid(20)]);
    }

    #[test]
    fn buffer_is_not_released_while_still_current() {
        let hooks = Arc::new(CallbackSlots::new());
        let released = Arc::new(Mutex::new(0_usize));
        let sink = Arc::clone(&released);
        assert!(hooks.set_buffer_release_hook(move |_, _| *sink.lock().unwrap() += 1));

        let mut tree = scene();
        let mut drawables = DrawableTree::new(hooks);
        let _ = drawables.apply(tree.sync());

        // Same buffer, different alpha: the retired snapshot shares storage.
        assert!(tree.set_surface_alpha(nid(20), 0.5));
        let _ = drawables.apply(tree.sync());
        assert_eq!(drawables.collect_garbage(), 1);
        assert_eq!(*released.lock().unwrap(), 0);

        assert!(tree.set_surface_buffer(nid(20), Some(SurfaceBuffer::solid(2, 2, [2; 4]))));
        let _ = drawables.apply(tree.sync());
        assert_eq!(drawables.collect_garbage(), 1);
        assert_eq!(*released.lock().unwrap(), 1);
    }
}
