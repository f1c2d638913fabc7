// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Producer-side arena holding every node of the scene.

use std::collections::HashMap;
use std::sync::Arc;

use kurbo::{Affine, Rect};
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use crate::config::SceneConfig;
use crate::damage::DirtyRegionTracker;
use crate::dirty;
use crate::hdr::{HdrStatus, HdrType};
use crate::hooks::{CallbackSlots, ScreenStatus};
use crate::output::ScreenId;
use crate::params::{NodeParams, StagingParams, SurfaceBuffer};
use crate::special_layer::SpecialLayers;
use crate::time::HostTime;

use super::display::{LogicalDisplayConfig, LogicalDisplayNode};
use super::id::{INVALID, NodeId};
use super::screen::{ScreenNode, ScreenNodeConfig};
use super::surface::SurfaceNode;
use super::traverse::Children;

/// Which kind of node a slot holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// A [`ScreenNode`].
    Screen,
    /// A [`LogicalDisplayNode`].
    Display,
    /// A [`SurfaceNode`].
    Surface,
}

/// The per-kind state of a node.
#[derive(Debug)]
pub enum NodeKind {
    /// A display sink.
    Screen(ScreenNode),
    /// A content rectangle of a screen.
    Display(LogicalDisplayNode),
    /// A content producer.
    Surface(SurfaceNode),
}

impl NodeKind {
    /// Returns the kind discriminant.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Screen(_) => NodeType::Screen,
            Self::Display(_) => NodeType::Display,
            Self::Surface(_) => NodeType::Surface,
        }
    }
}

/// Struct-of-arrays storage for all nodes, owned by the producer context.
///
/// Nodes are addressed by their client-assigned [`NodeId`]; internally each
/// occupies a slot in parallel arrays, and freed slots are recycled through a
/// free list. Unknown ids are soft failures: mutators return `false` and log.
#[derive(Debug)]
pub struct SceneTree {
    // -- Identity --
    pub(crate) ids: Vec<NodeId>,
    pub(crate) index: HashMap<NodeId, u32>,
    pub(crate) nodes: Vec<Option<NodeKind>>,

    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,

    // -- Geometry --
    pub(crate) local_transform: Vec<Affine>,
    pub(crate) abs_transform: Vec<Affine>,

    // -- Synchronization --
    pub(crate) staging: Vec<Option<StagingParams<NodeParams>>>,
    pub(crate) frame_index: u64,
    pub(crate) pending_removed: Vec<NodeId>,

    // -- Allocation --
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,

    // -- Traversal cache --
    pub(crate) traversal_order: Vec<u32>,
    pub(crate) traversal_dirty: bool,

    /// Screen slots in creation order.
    pub(crate) screens: Vec<u32>,
    pub(crate) config: SceneConfig,
    pub(crate) hooks: Arc<CallbackSlots>,
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new(SceneConfig::default(), Arc::new(CallbackSlots::new()))
    }
}

impl SceneTree {
    /// Creates an empty scene.
    #[must_use]
    pub fn new(config: SceneConfig, hooks: Arc<CallbackSlots>) -> Self {
        Self {
            ids: Vec::new(),
            index: HashMap::new(),
            nodes: Vec::new(),
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            local_transform: Vec::new(),
            abs_transform: Vec::new(),
            staging: Vec::new(),
            frame_index: 0,
            pending_removed: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            traversal_order: Vec::new(),
            traversal_dirty: true,
            screens: Vec::new(),
            config,
            hooks,
        }
    }

    /// The configuration the scene was built with.
    #[must_use]
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Index of the last frame produced by [`sync`](Self::sync).
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    // -- Allocation API --

    /// Creates a screen node.
    ///
    /// Returns `false` if `id` is already in use. Displays waiting for this
    /// screen's id are attached right away unless disabled in [`SceneConfig`].
    pub fn create_screen(&mut self, id: NodeId, config: ScreenNodeConfig) -> bool {
        let mut screen = ScreenNode::new(config);
        screen.dirty_region = DirtyRegionTracker::new(self.config.damage_history);
        let Some(idx) = self.alloc(id, NodeKind::Screen(screen)) else {
            return false;
        };
        self.screens.push(idx);
        log::debug!("screen {id:?} created for {:?}", config.screen_id);
        self.hooks
            .notify_screen_status(config.screen_id, ScreenStatus::Connected);
        if self.config.retry_attach_on_screen_create {
            let _ = self.retry_waiting_attach();
        }
        true
    }

    /// Creates a logical display and tries to attach it to its screen.
    ///
    /// If no screen with the configured id exists yet, the display is marked
    /// waiting to attach. Returns `false` if `id` is already in use.
    pub fn create_display(&mut self, id: NodeId, config: LogicalDisplayConfig) -> bool {
        let Some(idx) = self.alloc(id, NodeKind::Display(LogicalDisplayNode::new(config))) else {
            return false;
        };
        let _ = self.attach_display(idx);
        if config.is_mirrored {
            let _ = self.set_display_mode(id, config);
        }
        true
    }

    /// Creates a surface node. Returns `false` if `id` is already in use.
    pub fn create_surface(&mut self, id: NodeId) -> bool {
        self.alloc(id, NodeKind::Surface(SurfaceNode::default()))
            .is_some()
    }

    /// Destroys a node.
    ///
    /// Children are detached and become roots; displays detached from a
    /// destroyed screen wait to attach again. Mirror relationships pointing at
    /// the node are cleared. The consumer frees its drawable once the next
    /// batch has been applied and no in-flight handle remains.
    pub fn destroy(&mut self, id: NodeId) -> bool {
        let Some(idx) = self.slot(id) else {
            log::warn!("destroy: unknown node {id:?}");
            return false;
        };

        self.touch_owner_display(idx);
        let children: Vec<u32> = self.child_slots(idx).collect();
        for c in children {
            self.detach_slot(c);
            if let Some(NodeKind::Display(d)) = self.nodes[c as usize].as_mut() {
                d.waiting_attach = true;
            }
        }
        if self.parent[idx as usize] != INVALID {
            self.detach_slot(idx);
        }

        match self.nodes[idx as usize].as_ref().map(NodeKind::node_type) {
            Some(NodeType::Screen) => self.forget_screen(idx),
            Some(NodeType::Display) => self.forget_display(id),
            Some(NodeType::Surface) | None => {}
        }

        self.dirty.remove_key(idx);
        self.nodes[idx as usize] = None;
        self.staging[idx as usize] = None;
        let _ = self.index.remove(&id);
        self.free_list.push(idx);
        self.pending_removed.push(id);
        self.traversal_dirty = true;
        true
    }

    /// Returns whether `id` names a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Returns the number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if the scene has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    // -- Node access --

    /// Returns the kind of `id`.
    #[must_use]
    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.node(id).map(NodeKind::node_type)
    }

    /// Returns the node state of `id`.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeKind> {
        let idx = self.slot(id)?;
        self.nodes[idx as usize].as_ref()
    }

    /// Returns the screen `id`.
    #[must_use]
    pub fn screen(&self, id: NodeId) -> Option<&ScreenNode> {
        match self.node(id)? {
            NodeKind::Screen(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the screen `id` for mutation and marks it pending sync.
    pub fn screen_mut(&mut self, id: NodeId) -> Option<&mut ScreenNode> {
        let idx = self.slot(id)?;
        self.dirty.mark(idx, dirty::PARAMS);
        match self.nodes[idx as usize].as_mut()? {
            NodeKind::Screen(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the logical display `id`.
    #[must_use]
    pub fn display(&self, id: NodeId) -> Option<&LogicalDisplayNode> {
        match self.node(id)? {
            NodeKind::Display(d) => Some(d),
            _ => None,
        }
    }

    /// Returns the logical display `id` for mutation and marks it pending
    /// sync.
    pub fn display_mut(&mut self, id: NodeId) -> Option<&mut LogicalDisplayNode> {
        let idx = self.slot(id)?;
        self.dirty.mark(idx, dirty::PARAMS);
        self.display_at_mut(idx)
    }

    /// Returns the surface `id`.
    #[must_use]
    pub fn surface(&self, id: NodeId) -> Option<&SurfaceNode> {
        match self.node(id)? {
            NodeKind::Surface(s) => Some(s),
            _ => None,
        }
    }

    /// Ids of all screens, in creation order.
    pub fn screens(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.screens.iter().map(|&idx| self.ids[idx as usize])
    }

    // -- Topology API --

    /// Appends `child` to the children of `parent`, moving it from its
    /// current parent if it has one.
    ///
    /// Screens are always roots, and a node cannot become its own
    /// descendant; both are rejected.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let (Some(p), Some(c)) = (self.slot(parent), self.slot(child)) else {
            log::warn!("add_child: unknown node in {parent:?} <- {child:?}");
            return false;
        };
        if self.slot_type(c) == Some(NodeType::Screen) {
            log::warn!("add_child: screen {child:?} cannot have a parent");
            return false;
        }
        if self.is_ancestor_or_self(c, p) {
            log::warn!("add_child: {child:?} is an ancestor of {parent:?}");
            return false;
        }
        if self.parent[c as usize] != INVALID {
            self.touch_owner_display(c);
            self.detach_slot(c);
        }
        self.link_last(p, c);
        self.touch_owner_display(c);
        if let Some(NodeKind::Display(d)) = self.nodes[c as usize].as_mut() {
            d.waiting_attach = false;
        }
        true
    }

    /// Detaches `child` from its parent.
    pub fn remove_from_parent(&mut self, child: NodeId) -> bool {
        let Some(c) = self.slot(child) else {
            log::warn!("remove_from_parent: unknown node {child:?}");
            return false;
        };
        if self.parent[c as usize] == INVALID {
            return false;
        }
        self.touch_owner_display(c);
        self.detach_slot(c);
        true
    }

    /// Returns the parent of `id`.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        let idx = self.slot(id)?;
        let p = self.parent[idx as usize];
        (p != INVALID).then(|| self.ids[p as usize])
    }

    /// Returns an iterator over the direct children of `id`.
    ///
    /// Unknown ids yield an empty iterator.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Children<'_> {
        let first = self
            .slot(id)
            .map_or(INVALID, |idx| self.first_child[idx as usize]);
        Children::new(self, first)
    }

    // -- Geometry API --

    /// Sets the local transform of `id`.
    ///
    /// Marks the GEOMETRY channel with eager propagation to descendants.
    pub fn set_transform(&mut self, id: NodeId, transform: Affine) -> bool {
        let Some(idx) = self.slot(id) else {
            log::warn!("set_transform: unknown node {id:?}");
            return false;
        };
        self.local_transform[idx as usize] = transform;
        self.dirty.mark_with(idx, dirty::GEOMETRY, &EagerPolicy);
        true
    }

    /// Returns the local transform of `id`.
    #[must_use]
    pub fn local_transform(&self, id: NodeId) -> Option<Affine> {
        self.slot(id).map(|idx| self.local_transform[idx as usize])
    }

    /// Returns the accumulated transform of `id`.
    ///
    /// Only valid after [`sync`](Self::sync).
    #[must_use]
    pub fn abs_transform(&self, id: NodeId) -> Option<Affine> {
        self.slot(id).map(|idx| self.abs_transform[idx as usize])
    }

    // -- Surface API --

    /// Sets the bounds of a surface.
    pub fn set_surface_bounds(&mut self, id: NodeId, bounds: Rect) -> bool {
        self.update_surface(id, |s| s.bounds = bounds)
    }

    /// Replaces the client frame of a surface.
    pub fn set_surface_buffer(&mut self, id: NodeId, buffer: Option<SurfaceBuffer>) -> bool {
        self.update_surface(id, |s| s.buffer = buffer)
    }

    /// Sets the opacity of a surface.
    pub fn set_surface_alpha(&mut self, id: NodeId, alpha: f32) -> bool {
        self.update_surface(id, |s| s.alpha = alpha)
    }

    /// Shows or hides a surface.
    pub fn set_surface_visible(&mut self, id: NodeId, visible: bool) -> bool {
        self.update_surface(id, |s| s.visible = visible)
    }

    /// Replaces the special-layer tags of a surface.
    pub fn set_special_layers(&mut self, id: NodeId, tags: SpecialLayers) -> bool {
        self.update_surface(id, |s| s.special_layers = tags)
    }

    // -- Screen API --

    /// Makes screen `screen` mirror screen `target`.
    ///
    /// Succeeds only if `screen` was created as a mirror, `target` is
    /// another live screen, and `target` is not already the source. The
    /// previous source loses its mirror flag and `target` gains it.
    pub fn set_mirror_source(&mut self, screen: NodeId, target: NodeId) -> bool {
        let Some(a) = self.screen_slot(screen) else {
            log::warn!("set_mirror_source: {screen:?} is not a screen");
            return false;
        };
        let Some(b) = self.screen_slot(target) else {
            log::warn!("set_mirror_source: target {target:?} is not a screen");
            return false;
        };
        if a == b {
            log::warn!("set_mirror_source: {screen:?} cannot mirror itself");
            return false;
        }
        let Some(s) = self.screen_at_mut(a) else {
            return false;
        };
        if !s.is_mirrored || s.mirror_source == Some(target) {
            return false;
        }
        let previous = s.mirror_source.replace(target);
        if let Some(prev) = previous.and_then(|p| self.screen_slot(p)) {
            if let Some(p) = self.screen_at_mut(prev) {
                p.has_mirror_screen = false;
            }
            self.dirty.mark(prev, dirty::PARAMS);
        }
        if let Some(t) = self.screen_at_mut(b) {
            t.has_mirror_screen = true;
        }
        self.dirty.mark(a, dirty::PARAMS);
        self.dirty.mark(b, dirty::PARAMS);
        true
    }

    /// Clears the mirror source of `screen`.
    ///
    /// Returns `false` if the screen is unknown or mirrors nothing.
    pub fn reset_mirror_source(&mut self, screen: NodeId) -> bool {
        let Some(a) = self.screen_slot(screen) else {
            log::warn!("reset_mirror_source: {screen:?} is not a screen");
            return false;
        };
        let Some(previous) = self.screen_at_mut(a).and_then(|s| s.mirror_source.take()) else {
            return false;
        };
        if let Some(prev) = self.screen_slot(previous) {
            if let Some(p) = self.screen_at_mut(prev) {
                p.has_mirror_screen = false;
            }
            self.dirty.mark(prev, dirty::PARAMS);
        }
        self.dirty.mark(a, dirty::PARAMS);
        true
    }

    /// Decides whether HDR must be forced off on `screen`.
    ///
    /// `false` when the screen has no children, when any child is not a
    /// logical display, or when HDR-effect content is active on the screen or
    /// any child. Otherwise `true` only if every child display reports an HDR
    /// brightness factor of exactly zero.
    #[must_use]
    pub fn should_force_close_hdr(&self, screen: NodeId) -> bool {
        let Some(idx) = self.screen_slot(screen) else {
            return false;
        };
        self.should_force_close_hdr_at(idx)
    }

    /// Paces a virtual screen; see [`ScreenNode::skip_frame`].
    ///
    /// Unknown screens never skip.
    pub fn skip_frame(
        &mut self,
        screen: NodeId,
        refresh_rate: u32,
        skip_interval: u32,
        now: HostTime,
    ) -> bool {
        let Some(idx) = self.screen_slot(screen) else {
            return false;
        };
        self.screen_at_mut(idx)
            .is_some_and(|s| s.skip_frame(refresh_rate, skip_interval, now))
    }

    /// Adds a modified rectangle to the current frame of `screen`.
    pub fn mark_dirty_rect(&mut self, screen: NodeId, rect: Rect) -> bool {
        let Some(s) = self.screen_mut(screen) else {
            return false;
        };
        s.dirty_region_mut().merge_dirty_rect(rect);
        true
    }

    // -- Display API --

    /// Reassigns a display to the screen with `screen_id`.
    ///
    /// If no such screen exists, the id is recorded and the display waits to
    /// attach; its current position in the tree is left unchanged.
    pub fn set_screen_id(&mut self, id: NodeId, screen_id: ScreenId) -> bool {
        let Some(idx) = self.display_slot(id) else {
            log::warn!("set_screen_id: {id:?} is not a logical display");
            return false;
        };
        if let Some(d) = self.display_at_mut(idx) {
            d.screen_id = screen_id;
        }
        self.dirty.mark(idx, dirty::PARAMS);
        self.attach_display(idx)
    }

    /// Applies a display mode.
    ///
    /// When mirroring is requested, the source display is looked up by id
    /// and the rotation offset compensating its physical rotation is
    /// recorded. An unknown source leaves the previous mirror state as it
    /// was. When mirroring is not requested, any mirror reference is cleared.
    pub fn set_display_mode(&mut self, id: NodeId, mode: LogicalDisplayConfig) -> bool {
        let Some(idx) = self.display_slot(id) else {
            log::warn!("set_display_mode: {id:?} is not a logical display");
            return false;
        };
        if !mode.is_mirrored {
            if let Some(d) = self.display_at_mut(idx) {
                d.is_mirrored = false;
                d.mirror_source = None;
            }
            self.dirty.mark(idx, dirty::PARAMS);
            return true;
        }

        let source = mode
            .mirror_source
            .filter(|&src| src != id)
            .and_then(|src| self.display(src).map(|d| (src, d.rotation())));
        let Some((source, source_rotation)) = source else {
            log::warn!(
                "set_display_mode: mirror source {:?} of {id:?} not found",
                mode.mirror_source
            );
            return false;
        };
        if let Some(d) = self.display_at_mut(idx) {
            d.is_mirrored = true;
            d.mirror_source = Some(source);
            d.mirror_rotation_offset = source_rotation.offset_to(d.rotation());
        }
        self.dirty.mark(idx, dirty::PARAMS);
        true
    }

    /// Sets the force-close-HDR flag on the screen owning display `id`.
    pub fn set_force_close_hdr(&mut self, id: NodeId, force: bool) -> bool {
        let Some(idx) = self.display_slot(id) else {
            log::warn!("set_force_close_hdr: {id:?} is not a logical display");
            return false;
        };
        let Some(screen) = self.owning_screen(idx) else {
            log::warn!("set_force_close_hdr: {id:?} has no screen");
            return false;
        };
        if let Some(s) = self.screen_at_mut(screen) {
            s.force_close_hdr = force;
        }
        self.dirty.mark(screen, dirty::PARAMS);
        true
    }

    /// Registers an HDR source on the screen owning display `id`, and the
    /// matching content type on the display itself.
    pub fn increase_hdr(&mut self, id: NodeId, status: HdrStatus, level: u32) -> bool {
        self.update_hdr(id, status, level, true)
    }

    /// Releases an HDR source registered with
    /// [`increase_hdr`](Self::increase_hdr).
    pub fn decrease_hdr(&mut self, id: NodeId, status: HdrStatus, level: u32) -> bool {
        self.update_hdr(id, status, level, false)
    }

    /// Retries attaching every display waiting for its screen.
    ///
    /// Returns the number of displays attached by this pass.
    pub fn retry_waiting_attach(&mut self) -> usize {
        let waiting: Vec<u32> = (0..self.len)
            .filter(|&idx| {
                matches!(
                    self.nodes[idx as usize].as_ref(),
                    Some(NodeKind::Display(d)) if d.waiting_attach
                )
            })
            .collect();
        waiting
            .into_iter()
            .filter(|&idx| self.attach_display(idx))
            .count()
    }

    // -- Internal helpers --

    pub(crate) fn slot(&self, id: NodeId) -> Option<u32> {
        self.index.get(&id).copied()
    }

    pub(crate) fn slot_type(&self, idx: u32) -> Option<NodeType> {
        self.nodes[idx as usize].as_ref().map(NodeKind::node_type)
    }

    fn screen_slot(&self, id: NodeId) -> Option<u32> {
        self.slot(id)
            .filter(|&idx| self.slot_type(idx) == Some(NodeType::Screen))
    }

    fn display_slot(&self, id: NodeId) -> Option<u32> {
        self.slot(id)
            .filter(|&idx| self.slot_type(idx) == Some(NodeType::Display))
    }

    pub(crate) fn screen_at_mut(&mut self, idx: u32) -> Option<&mut ScreenNode> {
        match self.nodes[idx as usize].as_mut()? {
            NodeKind::Screen(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn display_at_mut(&mut self, idx: u32) -> Option<&mut LogicalDisplayNode> {
        match self.nodes[idx as usize].as_mut()? {
            NodeKind::Display(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn should_force_close_hdr_at(&self, idx: u32) -> bool {
        let Some(NodeKind::Screen(screen)) = self.nodes[idx as usize].as_ref() else {
            return false;
        };
        if self.first_child[idx as usize] == INVALID
            || screen.headroom.has_status(HdrStatus::HdrEffect)
        {
            return false;
        }
        let mut all_dimmed = true;
        for c in self.child_slots(idx) {
            let Some(NodeKind::Display(d)) = self.nodes[c as usize].as_ref() else {
                return false;
            };
            if d.hdr_types.count(HdrType::Effect) > 0 {
                return false;
            }
            all_dimmed &= d.hdr_brightness_factor == 0.0;
        }
        all_dimmed
    }

    /// Allocates a slot for `kind` under `id`.
    fn alloc(&mut self, id: NodeId, kind: NodeKind) -> Option<u32> {
        if self.index.contains_key(&id) {
            log::warn!("create: node {id:?} already exists");
            return None;
        }
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot.
            let i = idx as usize;
            self.ids[i] = id;
            self.nodes[i] = Some(kind);
            self.parent[i] = INVALID;
            self.first_child[i] = INVALID;
            self.next_sibling[i] = INVALID;
            self.prev_sibling[i] = INVALID;
            self.local_transform[i] = Affine::IDENTITY;
            self.abs_transform[i] = Affine::IDENTITY;
            self.staging[i] = None;
            idx
        } else {
            let idx = self.len;
            self.len += 1;
            self.ids.push(id);
            self.nodes.push(Some(kind));
            self.parent.push(INVALID);
            self.first_child.push(INVALID);
            self.next_sibling.push(INVALID);
            self.prev_sibling.push(INVALID);
            self.local_transform.push(Affine::IDENTITY);
            self.abs_transform.push(Affine::IDENTITY);
            self.staging.push(None);
            idx
        };
        let _ = self.index.insert(id, idx);
        self.traversal_dirty = true;
        self.dirty.mark(idx, dirty::PARAMS);
        self.dirty.mark(idx, dirty::TOPOLOGY);
        self.dirty.mark_with(idx, dirty::GEOMETRY, &EagerPolicy);
        Some(idx)
    }

    /// Appends `c` to the child list of `p` and wires the dirty edges.
    fn link_last(&mut self, p: u32, c: u32) {
        self.parent[c as usize] = p;
        self.prev_sibling[c as usize] = INVALID;
        self.next_sibling[c as usize] = INVALID;

        if self.first_child[p as usize] == INVALID {
            self.first_child[p as usize] = c;
        } else {
            // Walk to last child.
            let mut last = self.first_child[p as usize];
            while self.next_sibling[last as usize] != INVALID {
                last = self.next_sibling[last as usize];
            }
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }

        if self.slot_type(p) == Some(NodeType::Screen) {
            self.transfer_headroom(c, p, true);
        }
        let _ = self.dirty.add_dependency(c, p, dirty::GEOMETRY);
        self.dirty.mark_with(c, dirty::GEOMETRY, &EagerPolicy);
        self.dirty.mark(p, dirty::TOPOLOGY);
        self.dirty.mark(c, dirty::TOPOLOGY);
        self.traversal_dirty = true;
    }

    /// Removes `idx` from its parent's child list and unwires the dirty
    /// edges. `idx` must have a parent.
    fn detach_slot(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != INVALID {
            self.next_sibling[prev as usize] = next;
        } else {
            // Was first child.
            self.first_child[p as usize] = next;
        }
        if next != INVALID {
            self.prev_sibling[next as usize] = prev;
        }
        if self.slot_type(p) == Some(NodeType::Screen) {
            self.transfer_headroom(idx, p, false);
        }
        self.parent[idx as usize] = INVALID;
        self.prev_sibling[idx as usize] = INVALID;
        self.next_sibling[idx as usize] = INVALID;

        self.dirty.remove_dependency(idx, p, dirty::GEOMETRY);
        self.dirty.mark_with(idx, dirty::GEOMETRY, &EagerPolicy);
        self.dirty.mark(p, dirty::TOPOLOGY);
        self.dirty.mark(idx, dirty::TOPOLOGY);
        self.traversal_dirty = true;
    }

    /// Finds the nearest logical display at or above `idx`.
    pub(crate) fn owning_display(&self, idx: u32) -> Option<u32> {
        let mut cur = idx;
        while cur != INVALID {
            if self.slot_type(cur) == Some(NodeType::Display) {
                return Some(cur);
            }
            cur = self.parent[cur as usize];
        }
        None
    }

    /// Returns the screen a display is attached under.
    pub(crate) fn owning_screen(&self, display: u32) -> Option<u32> {
        let p = self.parent[display as usize];
        (p != INVALID && self.slot_type(p) == Some(NodeType::Screen)).then_some(p)
    }

    /// Marks the display owning `idx` pending sync, so its special-layer
    /// registry is rebuilt.
    fn touch_owner_display(&mut self, idx: u32) {
        let start = if self.slot_type(idx) == Some(NodeType::Display) {
            self.parent[idx as usize]
        } else {
            idx
        };
        if start == INVALID {
            return;
        }
        if let Some(display) = self.owning_display(start) {
            self.dirty.mark(display, dirty::PARAMS);
        }
    }

    fn update_surface(&mut self, id: NodeId, f: impl FnOnce(&mut SurfaceNode)) -> bool {
        let Some(idx) = self.slot(id) else {
            log::warn!("surface update: unknown node {id:?}");
            return false;
        };
        let Some(NodeKind::Surface(s)) = self.nodes[idx as usize].as_mut() else {
            log::warn!("surface update: {id:?} is not a surface");
            return false;
        };
        f(s);
        self.dirty.mark(idx, dirty::PARAMS);
        self.touch_owner_display(idx);
        true
    }

    fn update_hdr(&mut self, id: NodeId, status: HdrStatus, level: u32, increase: bool) -> bool {
        let Some(idx) = self.display_slot(id) else {
            log::warn!("hdr update: {id:?} is not a logical display");
            return false;
        };
        let ty = match status {
            HdrStatus::HdrPhoto => HdrType::Photo,
            HdrStatus::HdrVideo | HdrStatus::AiHdrVideoGtm | HdrStatus::AiHdrVideoGainmap => {
                HdrType::Video
            }
            HdrStatus::HdrEffect => HdrType::Effect,
            HdrStatus::HdrUiComponent => HdrType::UiComponent,
        };
        let Some(d) = self.display_at_mut(idx) else {
            return false;
        };
        if increase {
            d.increase_hdr_type(ty);
            d.headroom_sources.increase(status, level);
        } else {
            if d.headroom_sources.count(status, level) == 0 {
                log::warn!("hdr update: {id:?} has no {status:?} source at level {level}");
                return false;
            }
            d.decrease_hdr_type(ty);
            d.headroom_sources.decrease(status, level);
        }
        self.dirty.mark(idx, dirty::PARAMS);
        if let Some(screen) = self.owning_screen(idx) {
            if let Some(s) = self.screen_at_mut(screen) {
                if increase {
                    s.update_headroom_map_increase(status, level);
                } else {
                    s.update_headroom_map_decrease(status, level);
                }
            }
            self.dirty.mark(screen, dirty::PARAMS);
        }
        true
    }

    /// Adds the headroom sources of `display` to `screen`, or removes them.
    fn transfer_headroom(&mut self, display: u32, screen: u32, attach: bool) {
        let sources: Vec<(HdrStatus, u32, u32)> = match self.nodes[display as usize].as_ref() {
            Some(NodeKind::Display(d)) => d.headroom_sources.iter().collect(),
            _ => return,
        };
        if sources.is_empty() {
            return;
        }
        let Some(s) = self.screen_at_mut(screen) else {
            return;
        };
        for (status, level, count) in sources {
            for _ in 0..count {
                if attach {
                    s.update_headroom_map_increase(status, level);
                } else {
                    s.update_headroom_map_decrease(status, level);
                }
            }
        }
        self.dirty.mark(screen, dirty::PARAMS);
    }

    /// Attaches a display under the screen with its screen id.
    ///
    /// Returns `true` if a screen was found.
    fn attach_display(&mut self, idx: u32) -> bool {
        let Some(NodeKind::Display(d)) = self.nodes[idx as usize].as_ref() else {
            return false;
        };
        let screen_id = d.screen_id;
        let found = self.screens.iter().copied().find(|&s| {
            matches!(
                self.nodes[s as usize].as_ref(),
                Some(NodeKind::Screen(screen)) if screen.screen_id == screen_id
            )
        });
        let Some(screen) = found else {
            log::info!(
                "display {:?} waiting for {screen_id:?}",
                self.ids[idx as usize]
            );
            if let Some(d) = self.display_at_mut(idx) {
                d.waiting_attach = true;
            }
            return false;
        };
        if self.parent[idx as usize] != screen {
            if self.parent[idx as usize] != INVALID {
                self.detach_slot(idx);
            }
            self.link_last(screen, idx);
        }
        if let Some(d) = self.display_at_mut(idx) {
            d.waiting_attach = false;
        }
        self.dirty.mark(idx, dirty::PARAMS);
        true
    }

    fn forget_screen(&mut self, idx: u32) {
        let id = self.ids[idx as usize];
        let _ = self.reset_mirror_source(id);
        let mirrors: Vec<NodeId> = self
            .screens
            .iter()
            .copied()
            .filter(|&s| {
                matches!(
                    self.nodes[s as usize].as_ref(),
                    Some(NodeKind::Screen(screen)) if screen.mirror_source == Some(id)
                )
            })
            .map(|s| self.ids[s as usize])
            .collect();
        for mirror in mirrors {
            let _ = self.reset_mirror_source(mirror);
        }
        self.screens.retain(|&s| s != idx);
        if let Some(NodeKind::Screen(s)) = self.nodes[idx as usize].as_ref() {
            log::debug!("screen {id:?} destroyed");
            self.hooks
                .notify_screen_status(s.screen_id, ScreenStatus::Disconnected);
        }
    }

    fn forget_display(&mut self, id: NodeId) {
        for idx in 0..self.len {
            if let Some(NodeKind::Display(d)) = self.nodes[idx as usize].as_mut() {
                if d.mirror_source == Some(id) {
                    d.mirror_source = None;
                    self.dirty.mark(idx, dirty::PARAMS);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ScreenRotation;
    use crate::node::display::DisplayCommandTarget;

    fn nid(n: u32) -> NodeId {
        NodeId::from_parts(1, n)
    }

    fn mirrored_screen(tree: &mut SceneTree, id: NodeId, screen: u64) {
        assert!(tree.create_screen(
            id,
            ScreenNodeConfig {
                screen_id: ScreenId(screen),
                is_mirrored: true,
            },
        ));
    }

    fn plain_screen(tree: &mut SceneTree, id: NodeId, screen: u64) {
        assert!(tree.create_screen(
            id,
            ScreenNodeConfig {
                screen_id: ScreenId(screen),
                is_mirrored: false,
            },
        ));
    }

    fn display_on(tree: &mut SceneTree, id: NodeId, screen: u64) {
        assert!(tree.create_display(
            id,
            LogicalDisplayConfig {
                screen_id: ScreenId(screen),
                ..LogicalDisplayConfig::default()
            },
        ));
    }

    fn has_mirror(tree: &SceneTree, id: NodeId) -> bool {
        tree.screen(id).is_some_and(ScreenNode::has_mirror_screen)
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut tree = SceneTree::default();
        assert!(tree.create_surface(nid(1)));
        assert!(!tree.create_surface(nid(1)));
        assert!(!tree.create_screen(nid(1), ScreenNodeConfig::default()));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn mirror_set_reset_is_paired() {
        let mut tree = SceneTree::default();
        mirrored_screen(&mut tree, nid(1), 1);
        plain_screen(&mut tree, nid(2), 2);

        assert!(tree.set_mirror_source(nid(1), nid(2)));
        assert!(has_mirror(&tree, nid(2)));
        assert_eq!(tree.screen(nid(1)).and_then(ScreenNode::mirror_source), Some(nid(2)));

        assert!(tree.reset_mirror_source(nid(1)));
        assert!(!has_mirror(&tree, nid(2)));
        assert_eq!(tree.screen(nid(1)).and_then(ScreenNode::mirror_source), None);
        assert!(!tree.reset_mirror_source(nid(1)), "second reset is a no-op");
    }

    #[test]
    fn mirror_repoint_touches_only_old_and_new() {
        let mut tree = SceneTree::default();
        mirrored_screen(&mut tree, nid(1), 1);
        plain_screen(&mut tree, nid(2), 2);
        plain_screen(&mut tree, nid(3), 3);
        plain_screen(&mut tree, nid(4), 4);

        assert!(tree.set_mirror_source(nid(1), nid(2)));
        assert!(tree.set_mirror_source(nid(1), nid(3)));
        assert!(!has_mirror(&tree, nid(2)));
        assert!(has_mirror(&tree, nid(3)));
        assert!(!has_mirror(&tree, nid(4)));
    }

    #[test]
    fn mirror_rejections() {
        let mut tree = SceneTree::default();
        mirrored_screen(&mut tree, nid(1), 1);
        plain_screen(&mut tree, nid(2), 2);
        plain_screen(&mut tree, nid(3), 3);
        assert!(tree.create_surface(nid(9)));

        assert!(!tree.set_mirror_source(nid(1), nid(1)), "self");
        assert!(!tree.set_mirror_source(nid(1), nid(42)), "unknown target");
        assert!(!tree.set_mirror_source(nid(1), nid(9)), "not a screen");
        assert!(!tree.set_mirror_source(nid(2), nid(3)), "not mirrored");
        assert!(tree.set_mirror_source(nid(1), nid(2)));
        assert!(!tree.set_mirror_source(nid(1), nid(2)), "same source");
        assert!(has_mirror(&tree, nid(2)));
    }

    #[test]
    fn destroying_source_clears_mirror() {
        let mut tree = SceneTree::default();
        mirrored_screen(&mut tree, nid(1), 1);
        plain_screen(&mut tree, nid(2), 2);
        assert!(tree.set_mirror_source(nid(1), nid(2)));
        assert!(tree.destroy(nid(2)));
        assert_eq!(tree.screen(nid(1)).and_then(ScreenNode::mirror_source), None);
    }

    #[test]
    fn display_waits_for_its_screen() {
        let mut tree = SceneTree::default();
        display_on(&mut tree, nid(10), 7);
        assert!(tree.display(nid(10)).is_some_and(LogicalDisplayNode::is_waiting_attach));
        assert_eq!(tree.parent(nid(10)), None);

        plain_screen(&mut tree, nid(1), 7);
        assert!(!tree.display(nid(10)).is_some_and(LogicalDisplayNode::is_waiting_attach));
        assert_eq!(tree.parent(nid(10)), Some(nid(1)));
    }

    #[test]
    fn set_screen_id_reparents_or_waits() {
        let mut tree = SceneTree::default();
        plain_screen(&mut tree, nid(1), 1);
        plain_screen(&mut tree, nid(2), 2);
        display_on(&mut tree, nid(10), 1);
        assert_eq!(tree.parent(nid(10)), Some(nid(1)));

        assert!(tree.set_screen_id(nid(10), ScreenId(2)));
        assert_eq!(tree.parent(nid(10)), Some(nid(2)));
        assert_eq!(tree.children(nid(1)).count(), 0);

        assert!(!tree.set_screen_id(nid(10), ScreenId(99)));
        assert_eq!(tree.parent(nid(10)), Some(nid(2)), "position unchanged");
        assert!(tree.display(nid(10)).is_some_and(LogicalDisplayNode::is_waiting_attach));
    }

    #[test]
    fn display_mode_mirror_lookup() {
        let mut tree = SceneTree::default();
        plain_screen(&mut tree, nid(1), 1);
        display_on(&mut tree, nid(10), 1);
        display_on(&mut tree, nid(11), 1);
        if let Some(d) = tree.display_mut(nid(10)) {
            d.set_screen_rotation(ScreenRotation::Rotation90);
        }

        let mirror = LogicalDisplayConfig {
            screen_id: ScreenId(1),
            is_mirrored: true,
            mirror_source: Some(nid(10)),
        };
        assert!(tree.set_display_mode(nid(11), mirror));
        let d = tree.display(nid(11)).map(|d| (d.mirror_source(), d.mirror_rotation_offset()));
        assert_eq!(d, Some((Some(nid(10)), ScreenRotation::Rotation270)));

        // Unknown source leaves state unchanged.
        let bad = LogicalDisplayConfig {
            mirror_source: Some(nid(77)),
            ..mirror
        };
        assert!(!tree.set_display_mode(nid(11), bad));
        assert_eq!(tree.display(nid(11)).and_then(LogicalDisplayNode::mirror_source), Some(nid(10)));

        // Non-mirror mode clears the reference.
        assert!(tree.set_display_mode(nid(11), LogicalDisplayConfig::default()));
        assert_eq!(tree.display(nid(11)).and_then(LogicalDisplayNode::mirror_source), None);
    }

    #[test]
    fn force_close_hdr_rules() {
        let mut tree = SceneTree::default();
        plain_screen(&mut tree, nid(1), 1);
        assert!(!tree.should_force_close_hdr(nid(1)), "no children");

        display_on(&mut tree, nid(10), 1);
        display_on(&mut tree, nid(11), 1);
        for d in [nid(10), nid(11)] {
            if let Some(d) = tree.display_mut(d) {
                d.set_hdr_brightness_factor(0.0);
            }
        }
        assert!(tree.should_force_close_hdr(nid(1)), "all dimmed");

        assert!(tree.increase_hdr(nid(10), HdrStatus::HdrEffect, 0));
        assert!(!tree.should_force_close_hdr(nid(1)), "effect present");
        assert!(tree.decrease_hdr(nid(10), HdrStatus::HdrEffect, 0));
        assert!(tree.should_force_close_hdr(nid(1)));

        if let Some(d) = tree.display_mut(nid(11)) {
            d.set_hdr_brightness_factor(0.5);
        }
        assert!(!tree.should_force_close_hdr(nid(1)), "one child lit");
    }

    #[test]
    fn force_close_hdr_fails_open_on_wrong_child() {
        let mut tree = SceneTree::default();
        plain_screen(&mut tree, nid(1), 1);
        display_on(&mut tree, nid(10), 1);
        if let Some(d) = tree.display_mut(nid(10)) {
            d.set_hdr_brightness_factor(0.0);
        }
        assert!(tree.create_surface(nid(20)));
        assert!(tree.add_child(nid(1), nid(20)));
        assert!(!tree.should_force_close_hdr(nid(1)));
    }

    fn headroom(tree: &SceneTree, screen: NodeId, status: HdrStatus, level: u32) -> u32 {
        tree.screen(screen)
            .map_or(0, |s| s.headroom().count(status, level))
    }

    #[test]
    fn destroyed_display_releases_its_headroom() {
        let mut tree = SceneTree::default();
        plain_screen(&mut tree, nid(1), 1);
        display_on(&mut tree, nid(10), 1);
        display_on(&mut tree, nid(11), 1);
        assert!(tree.increase_hdr(nid(10), HdrStatus::HdrEffect, 2));
        assert!(tree.increase_hdr(nid(10), HdrStatus::HdrEffect, 2));
        assert_eq!(headroom(&tree, nid(1), HdrStatus::HdrEffect, 2), 2);

        assert!(tree.destroy(nid(10)));
        assert!(tree.screen(nid(1)).is_some_and(|s| s.headroom().is_empty()));
        if let Some(d) = tree.display_mut(nid(11)) {
            d.set_hdr_brightness_factor(0.0);
        }
        assert!(tree.should_force_close_hdr(nid(1)), "no effect left");
    }

    #[test]
    fn headroom_moves_with_display_between_screens() {
        let mut tree = SceneTree::default();
        plain_screen(&mut tree, nid(1), 1);
        plain_screen(&mut tree, nid(2), 2);
        display_on(&mut tree, nid(10), 1);
        assert!(tree.increase_hdr(nid(10), HdrStatus::HdrVideo, 4));

        assert!(tree.set_screen_id(nid(10), ScreenId(2)));
        assert_eq!(headroom(&tree, nid(1), HdrStatus::HdrVideo, 4), 0);
        assert_eq!(headroom(&tree, nid(2), HdrStatus::HdrVideo, 4), 1);

        assert!(tree.decrease_hdr(nid(10), HdrStatus::HdrVideo, 4));
        assert!(tree.screen(nid(2)).is_some_and(|s| s.headroom().is_empty()));
    }

    #[test]
    fn waiting_display_brings_headroom_on_attach() {
        let mut tree = SceneTree::default();
        display_on(&mut tree, nid(10), 3);
        assert!(tree.increase_hdr(nid(10), HdrStatus::HdrPhoto, 1));
        plain_screen(&mut tree, nid(1), 3);
        assert_eq!(tree.parent(nid(10)), Some(nid(1)));
        assert_eq!(headroom(&tree, nid(1), HdrStatus::HdrPhoto, 1), 1);
    }

    #[test]
    fn decrease_needs_a_matching_source() {
        let mut tree = SceneTree::default();
        plain_screen(&mut tree, nid(1), 1);
        display_on(&mut tree, nid(10), 1);
        display_on(&mut tree, nid(11), 1);
        assert!(tree.increase_hdr(nid(10), HdrStatus::HdrEffect, 0));
        assert!(!tree.decrease_hdr(nid(11), HdrStatus::HdrEffect, 0));
        assert_eq!(headroom(&tree, nid(1), HdrStatus::HdrEffect, 0), 1);
    }

    #[test]
    fn set_force_close_hdr_targets_owning_screen() {
        let mut tree = SceneTree::default();
        plain_screen(&mut tree, nid(1), 1);
        display_on(&mut tree, nid(10), 1);
        assert!(tree.set_force_close_hdr(nid(10), true));
        assert!(tree.screen(nid(1)).is_some_and(ScreenNode::force_close_hdr));

        display_on(&mut tree, nid(11), 5);
        assert!(!tree.set_force_close_hdr(nid(11), true), "unattached display");
    }

    #[test]
    fn add_child_rejects_cycles_and_screen_children() {
        let mut tree = SceneTree::default();
        plain_screen(&mut tree, nid(1), 1);
        plain_screen(&mut tree, nid(2), 2);
        assert!(tree.create_surface(nid(20)));
        assert!(tree.create_surface(nid(21)));
        assert!(tree.add_child(nid(20), nid(21)));

        assert!(!tree.add_child(nid(21), nid(20)), "cycle");
        assert!(!tree.add_child(nid(20), nid(20)), "self");
        assert!(!tree.add_child(nid(1), nid(2)), "screen under screen");
    }

    #[test]
    fn destroy_orphans_children_and_recycles_slot() {
        let mut tree = SceneTree::default();
        plain_screen(&mut tree, nid(1), 1);
        display_on(&mut tree, nid(10), 1);
        assert!(tree.destroy(nid(1)));
        assert!(!tree.contains(nid(1)));
        assert_eq!(tree.parent(nid(10)), None);
        assert!(tree.display(nid(10)).is_some_and(LogicalDisplayNode::is_waiting_attach));

        plain_screen(&mut tree, nid(2), 1);
        assert_eq!(tree.parent(nid(10)), Some(nid(2)));
        assert_eq!(tree.len(), 2);
        assert!(!tree.destroy(nid(1)), "already destroyed");
    }

    #[test]
    fn screen_status_notifier_fires() {
        use std::sync::Mutex;

        let hooks = Arc::new(CallbackSlots::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        assert!(hooks.set_screen_status_notifier(move |screen, status| {
            sink.lock().unwrap().push((screen, status));
        }));
        let mut tree = SceneTree::new(SceneConfig::default(), hooks);
        plain_screen(&mut tree, nid(1), 3);
        assert!(tree.destroy(nid(1)));
        assert_eq!(
            *seen.lock().unwrap(),
            [
                (ScreenId(3), ScreenStatus::Connected),
                (ScreenId(3), ScreenStatus::Disconnected)
            ]
        );
    }
}
