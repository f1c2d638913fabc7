// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The producer-side synchronization pass.
//!
//! [`SceneTree::sync`] turns one frame of mutations into a [`SyncBatch`]:
//!
//! 1. **GEOMETRY**: drain, recompute accumulated transforms in
//!    parent-before-child order.
//! 2. **Rotation**: advance every display's rotation state machine; a
//!    display with a rotation in flight forces full damage on its screen.
//! 3. **TOPOLOGY** / **PARAMS**: drain, then restage every drained node plus
//!    every screen and display (their parameters aggregate children or
//!    carry per-frame damage).
//! 4. A node enters the batch only if its staging half changed or its
//!    position in the tree did.
//!
//! Entries follow the depth-first pre-order of the tree, so the consumer
//! always sees a parent before its children.

use std::collections::BTreeSet;

use kurbo::Affine;

use crate::dirty;
use crate::params::{NodeParams, StagingParams};
use crate::special_layer::{SpecialLayerRegistry, SpecialLayers};
use crate::sync::{SyncBatch, SyncEntry};
use crate::trace::{SyncEvent, Tracer};

use super::id::{INVALID, NodeId};
use super::surface::SurfaceNode;
use super::tree::{NodeKind, NodeType, SceneTree};

impl SceneTree {
    /// Builds the sync batch for the next frame.
    pub fn sync(&mut self) -> SyncBatch {
        self.sync_with_tracer(&mut Tracer::none())
    }

    /// Like [`sync`](Self::sync), reporting the batch to `tracer`.
    pub fn sync_with_tracer(&mut self, tracer: &mut Tracer<'_>) -> SyncBatch {
        self.frame_index += 1;
        if self.traversal_dirty {
            self.rebuild_traversal_order();
        }

        let moved: Vec<u32> = self
            .dirty
            .drain(dirty::GEOMETRY)
            .affected()
            .deterministic()
            .run()
            .collect();
        for &idx in &moved {
            if self.nodes[idx as usize].is_none() {
                continue;
            }
            let parent_idx = self.parent[idx as usize];
            let parent_abs = if parent_idx != INVALID {
                self.abs_transform[parent_idx as usize]
            } else {
                Affine::IDENTITY
            };
            self.abs_transform[idx as usize] = parent_abs * self.local_transform[idx as usize];
        }

        let restructured: BTreeSet<u32> = self
            .dirty
            .drain(dirty::TOPOLOGY)
            .deterministic()
            .run()
            .collect();
        let mut pending: BTreeSet<u32> = self
            .dirty
            .drain(dirty::PARAMS)
            .deterministic()
            .run()
            .collect();
        pending.extend(restructured.iter().copied());
        let moved: BTreeSet<u32> = moved.into_iter().collect();
        pending.extend(moved.iter().copied());

        let full_damage_screens = self.advance_rotations();

        let mut entries = Vec::new();
        for pos in 0..self.traversal_order.len() {
            let idx = self.traversal_order[pos];
            let aggregate = matches!(
                self.nodes[idx as usize],
                Some(NodeKind::Screen(_) | NodeKind::Display(_))
            );
            if !aggregate && !pending.contains(&idx) {
                continue;
            }
            let Some(params) = self.build_params(idx, &pending, &full_damage_screens) else {
                continue;
            };
            let changed = if let Some(s) = self.staging[idx as usize].as_mut() {
                s.stage(params)
            } else {
                self.staging[idx as usize] = Some(StagingParams::new(params));
                true
            };
            if !changed && !restructured.contains(&idx) && !moved.contains(&idx) {
                continue;
            }
            let Some(s) = self.staging[idx as usize].as_mut() else {
                continue;
            };
            let params = s.take_for_sync().unwrap_or_else(|| s.get().clone());
            let parent_idx = self.parent[idx as usize];
            entries.push(SyncEntry {
                id: self.ids[idx as usize],
                parent: (parent_idx != INVALID).then(|| self.ids[parent_idx as usize]),
                children: self
                    .child_slots(idx)
                    .map(|c| self.ids[c as usize])
                    .collect(),
                abs_transform: self.abs_transform[idx as usize],
                params,
            });
        }

        for &idx in &self.screens {
            if let Some(NodeKind::Screen(s)) = self.nodes[idx as usize].as_mut() {
                s.dirty_region.advance_frame();
            }
        }

        let batch = SyncBatch {
            frame_index: self.frame_index,
            entries,
            removed: core::mem::take(&mut self.pending_removed),
        };
        log::trace!(
            "sync frame {}: {} entries, {} removed",
            batch.frame_index,
            batch.entries.len(),
            batch.removed.len()
        );
        tracer.sync(&SyncEvent {
            frame_index: batch.frame_index,
            entries: batch.entries.len(),
            removed: batch.removed.len(),
        });
        batch
    }

    /// Advances every display's rotation state machine.
    ///
    /// Returns the screens that must be fully redrawn this frame.
    fn advance_rotations(&mut self) -> BTreeSet<u32> {
        let mut screens = BTreeSet::new();
        for idx in 0..self.len {
            let Some(NodeKind::Display(d)) = self.nodes[idx as usize].as_mut() else {
                continue;
            };
            if d.update_rotation() && self.config.full_damage_on_rotation {
                if let Some(screen) = self.owning_screen(idx) {
                    let _ = screens.insert(screen);
                }
            }
        }
        screens
    }

    fn build_params(
        &mut self,
        idx: u32,
        pending: &BTreeSet<u32>,
        full_damage_screens: &BTreeSet<u32>,
    ) -> Option<NodeParams> {
        match self.slot_type(idx)? {
            NodeType::Screen => {
                let force_close = self.should_force_close_hdr_at(idx);
                let boot = self.child_slots(idx).any(|c| {
                    matches!(
                        self.nodes[c as usize].as_ref(),
                        Some(NodeKind::Display(d)) if d.boot_animation
                    )
                });
                let screen = self.screen_at_mut(idx)?;
                screen.contains_boot_animation = boot;
                let mut params = screen.render_params(full_damage_screens.contains(&idx));
                params.force_close_hdr |= force_close;
                Some(NodeParams::Screen(params))
            }
            NodeType::Display => {
                if pending.contains(&idx) {
                    let registry = self.collect_special_layers(idx);
                    self.display_at_mut(idx)?.special_layers = registry;
                }
                let visible = self.visible_security_layers(idx);
                let screen_node = self.owning_screen(idx).map(|s| self.ids[s as usize]);
                let Some(NodeKind::Display(d)) = self.nodes[idx as usize].as_ref() else {
                    return None;
                };
                let mut params = d.render_params(screen_node);
                params.security_visible_layer_ids = visible;
                Some(NodeParams::Display(params))
            }
            NodeType::Surface => match self.nodes[idx as usize].as_ref()? {
                NodeKind::Surface(s) => Some(NodeParams::Surface(s.render_params())),
                _ => None,
            },
        }
    }

    /// Collects the tags of every surface below display `idx`.
    fn collect_special_layers(&self, idx: u32) -> SpecialLayerRegistry {
        let mut registry = SpecialLayerRegistry::new();
        for c in self.descendant_slots(idx) {
            if let Some(NodeKind::Surface(s)) = self.nodes[c as usize].as_ref() {
                registry.insert(self.ids[c as usize], s.special_layers);
            }
        }
        registry
    }

    /// Security-tagged surfaces of display `idx` that currently paint.
    fn visible_security_layers(&self, idx: u32) -> Vec<NodeId> {
        let Some(NodeKind::Display(d)) = self.nodes[idx as usize].as_ref() else {
            return Vec::new();
        };
        d.special_layers
            .ids(SpecialLayers::SECURITY)
            .filter(|&id| self.surface(id).is_some_and(SurfaceNode::should_paint))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Rect;

    use super::super::{LogicalDisplayConfig, ScreenNodeConfig};
    use super::*;
    use crate::damage::DamageRegion;
    use crate::output::ScreenId;
    use crate::params::SurfaceBuffer;

    fn nid(n: u32) -> NodeId {
        NodeId::from_parts(1, n)
    }

    fn entry(batch: &SyncBatch, id: NodeId) -> Option<&SyncEntry> {
        batch.entries.iter().find(|e| e.id == id)
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
        tree
    }

    #[test]
    fn first_sync_carries_every_node_parent_first() {
        let mut tree = scene();
        let batch = tree.sync();
        assert_eq!(batch.frame_index, 1);
        let order: Vec<NodeId> = batch.entries.iter().map(|e| e.id).collect();
        assert_eq!(order, [nid(1), nid(10), nid(20)]);
        assert_eq!(entry(&batch, nid(10)).map(|e| e.children.clone()), Some(vec![nid(20)]));
        assert_eq!(entry(&batch, nid(20)).and_then(|e| e.parent), Some(nid(10)));
    }

    #[test]
    fn unchanged_frame_is_empty() {
        let mut tree = scene();
        let _ = tree.sync();
        let batch = tree.sync();
        assert!(batch.is_empty(), "unexpected entries: {:?}", batch.entries);
    }

    #[test]
    fn identical_restage_is_not_enqueued() {
        let mut tree = scene();
        assert!(tree.set_surface_alpha(nid(20), 0.5));
        let _ = tree.sync();
        let _ = tree.sync();
        assert!(tree.set_surface_alpha(nid(20), 0.5));
        let batch = tree.sync();
        assert!(entry(&batch, nid(20)).is_none());
    }

    #[test]
    fn transforms_accumulate_down_the_tree() {
        let mut tree = scene();
        assert!(tree.set_transform(nid(10), Affine::translate((10.0, 0.0))));
        assert!(tree.set_transform(nid(20), Affine::translate((0.0, 5.0))));
        let _ = tree.sync();
        assert_eq!(
            tree.abs_transform(nid(20)),
            Some(Affine::translate((10.0, 5.0)))
        );

        assert!(tree.set_transform(nid(10), Affine::translate((20.0, 0.0))));
        let batch = tree.sync();
        assert_eq!(
            entry(&batch, nid(20)).map(|e| e.abs_transform),
            Some(Affine::translate((20.0, 5.0)))
        );
    }

    #[test]
    fn surface_tags_reach_display_registry() {
        let mut tree = scene();
        assert!(tree.set_surface_bounds(nid(20), Rect::new(0.0, 0.0, 4.0, 4.0)));
        assert!(tree.set_surface_buffer(nid(20), Some(SurfaceBuffer::solid(1, 1, [9; 4]))));
        assert!(tree.set_special_layers(nid(20), SpecialLayers::SECURITY));
        let batch = tree.sync();
        let Some(NodeParams::Display(params)) = entry(&batch, nid(10)).map(|e| e.params.clone())
        else {
            panic!("display entry missing");
        };
        assert!(params.special_layers.find(SpecialLayers::SECURITY));
        assert_eq!(params.security_layer_ids, [nid(20)]);
        assert_eq!(params.security_visible_layer_ids, [nid(20)]);
    }

    #[test]
    fn rotation_forces_full_screen_damage() {
        let mut tree = scene();
        let _ = tree.sync();
        if let Some(s) = tree.screen_mut(nid(1)) {
            s.dirty_region_mut().set_buffer_age(1);
        }
        let _ = tree.sync();
        assert!(tree.mark_dirty_rect(nid(1), Rect::new(0.0, 0.0, 1.0, 1.0)));
        let batch = tree.sync();
        let Some(NodeParams::Screen(params)) = entry(&batch, nid(1)).map(|e| e.params.clone())
        else {
            panic!("screen entry missing");
        };
        assert_eq!(
            params.damage,
            DamageRegion::Rects(vec![Rect::new(0.0, 0.0, 1.0, 1.0)])
        );

        if let Some(d) = tree.display_mut(nid(10)) {
            d.set_rotation_angle(-90.0);
        }
        let batch = tree.sync();
        let Some(NodeParams::Screen(params)) = entry(&batch, nid(1)).map(|e| e.params.clone())
        else {
            panic!("screen entry missing");
        };
        assert_eq!(params.damage, DamageRegion::Full);
    }

    #[test]
    fn destroyed_nodes_are_reported_once() {
        let mut tree = scene();
        let _ = tree.sync();
        assert!(tree.destroy(nid(20)));
        let batch = tree.sync();
        assert_eq!(batch.removed, [nid(20)]);
        assert_eq!(entry(&batch, nid(10)).map(|e| e.children.len()), Some(0));
        assert!(tree.sync().removed.is_empty());
    }
}
