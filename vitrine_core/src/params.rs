// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render parameters exchanged between the producer and consumer contexts.
//!
//! Every node owns one parameter pair:
//!
//! - [`StagingParams`] lives in the producer's [`SceneTree`] and may be
//!   rewritten any number of times per frame.
//! - [`SyncedParams`] lives in the consumer's [`DrawableTree`] and is written
//!   exactly once per frame, from a copy of the staging half carried by a
//!   [`SyncBatch`].
//!
//! Neither half is ever reachable from both contexts, so no field is written
//! concurrently; the batch is the only crossing point.
//!
//! [`SceneTree`]: crate::node::SceneTree
//! [`DrawableTree`]: crate::drawable::DrawableTree
//! [`SyncBatch`]: crate::sync::SyncBatch

use std::sync::Arc;

use kurbo::Rect;

use crate::damage::DamageRegion;
use crate::node::NodeId;
use crate::output::{ColorGamut, CompositeType, ScreenId, ScreenRotation};
use crate::special_layer::{SpecialLayerRegistry, SpecialLayers};

/// An immutable RGBA8 frame produced by a surface's client.
///
/// Rows are tightly packed, top to bottom. Cloning shares the pixel storage.
#[derive(Clone, Debug)]
pub struct SurfaceBuffer {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl SurfaceBuffer {
    /// Bytes per pixel.
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Wraps `data` as a `width` × `height` frame.
    ///
    /// Returns `None` if `data` does not hold exactly `width * height` pixels.
    #[must_use]
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Option<Self> {
        let data = data.into();
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(Self::BYTES_PER_PIXEL)?;
        (data.len() == expected).then_some(Self {
            width,
            height,
            data,
        })
    }

    /// Creates a frame filled with one RGBA color.
    #[must_use]
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data: Vec<u8> = core::iter::repeat_n(rgba, width as usize * height as usize)
            .flatten()
            .collect();
        Self {
            width,
            height,
            data: data.into(),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl PartialEq for SurfaceBuffer {
    /// Two buffers are equal when they share storage; content is not
    /// compared.
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && Arc::ptr_eq(&self.data, &other.data)
    }
}

/// Render-relevant state of a screen.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScreenRenderParams {
    /// Sink this screen drives.
    pub screen_id: ScreenId,
    /// Layer combination strategy.
    pub composite_type: CompositeType,
    /// Output color space.
    pub color_gamut: ColorGamut,
    /// Screen whose content this one mirrors.
    pub mirror_source: Option<NodeId>,
    /// Whether another screen mirrors this one.
    pub has_mirror_screen: bool,
    /// Whether HDR is forcibly disabled on this screen.
    pub force_close_hdr: bool,
    /// Whether any HDR source is active.
    pub hdr_present: bool,
    /// Whether a child display is playing the boot animation.
    pub contains_boot_animation: bool,
    /// Round-corner overlay drawn over the top edge.
    pub round_corner_top: Option<NodeId>,
    /// Round-corner overlay drawn over the bottom edge.
    pub round_corner_bottom: Option<NodeId>,
    /// Damage to repaint for the current back buffer.
    pub damage: DamageRegion,
}

/// Render-relevant state of a logical display.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayRenderParams {
    /// Sink the display belongs to.
    pub screen_id: ScreenId,
    /// Screen node the display is attached under, if attached.
    pub screen_node: Option<NodeId>,
    /// Content rectangle within the screen.
    pub content_rect: Rect,
    /// Display bounds.
    pub bounds: Rect,
    /// Rotation quadrant of the display.
    pub rotation: ScreenRotation,
    /// Whether a rotation is in flight (forces full redraw).
    pub rotation_changed: bool,
    /// Display this one mirrors.
    pub mirror_source: Option<NodeId>,
    /// Rotation compensating the mirror source's physical rotation.
    pub mirror_rotation_offset: ScreenRotation,
    /// Whether this display may show security layers.
    pub security_display: bool,
    /// Tagged nodes in the display's subtree.
    pub special_layers: SpecialLayerRegistry,
    /// Ids of SECURITY-tagged nodes in the subtree.
    pub security_layer_ids: Vec<NodeId>,
    /// Ids of SECURITY-tagged nodes that currently paint.
    pub security_visible_layer_ids: Vec<NodeId>,
    /// Layer combination strategy.
    pub composite_type: CompositeType,
    /// Bounds width corrected for rotation.
    pub fixed_width: f64,
    /// Bounds height corrected for rotation.
    pub fixed_height: f64,
    /// Whether the boot animation is shown.
    pub boot_animation: bool,
    /// Whether the virtual screen output is muted.
    pub virtual_screen_muted: bool,
}

/// Render-relevant state of a surface.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceRenderParams {
    /// Bounds in local coordinates.
    pub bounds: Rect,
    /// Current client frame.
    pub buffer: Option<SurfaceBuffer>,
    /// Tags on the surface itself.
    pub special_layers: SpecialLayers,
    /// Opacity.
    pub alpha: f32,
    /// Whether the surface is visible.
    pub visible: bool,
    /// Whether the surface contributes pixels this frame.
    pub should_paint: bool,
}

impl Default for SurfaceRenderParams {
    fn default() -> Self {
        Self {
            bounds: Rect::ZERO,
            buffer: None,
            special_layers: SpecialLayers::NONE,
            alpha: 1.0,
            visible: true,
            should_paint: false,
        }
    }
}

/// Render parameters of any node kind.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeParams {
    /// Screen parameters.
    Screen(ScreenRenderParams),
    /// Logical display parameters.
    Display(DisplayRenderParams),
    /// Surface parameters.
    Surface(SurfaceRenderParams),
}

/// The producer-side half of a parameter pair.
#[derive(Clone, Debug)]
pub struct StagingParams<T> {
    staging: T,
    needs_sync: bool,
}

impl<T: Clone + PartialEq> StagingParams<T> {
    /// Creates a staging half that will be synced once.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            staging: initial,
            needs_sync: true,
        }
    }

    /// Replaces the staged value.
    ///
    /// Only raises the needs-sync flag if the value actually changed.
    /// Returns whether the node is now pending sync.
    pub fn stage(&mut self, next: T) -> bool {
        if self.staging != next {
            self.staging = next;
            self.needs_sync = true;
        }
        self.needs_sync
    }

    /// Returns the staged value.
    #[must_use]
    pub fn get(&self) -> &T {
        &self.staging
    }

    /// Returns whether the staged value has not been synced yet.
    #[must_use]
    pub fn needs_sync(&self) -> bool {
        self.needs_sync
    }

    /// Copies the staged value out for the consumer and clears the flag.
    ///
    /// Returns `None` if nothing changed since the last sync.
    pub fn take_for_sync(&mut self) -> Option<T> {
        if !self.needs_sync {
            return None;
        }
        self.needs_sync = false;
        Some(self.staging.clone())
    }
}

/// The consumer-side half of a parameter pair.
#[derive(Clone, Debug)]
pub struct SyncedParams<T> {
    synced: T,
    frame_index: u64,
}

impl<T> SyncedParams<T> {
    /// Creates the synced half from the first copy received for `frame_index`.
    #[must_use]
    pub fn new(value: T, frame_index: u64) -> Self {
        Self {
            synced: value,
            frame_index,
        }
    }

    /// Returns the synced value.
    #[must_use]
    pub fn get(&self) -> &T {
        &self.synced
    }

    /// Frame in which the value was last written.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Writes the copy for `frame_index`.
    ///
    /// Returns `false` without writing if this half was already written for
    /// the same or a later frame.
    pub fn apply(&mut self, value: T, frame_index: u64) -> bool {
        if frame_index <= self.frame_index {
            return false;
        }
        self.synced = value;
        self.frame_index = frame_index;
        true
    }
}
