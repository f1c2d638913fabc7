// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Logical display nodes: one content rectangle assigned to a screen.

use kurbo::Rect;

use crate::hdr::{HdrType, HdrTypeCounts, HeadroomMap};
use crate::output::{CompositeType, ScreenId, ScreenRotation};
use crate::params::DisplayRenderParams;
use crate::special_layer::{SpecialLayerRegistry, SpecialLayers};

use super::id::NodeId;
use super::modifier::{Modifier, ModifierSlots};

/// Creation parameters of a logical display.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LogicalDisplayConfig {
    /// Sink the display is assigned to.
    pub screen_id: ScreenId,
    /// Whether the display mirrors another display.
    pub is_mirrored: bool,
    /// Display to mirror when `is_mirrored` is set.
    pub mirror_source: Option<NodeId>,
}

/// Converts a continuous rotation angle (degrees) to a quadrant.
///
/// The angle is divided by −90°, rounded, and folded into 0..=3 by magnitude,
/// so 0° → 0, −90° → 1, ±180° → 2 and ±270° → 3.
#[must_use]
pub fn rotation_from_angle(angle: f64) -> ScreenRotation {
    if !angle.is_finite() {
        return ScreenRotation::Rotation0;
    }
    #[expect(
        clippy::cast_possible_truncation,
        reason = "angles are folded modulo 4 quarter turns right after the cast"
    )]
    let quarter_turns = ((angle / -90.0).round() % 4.0) as i32;
    ScreenRotation::from_quadrant(quarter_turns.unsigned_abs())
}

/// One content rectangle belonging to one screen.
#[derive(Debug)]
pub struct LogicalDisplayNode {
    pub(crate) screen_id: ScreenId,
    pub(crate) waiting_attach: bool,
    pub(crate) content_rect: Rect,
    pub(crate) bounds: Rect,
    pub(crate) screen_rotation: ScreenRotation,
    pub(crate) rotation_angle: f64,
    last_rotation_angle: f64,
    pre_rotation_changed: bool,
    cur_rotation_changed: bool,
    pub(crate) is_mirrored: bool,
    pub(crate) mirror_source: Option<NodeId>,
    pub(crate) mirror_rotation_offset: ScreenRotation,
    pub(crate) security_display: bool,
    pub(crate) special_layers: SpecialLayerRegistry,
    pub(crate) composite_type: CompositeType,
    fixed_width: f64,
    fixed_height: f64,
    pub(crate) hdr_types: HdrTypeCounts,
    pub(crate) headroom_sources: HeadroomMap,
    pub(crate) hdr_brightness_factor: f32,
    pub(crate) boot_animation: bool,
    pub(crate) virtual_screen_muted: bool,
    pub(crate) modifiers: ModifierSlots,
}

impl LogicalDisplayNode {
    pub(crate) fn new(config: LogicalDisplayConfig) -> Self {
        Self {
            screen_id: config.screen_id,
            waiting_attach: false,
            content_rect: Rect::ZERO,
            bounds: Rect::ZERO,
            screen_rotation: ScreenRotation::Rotation0,
            rotation_angle: 0.0,
            last_rotation_angle: 0.0,
            pre_rotation_changed: false,
            cur_rotation_changed: false,
            is_mirrored: config.is_mirrored,
            mirror_source: None,
            mirror_rotation_offset: ScreenRotation::Rotation0,
            security_display: false,
            special_layers: SpecialLayerRegistry::new(),
            composite_type: CompositeType::UniRender,
            fixed_width: 0.0,
            fixed_height: 0.0,
            hdr_types: HdrTypeCounts::default(),
            headroom_sources: HeadroomMap::new(),
            hdr_brightness_factor: 1.0,
            boot_animation: false,
            virtual_screen_muted: false,
            modifiers: ModifierSlots::default(),
        }
    }

    /// Sink the display is assigned to.
    #[must_use]
    pub fn screen_id(&self) -> ScreenId {
        self.screen_id
    }

    /// Whether no screen with a matching id existed at the last attach attempt.
    #[must_use]
    pub fn is_waiting_attach(&self) -> bool {
        self.waiting_attach
    }

    /// Content rectangle within the screen.
    #[must_use]
    pub fn content_rect(&self) -> Rect {
        self.content_rect
    }

    /// Display bounds.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Sets the display bounds and refreshes the rotation-corrected size.
    pub fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
        self.update_fixed_size();
    }

    /// Rotation requested through the command helper.
    #[must_use]
    pub fn screen_rotation(&self) -> ScreenRotation {
        self.screen_rotation
    }

    /// Sets the continuous rotation angle, in degrees.
    pub fn set_rotation_angle(&mut self, angle: f64) {
        self.rotation_angle = angle;
    }

    /// Quadrant derived from the continuous rotation angle.
    #[must_use]
    pub fn rotation(&self) -> ScreenRotation {
        rotation_from_angle(self.rotation_angle)
    }

    /// Advances the rotation state machine with the current angle.
    ///
    /// Returns [`is_rotation_changed`](Self::is_rotation_changed) after the
    /// update.
    pub fn update_rotation(&mut self) -> bool {
        self.pre_rotation_changed = self.cur_rotation_changed;
        self.cur_rotation_changed = self.rotation_angle != self.last_rotation_angle;
        self.last_rotation_angle = self.rotation_angle;
        self.update_fixed_size();
        self.is_rotation_changed()
    }

    /// Whether a rotation is in flight.
    ///
    /// A rotation stays in flight for one frame after the angle stops
    /// changing, so the settling frame is also fully redrawn.
    #[must_use]
    pub fn is_rotation_changed(&self) -> bool {
        !(self.pre_rotation_changed == self.cur_rotation_changed && !self.cur_rotation_changed)
    }

    /// Caches bounds width/height, swapped at 90° and 270°.
    pub fn update_fixed_size(&mut self) {
        let (w, h) = (self.bounds.width(), self.bounds.height());
        if self.rotation().is_portrait_swap() {
            self.fixed_width = h;
            self.fixed_height = w;
        } else {
            self.fixed_width = w;
            self.fixed_height = h;
        }
    }

    /// Rotation-corrected width.
    #[must_use]
    pub fn fixed_width(&self) -> f64 {
        self.fixed_width
    }

    /// Rotation-corrected height.
    #[must_use]
    pub fn fixed_height(&self) -> f64 {
        self.fixed_height
    }

    /// Whether the display was configured to mirror another display.
    #[must_use]
    pub fn is_mirrored(&self) -> bool {
        self.is_mirrored
    }

    /// Display this one mirrors.
    #[must_use]
    pub fn mirror_source(&self) -> Option<NodeId> {
        self.mirror_source
    }

    /// Rotation compensating the mirror source's physical rotation.
    #[must_use]
    pub fn mirror_rotation_offset(&self) -> ScreenRotation {
        self.mirror_rotation_offset
    }

    /// Whether this display may show security layers.
    #[must_use]
    pub fn security_display(&self) -> bool {
        self.security_display
    }

    /// Tagged nodes of the subtree.
    #[must_use]
    pub fn special_layers(&self) -> &SpecialLayerRegistry {
        &self.special_layers
    }

    /// Layer combination strategy.
    #[must_use]
    pub fn composite_type(&self) -> CompositeType {
        self.composite_type
    }

    /// Sets the layer combination strategy.
    pub fn set_composite_type(&mut self, composite_type: CompositeType) {
        self.composite_type = composite_type;
    }

    /// Per-type counts of HDR sources among the children.
    #[must_use]
    pub fn hdr_types(&self) -> &HdrTypeCounts {
        &self.hdr_types
    }

    /// Headroom sources registered through this display.
    ///
    /// They count toward the headroom map of whichever screen the display
    /// is attached under.
    #[must_use]
    pub fn headroom_sources(&self) -> &HeadroomMap {
        &self.headroom_sources
    }

    /// Registers a child HDR source of type `ty`.
    pub fn increase_hdr_type(&mut self, ty: HdrType) {
        self.hdr_types.increase(ty);
    }

    /// Releases a child HDR source of type `ty`.
    pub fn decrease_hdr_type(&mut self, ty: HdrType) {
        self.hdr_types.decrease(ty);
    }

    /// Brightness factor applied to HDR content; zero means HDR is dimmed out.
    #[must_use]
    pub fn hdr_brightness_factor(&self) -> f32 {
        self.hdr_brightness_factor
    }

    /// Sets the HDR brightness factor.
    pub fn set_hdr_brightness_factor(&mut self, factor: f32) {
        self.hdr_brightness_factor = factor;
    }

    /// Whether the boot animation is shown.
    #[must_use]
    pub fn boot_animation(&self) -> bool {
        self.boot_animation
    }

    /// Whether the virtual screen output is muted.
    #[must_use]
    pub fn virtual_screen_muted(&self) -> bool {
        self.virtual_screen_muted
    }

    /// Property modifiers attached to the display.
    #[must_use]
    pub fn modifiers(&self) -> &ModifierSlots {
        &self.modifiers
    }

    /// Attaches a property modifier.
    pub fn add_modifier(&mut self, modifier: Modifier) {
        self.modifiers.add(modifier);
    }

    /// Builds the staging snapshot for the next sync.
    pub(crate) fn render_params(&self, screen_node: Option<NodeId>) -> DisplayRenderParams {
        let security_layer_ids: Vec<NodeId> =
            self.special_layers.ids(SpecialLayers::SECURITY).collect();
        DisplayRenderParams {
            screen_id: self.screen_id,
            screen_node,
            content_rect: self.content_rect,
            bounds: self.bounds,
            rotation: self.rotation(),
            rotation_changed: self.is_rotation_changed(),
            mirror_source: self.mirror_source,
            mirror_rotation_offset: self.mirror_rotation_offset,
            security_display: self.security_display,
            special_layers: self.special_layers.clone(),
            security_visible_layer_ids: Vec::new(),
            security_layer_ids,
            composite_type: self.composite_type,
            fixed_width: self.fixed_width,
            fixed_height: self.fixed_height,
            boot_animation: self.boot_animation,
            virtual_screen_muted: self.virtual_screen_muted,
        }
    }
}

/// Narrow mutation surface reserved for the command helper.
///
/// Each method applies one fire-and-forget command that needs no knowledge
/// of the rest of the tree.
pub(crate) trait DisplayCommandTarget {
    fn set_content_rect(&mut self, rect: Rect);
    fn set_screen_rotation(&mut self, rotation: ScreenRotation);
    fn set_security_display(&mut self, enabled: bool);
    fn set_boot_animation(&mut self, enabled: bool);
    fn clear_modifiers_by_pid(&mut self, pid: u32) -> usize;
    fn set_virtual_screen_mute_status(&mut self, muted: bool);
}

impl DisplayCommandTarget for LogicalDisplayNode {
    fn set_content_rect(&mut self, rect: Rect) {
        self.content_rect = rect;
    }

    fn set_screen_rotation(&mut self, rotation: ScreenRotation) {
        self.screen_rotation = rotation;
        // The requested quadrant drives the continuous angle.
        self.rotation_angle = -rotation.degrees();
        self.update_fixed_size();
    }

    fn set_security_display(&mut self, enabled: bool) {
        self.security_display = enabled;
    }

    fn set_boot_animation(&mut self, enabled: bool) {
        self.boot_animation = enabled;
    }

    fn clear_modifiers_by_pid(&mut self, pid: u32) -> usize {
        self.modifiers.clear_by_pid(pid)
    }

    fn set_virtual_screen_mute_status(&mut self, muted: bool) {
        self.virtual_screen_muted = muted;
    }
}
