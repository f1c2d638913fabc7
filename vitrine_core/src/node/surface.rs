// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface nodes: leaf content producers.

use kurbo::Rect;

use crate::params::{SurfaceBuffer, SurfaceRenderParams};
use crate::special_layer::SpecialLayers;

/// A window or buffer source.
#[derive(Clone, Debug)]
pub struct SurfaceNode {
    pub(crate) bounds: Rect,
    pub(crate) buffer: Option<SurfaceBuffer>,
    pub(crate) special_layers: SpecialLayers,
    pub(crate) alpha: f32,
    pub(crate) visible: bool,
}

impl Default for SurfaceNode {
    fn default() -> Self {
        Self {
            bounds: Rect::ZERO,
            buffer: None,
            special_layers: SpecialLayers::NONE,
            alpha: 1.0,
            visible: true,
        }
    }
}

impl SurfaceNode {
    /// Bounds in local coordinates.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Current client frame.
    #[must_use]
    pub fn buffer(&self) -> Option<&SurfaceBuffer> {
        self.buffer.as_ref()
    }

    /// Tags on this surface.
    #[must_use]
    pub fn special_layers(&self) -> SpecialLayers {
        self.special_layers
    }

    /// Opacity.
    #[must_use]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Whether the surface is visible.
    #[must_use]
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Whether the surface contributes pixels.
    #[must_use]
    pub fn should_paint(&self) -> bool {
        self.visible
            && self.alpha > 0.0
            && self.buffer.is_some()
            && self.bounds.width() > 0.0
            && self.bounds.height() > 0.0
    }

    pub(crate) fn render_params(&self) -> SurfaceRenderParams {
        SurfaceRenderParams {
            bounds: self.bounds,
            buffer: self.buffer.clone(),
            special_layers: self.special_layers,
            alpha: self.alpha,
            visible: self.visible,
            should_paint: self.should_paint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_paint_requires_every_condition() {
        let painted = SurfaceNode {
            bounds: Rect::new(0.0, 0.0, 10.0, 10.0),
            buffer: Some(SurfaceBuffer::solid(1, 1, [255; 4])),
            ..SurfaceNode::default()
        };
        assert!(painted.should_paint());

        assert!(!SurfaceNode {
            visible: false,
            ..painted.clone()
        }
        .should_paint());
        assert!(!SurfaceNode {
            alpha: 0.0,
            ..painted.clone()
        }
        .should_paint());
        assert!(!SurfaceNode {
            buffer: None,
            ..painted.clone()
        }
        .should_paint());
        assert!(!SurfaceNode {
            bounds: Rect::new(5.0, 5.0, 5.0, 20.0),
            ..painted
        }
        .should_paint());
    }
}
