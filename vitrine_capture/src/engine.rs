// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface content drawing.

use vitrine_core::drawable::Drawable;
use vitrine_core::params::SurfaceRenderParams;

use crate::canvas::Canvas;

/// Draws one surface's content into a canvas.
///
/// The canvas transform already places the surface; the engine draws in the
/// surface's local space.
pub trait DrawingEngine {
    /// Draws `node` with its synced `params`.
    fn draw_surface_node_with_params(
        &self,
        canvas: &mut dyn Canvas,
        node: &Drawable,
        params: &SurfaceRenderParams,
    );
}

/// Blits each surface's buffer over its bounds.
#[derive(Clone, Copy, Debug, Default)]
pub struct RasterDrawingEngine;

impl DrawingEngine for RasterDrawingEngine {
    fn draw_surface_node_with_params(
        &self,
        canvas: &mut dyn Canvas,
        node: &Drawable,
        params: &SurfaceRenderParams,
    ) {
        if !params.should_paint {
            return;
        }
        let Some(buffer) = params.buffer.as_ref() else {
            return;
        };
        log::trace!(
            "draw {:?} {}x{} into {:?}",
            node.id(),
            buffer.width(),
            buffer.height(),
            params.bounds
        );
        canvas.draw_image(buffer, params.bounds, params.alpha);
    }
}
