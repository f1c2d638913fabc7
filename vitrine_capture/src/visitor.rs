// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-pass traversal of a synced subtree into a canvas.

use kurbo::Affine;
use vitrine_core::drawable::{Drawable, NodeRegistry};
use vitrine_core::node::NodeId;
use vitrine_core::output::ScreenRotation;
use vitrine_core::params::{
    DisplayRenderParams, NodeParams, ScreenRenderParams, SurfaceRenderParams,
};
use vitrine_core::special_layer::SpecialLayers;

use crate::canvas::Canvas;
use crate::config::is_valid_rect;
use crate::engine::DrawingEngine;
use crate::pixel::Rgba8;

/// A drawable viewed through its node kind.
#[derive(Clone, Copy, Debug)]
pub enum CaptureNode<'a> {
    /// A screen.
    Screen(&'a Drawable, &'a ScreenRenderParams),
    /// A logical display.
    Display(&'a Drawable, &'a DisplayRenderParams),
    /// A surface.
    Surface(&'a Drawable, &'a SurfaceRenderParams),
}

impl<'a> CaptureNode<'a> {
    /// Classifies `drawable` by its synced parameters.
    #[must_use]
    pub fn new(drawable: &'a Drawable) -> Self {
        match drawable.params() {
            NodeParams::Screen(p) => Self::Screen(drawable, p),
            NodeParams::Display(p) => Self::Display(drawable, p),
            NodeParams::Surface(p) => Self::Surface(drawable, p),
        }
    }

    /// The underlying drawable.
    #[must_use]
    pub fn drawable(self) -> &'a Drawable {
        match self {
            Self::Screen(d, _) | Self::Display(d, _) | Self::Surface(d, _) => d,
        }
    }
}

/// Maps content of a `size` source rotated by `offset` quarter turns back
/// into the positive quadrant.
fn mirror_transform(offset: ScreenRotation, width: f64, height: f64) -> Affine {
    match offset {
        ScreenRotation::Rotation0 => Affine::IDENTITY,
        ScreenRotation::Rotation90 => Affine::new([0.0, 1.0, -1.0, 0.0, height, 0.0]),
        ScreenRotation::Rotation180 => Affine::new([-1.0, 0.0, 0.0, -1.0, width, height]),
        ScreenRotation::Rotation270 => Affine::new([0.0, -1.0, 1.0, 0.0, 0.0, width]),
    }
}

/// Draws a subtree, redacting special layers.
///
/// Each child is drawn with the delta between its accumulated transform and
/// its parent's, so the root renders at its own local origin whatever its
/// position on screen.
pub struct CaptureVisitor<'a, R: NodeRegistry + ?Sized> {
    registry: &'a R,
    engine: &'a dyn DrawingEngine,
    redaction_color: Rgba8,
    in_redacted: bool,
    redacted: usize,
    mirror_chain: Vec<NodeId>,
}

impl<R: NodeRegistry + ?Sized> core::fmt::Debug for CaptureVisitor<'_, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CaptureVisitor")
            .field("redaction_color", &self.redaction_color)
            .field("in_redacted", &self.in_redacted)
            .field("redacted", &self.redacted)
            .finish_non_exhaustive()
    }
}

impl<'a, R: NodeRegistry + ?Sized> CaptureVisitor<'a, R> {
    /// Creates a visitor resolving children through `registry`.
    pub fn new(registry: &'a R, engine: &'a dyn DrawingEngine, redaction_color: Rgba8) -> Self {
        Self {
            registry,
            engine,
            redaction_color,
            in_redacted: false,
            redacted: 0,
            mirror_chain: Vec::new(),
        }
    }

    /// Number of surfaces filled instead of drawn so far.
    #[must_use]
    pub fn redacted(&self) -> usize {
        self.redacted
    }

    /// Draws a capture root and its subtree.
    ///
    /// Like [`visit`](Self::visit), except that `root` is redacted when a
    /// surface above it carries a redacting tag.
    pub fn visit_root(&mut self, canvas: &mut dyn Canvas, root: &Drawable) {
        let outer = self.in_redacted;
        self.in_redacted = outer || self.has_redacted_ancestor(root);
        self.visit(canvas, root);
        self.in_redacted = outer;
    }

    /// Draws `node` and its subtree in the canvas's current space.
    pub fn visit(&mut self, canvas: &mut dyn Canvas, node: &Drawable) {
        match CaptureNode::new(node) {
            CaptureNode::Screen(d, p) => self.visit_screen(canvas, d, p),
            CaptureNode::Display(d, p) => self.visit_display(canvas, d, p),
            CaptureNode::Surface(d, p) => self.visit_surface(canvas, d, p),
        }
    }

    fn visit_screen(&mut self, canvas: &mut dyn Canvas, node: &Drawable, p: &ScreenRenderParams) {
        match self.resolve_mirror(node.id(), p.mirror_source) {
            Some(source) => {
                self.visit_children(canvas, &source);
                let _ = self.mirror_chain.pop();
            }
            None => self.visit_children(canvas, node),
        }
    }

    fn visit_display(
        &mut self,
        canvas: &mut dyn Canvas,
        node: &Drawable,
        p: &DisplayRenderParams,
    ) {
        let Some(source) = self.resolve_mirror(node.id(), p.mirror_source) else {
            self.visit_children(canvas, node);
            return;
        };
        let size = source
            .as_display()
            .map_or(kurbo::Size::ZERO, |s| s.bounds.size());
        canvas.save();
        canvas.concat(mirror_transform(
            p.mirror_rotation_offset,
            size.width,
            size.height,
        ));
        self.visit_children(canvas, &source);
        canvas.restore();
        let _ = self.mirror_chain.pop();
    }

    fn visit_surface(&mut self, canvas: &mut dyn Canvas, node: &Drawable, p: &SurfaceRenderParams) {
        let outer = self.in_redacted;
        self.in_redacted = outer || p.special_layers.intersects(SpecialLayers::REDACTED);
        if self.in_redacted {
            if p.visible && is_valid_rect(p.bounds) {
                canvas.fill_rect(p.bounds, self.redaction_color);
                self.redacted += 1;
            }
        } else {
            self.engine.draw_surface_node_with_params(canvas, node, p);
        }
        self.visit_children(canvas, node);
        self.in_redacted = outer;
    }

    fn visit_children(&mut self, canvas: &mut dyn Canvas, parent: &Drawable) {
        let base = parent.abs_transform().inverse();
        for &child in parent.children() {
            let Some(child) = self.registry.drawable(child) else {
                log::trace!("capture: child {child:?} of {:?} not synced", parent.id());
                continue;
            };
            canvas.save();
            canvas.concat(base * child.abs_transform());
            self.visit(canvas, &child);
            canvas.restore();
        }
    }

    fn has_redacted_ancestor(&self, node: &Drawable) -> bool {
        let mut seen = vec![node.id()];
        let mut next = node.parent();
        while let Some(id) = next {
            if seen.contains(&id) {
                log::warn!("capture: parent loop through {id:?}");
                return false;
            }
            let Some(parent) = self.registry.drawable(id) else {
                return false;
            };
            if parent
                .as_surface()
                .is_some_and(|p| p.special_layers.intersects(SpecialLayers::REDACTED))
            {
                return true;
            }
            seen.push(id);
            next = parent.parent();
        }
        false
    }

    /// Looks up the mirror source of `node`, pushing it on the mirror chain.
    ///
    /// Returns `None` (and pushes nothing) when there is no source, it is
    /// not synced, or following it would loop.
    fn resolve_mirror(
        &mut self,
        node: NodeId,
        source: Option<NodeId>,
    ) -> Option<std::sync::Arc<Drawable>> {
        let source = source?;
        if source == node || self.mirror_chain.contains(&source) {
            log::warn!("capture: mirror loop through {source:?}, drawing {node:?} unmirrored");
            return None;
        }
        let drawable = self.registry.drawable(source)?;
        self.mirror_chain.push(source);
        Some(drawable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_transform_keeps_content_in_positive_quadrant() {
        let (w, h) = (40.0, 10.0);
        let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)];
        for (offset, (ew, eh)) in [
            (ScreenRotation::Rotation0, (w, h)),
            (ScreenRotation::Rotation90, (h, w)),
            (ScreenRotation::Rotation180, (w, h)),
            (ScreenRotation::Rotation270, (h, w)),
        ] {
            let t = mirror_transform(offset, w, h);
            for (x, y) in corners {
                let p = t * kurbo::Point::new(x, y);
                assert!(
                    (0.0..=ew).contains(&p.x) && (0.0..=eh).contains(&p.y),
                    "{offset:?} maps ({x}, {y}) to {p:?}"
                );
            }
        }
    }
}
