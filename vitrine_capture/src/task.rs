// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The one-shot capture request.

use kurbo::{Affine, Point, Rect, Size};
use vitrine_core::drawable::{Drawable, NodeRegistry};
use vitrine_core::node::NodeId;
use vitrine_core::output::{CompositeType, ScreenGeometryProvider};
use vitrine_core::params::{DisplayRenderParams, NodeParams};
use vitrine_core::trace::{CaptureEvent, Tracer};

use crate::canvas::{Canvas, RasterCanvas};
use crate::config::{CaptureOptions, SurfaceCaptureConfig, is_valid_rect};
use crate::engine::DrawingEngine;
use crate::error::CaptureError;
use crate::gpu::GpuBackend;
use crate::pixel::{HeapAllocator, PixelBuffer, PixelBufferAllocator};
use crate::visitor::CaptureVisitor;

/// Captures one surface or logical display into a pixel buffer.
///
/// A task runs once, synchronously, on the consumer context against synced
/// drawables. It either produces a complete buffer or fails without exposing
/// one:
///
/// 1. The scale factors are validated before anything else is touched.
/// 2. The target is resolved through the [`NodeRegistry`].
/// 3. The destination is sized as `ceil(source * scale)` per side and
///    refused above [`CaptureOptions::max_pixels`].
/// 4. The subtree is drawn into a GPU surface when a [`GpuBackend`] is set,
///    else straight into the destination buffer. Surfaces tagged SECURITY
///    or SKIP, or lying under a tagged surface, are filled instead of drawn.
/// 5. GPU pixels are read back into the destination.
pub struct SurfaceCaptureTask<'a, R: NodeRegistry + ?Sized> {
    node_id: NodeId,
    config: SurfaceCaptureConfig,
    options: CaptureOptions,
    registry: &'a R,
    geometry: &'a dyn ScreenGeometryProvider,
    engine: &'a dyn DrawingEngine,
    heap: &'a dyn PixelBufferAllocator,
    shared: Option<&'a dyn PixelBufferAllocator>,
    gpu: Option<&'a dyn GpuBackend>,
}

impl<R: NodeRegistry + ?Sized> core::fmt::Debug for SurfaceCaptureTask<'_, R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SurfaceCaptureTask")
            .field("node_id", &self.node_id)
            .field("config", &self.config)
            .field("options", &self.options)
            .field("gpu", &self.gpu.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a, R: NodeRegistry + ?Sized> SurfaceCaptureTask<'a, R> {
    /// Creates a raster capture of `node_id` into heap memory.
    pub fn new(
        node_id: NodeId,
        config: SurfaceCaptureConfig,
        registry: &'a R,
        geometry: &'a dyn ScreenGeometryProvider,
        engine: &'a dyn DrawingEngine,
    ) -> Self {
        Self {
            node_id,
            config,
            options: CaptureOptions::default(),
            registry,
            geometry,
            engine,
            heap: &HeapAllocator,
            shared: None,
            gpu: None,
        }
    }

    /// Overrides the capture-wide options.
    #[must_use]
    pub fn with_options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }

    /// Allocator used when the request sets
    /// [`use_dma`](SurfaceCaptureConfig::use_dma).
    #[must_use]
    pub fn with_shared_allocator(mut self, allocator: &'a dyn PixelBufferAllocator) -> Self {
        self.shared = Some(allocator);
        self
    }

    /// Draws on the GPU and reads the result back.
    #[must_use]
    pub fn with_gpu(mut self, backend: &'a dyn GpuBackend) -> Self {
        self.gpu = Some(backend);
        self
    }

    /// The request parameters.
    #[must_use]
    pub fn config(&self) -> &SurfaceCaptureConfig {
        &self.config
    }

    /// Runs the capture and returns the buffer.
    pub fn try_run(&self) -> Result<PixelBuffer, CaptureError> {
        self.capture(&mut Tracer::none())
    }

    /// Runs the capture, handing the buffer to `callback` on success.
    ///
    /// `callback` fires at most once, synchronously, and never on failure.
    /// Returns whether it fired.
    pub fn run(self, callback: impl FnOnce(NodeId, &SurfaceCaptureConfig, PixelBuffer)) -> bool {
        self.run_with_tracer(&mut Tracer::none(), callback)
    }

    /// Like [`run`](Self::run), reporting the outcome to `tracer`.
    pub fn run_with_tracer(
        self,
        tracer: &mut Tracer<'_>,
        callback: impl FnOnce(NodeId, &SurfaceCaptureConfig, PixelBuffer),
    ) -> bool {
        match self.capture(tracer) {
            Ok(buffer) => {
                log::debug!(
                    "captured {:?} at {}x{}",
                    self.node_id,
                    buffer.width(),
                    buffer.height()
                );
                callback(self.node_id, &self.config, buffer);
                true
            }
            Err(err) => {
                log::warn!("capture of {:?} failed: {err}", self.node_id);
                false
            }
        }
    }

    fn capture(&self, tracer: &mut Tracer<'_>) -> Result<PixelBuffer, CaptureError> {
        let mut event = CaptureEvent {
            node: self.node_id,
            width: 0,
            height: 0,
            redacted: 0,
            success: false,
        };
        let result = self.capture_inner(&mut event);
        event.success = result.is_ok();
        tracer.capture(&event);
        result
    }

    fn capture_inner(&self, event: &mut CaptureEvent) -> Result<PixelBuffer, CaptureError> {
        self.config.validate()?;
        let root = self
            .registry
            .drawable(self.node_id)
            .ok_or(CaptureError::NotFound(self.node_id))?;
        let source = self.source_rect(&root)?;
        let (width, height) = self.config.destination_size(source.size());
        event.width = width;
        event.height = height;
        if u64::from(width) * u64::from(height) > self.options.max_pixels {
            return Err(CaptureError::ResourceUnavailable(format!(
                "{width}x{height} destination exceeds {} pixels",
                self.options.max_pixels
            )));
        }

        let allocator = match (self.config.use_dma, self.shared) {
            (true, Some(shared)) => shared,
            _ => self.heap,
        };
        let mut dst = allocator.allocate(width, height)?;
        dst.set_color_space(self.config.color_space);

        // Place the source's local origin at the destination origin.
        let root_transform = Affine::scale_non_uniform(self.config.scale_x, self.config.scale_y)
            * Affine::translate(-source.origin().to_vec2());

        match self.gpu {
            Some(gpu) => {
                let mut surface =
                    gpu.create_surface(width, height, self.config.color_space)?;
                event.redacted = self.draw(surface.canvas(), &root, root_transform);
                surface.read_pixels(&mut dst)?;
                Ok(dst)
            }
            None => {
                let mut canvas = RasterCanvas::new(dst);
                event.redacted = self.draw(&mut canvas, &root, root_transform);
                Ok(canvas.into_inner())
            }
        }
    }

    fn draw(&self, canvas: &mut dyn Canvas, root: &Drawable, root_transform: Affine) -> usize {
        canvas.clear(self.options.clear_color);
        canvas.save();
        canvas.concat(root_transform);
        let mut visitor =
            CaptureVisitor::new(self.registry, self.engine, self.options.redaction_color);
        visitor.visit_root(canvas, root);
        canvas.restore();
        visitor.redacted()
    }

    /// Region of the target's local space that maps onto the destination.
    fn source_rect(&self, root: &Drawable) -> Result<Rect, CaptureError> {
        let rect = match root.params() {
            NodeParams::Surface(p) => p.bounds,
            NodeParams::Display(p) => self.display_rect(p)?,
            NodeParams::Screen(_) => return Err(CaptureError::NotFound(self.node_id)),
        };
        Ok(self.config.valid_sub_rect().unwrap_or(rect))
    }

    fn display_rect(&self, p: &DisplayRenderParams) -> Result<Rect, CaptureError> {
        if is_valid_rect(p.content_rect) {
            return Ok(p.content_rect);
        }
        let Some(info) = self.geometry.screen_info(p.screen_id) else {
            log::warn!("capture: no geometry for {:?}", p.screen_id);
            return Err(CaptureError::NotFound(self.node_id));
        };
        let (mut w, mut h) = (f64::from(info.width), f64::from(info.height));
        let unified = matches!(
            p.composite_type,
            CompositeType::UniRender | CompositeType::UniRenderMirror | CompositeType::UniRenderExpand
        );
        if !unified && info.rotation.is_portrait_swap() {
            core::mem::swap(&mut w, &mut h);
        }
        Ok(Rect::from_origin_size(Point::ORIGIN, Size::new(w, h)))
    }
}
