// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-shot capture of a synced surface or logical display.
//!
//! `vitrine_capture` rasterizes a subtree of a
//! [`DrawableTree`](vitrine_core::drawable::DrawableTree) (or any other
//! [`NodeRegistry`](vitrine_core::drawable::NodeRegistry)) into a
//! caller-visible [`PixelBuffer`](pixel::PixelBuffer), redacting every
//! surface tagged [`SECURITY`](vitrine_core::special_layer::SpecialLayers::SECURITY)
//! or [`SKIP`](vitrine_core::special_layer::SpecialLayers::SKIP).
//!
//! ```text
//!   SurfaceCaptureTask::run()
//!       │  validate scale ─► resolve node ─► size destination
//!       ▼
//!   PixelBufferAllocator ──► destination
//!       │
//!       ├─ GpuBackend ──► GpuSurface::canvas() ──► read_pixels(destination)
//!       └─ RasterCanvas(destination)
//!                │
//!                ▼
//!   CaptureVisitor ──► DrawingEngine / redaction fill
//!       │
//!       ▼
//!   callback(node, config, buffer)   exactly once, success only
//! ```
//!
//! The drawing engine, canvas and GPU backend are interfaces; this crate
//! ships CPU reference implementations ([`RasterCanvas`](canvas::RasterCanvas),
//! [`RasterDrawingEngine`](engine::RasterDrawingEngine)). A `wgpu` backend
//! lives in `vitrine_backend_wgpu`.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables capture trace events in
//!   `vitrine_core`.

pub mod canvas;
pub mod config;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod pixel;
pub mod task;
pub mod visitor;

pub use config::{CaptureOptions, SurfaceCaptureConfig};
pub use error::CaptureError;
pub use pixel::{PixelBuffer, Rgba8};
pub use task::SurfaceCaptureTask;
