// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! `wgpu` backend for `vitrine_capture`.
//!
//! [`WgpuBackend`] implements
//! [`GpuBackend`](vitrine_capture::gpu::GpuBackend) on top of a single
//! `wgpu` device, opened on the first capture. Each capture gets its own
//! offscreen texture and staging buffer; the device and queue are shared
//! read-only between requests.
//!
//! ```text
//!   RasterCanvas ──write_texture──► texture ──copy_texture_to_buffer──►
//!   staging buffer ──map_async──► rows (padding stripped) ──► PixelBuffer
//! ```
//!
//! All drawing happens on the CPU [`RasterCanvas`](vitrine_capture::canvas::RasterCanvas).
//! The GPU only receives the finished pixels and performs the copy and the
//! readback.

mod config;
mod surface;

pub use config::WgpuBackendConfig;
pub use surface::{WgpuBackend, WgpuSurface};
