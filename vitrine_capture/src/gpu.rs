// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GPU-backed capture targets.
//!
//! When a [`GpuBackend`] is supplied, a capture draws into a
//! [`GpuSurface`] and reads the result back into the destination buffer.
//! Without one, the capture draws straight into the destination.

use vitrine_core::output::ColorGamut;

use crate::canvas::Canvas;
use crate::error::CaptureError;
use crate::pixel::PixelBuffer;

/// Creates offscreen drawing surfaces on a GPU.
///
/// Backends share their device across requests; creating a surface must not
/// touch any state outside the new surface.
pub trait GpuBackend {
    /// Creates a `width` × `height` offscreen surface whose format suits
    /// `color_space`.
    ///
    /// Failure maps to [`CaptureError::ResourceUnavailable`].
    fn create_surface(
        &self,
        width: u32,
        height: u32,
        color_space: ColorGamut,
    ) -> Result<Box<dyn GpuSurface>, CaptureError>;
}

/// An offscreen surface created by a [`GpuBackend`].
pub trait GpuSurface {
    /// The canvas drawing into this surface.
    fn canvas(&mut self) -> &mut dyn Canvas;

    /// Copies the surface's pixels into `dst`, which has the surface's size.
    ///
    /// Failure maps to [`CaptureError::ReadbackFailure`].
    fn read_pixels(&mut self, dst: &mut PixelBuffer) -> Result<(), CaptureError>;
}
