// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Capture request parameters.

use kurbo::{Rect, Size};
use vitrine_core::output::ColorGamut;

use crate::error::CaptureError;
use crate::pixel::Rgba8;

/// Parameters of one capture request, echoed back to the callback.
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceCaptureConfig {
    /// Horizontal scale applied to the source; must be positive.
    pub scale_x: f64,
    /// Vertical scale applied to the source; must be positive.
    pub scale_y: f64,
    /// Allocate the destination from the shared buffer pool instead of the
    /// heap.
    pub use_dma: bool,
    /// Region of the source to capture, in the source's local space.
    ///
    /// Ignored unless valid and non-empty.
    pub sub_rect: Option<Rect>,
    /// Color space the caller wants the pixels in.
    ///
    /// Tags the destination buffer and selects the GPU surface format.
    /// Pixels are not converted.
    pub color_space: ColorGamut,
}

impl Default for SurfaceCaptureConfig {
    fn default() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            use_dma: false,
            sub_rect: None,
            color_space: ColorGamut::Srgb,
        }
    }
}

impl SurfaceCaptureConfig {
    /// Checks that both scale factors are finite and strictly positive.
    pub fn validate(&self) -> Result<(), CaptureError> {
        let ok = |s: f64| s.is_finite() && s > 0.0;
        if ok(self.scale_x) && ok(self.scale_y) {
            Ok(())
        } else {
            Err(CaptureError::InvalidArgument {
                scale_x: self.scale_x,
                scale_y: self.scale_y,
            })
        }
    }

    /// Returns the sub-rectangle if it is usable.
    #[must_use]
    pub fn valid_sub_rect(&self) -> Option<Rect> {
        self.sub_rect.filter(|r| is_valid_rect(*r))
    }

    /// Destination size for a source of `size`: each side scaled and
    /// rounded up.
    #[must_use]
    pub fn destination_size(&self, size: Size) -> (u32, u32) {
        (
            scaled_extent(size.width, self.scale_x),
            scaled_extent(size.height, self.scale_y),
        )
    }
}

/// Capture-wide behavior that is not part of a single request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureOptions {
    /// Color filled over the footprint of redacted surfaces.
    pub redaction_color: Rgba8,
    /// Color the destination is cleared to before drawing.
    pub clear_color: Rgba8,
    /// Largest destination, in pixels, a request may allocate.
    pub max_pixels: u64,
}

impl CaptureOptions {
    /// Default destination limit: one 16384 × 16384 image.
    pub const DEFAULT_MAX_PIXELS: u64 = 16384 * 16384;
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            redaction_color: Rgba8::WHITE,
            clear_color: Rgba8::TRANSPARENT,
            max_pixels: Self::DEFAULT_MAX_PIXELS,
        }
    }
}

pub(crate) fn is_valid_rect(r: Rect) -> bool {
    r.is_finite() && r.width() > 0.0 && r.height() > 0.0
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "clamped to the u32 range before the cast"
)]
fn scaled_extent(extent: f64, scale: f64) -> u32 {
    let v = (extent * scale).ceil();
    if v.is_nan() || v <= 0.0 {
        0
    } else {
        v.min(f64::from(u32::MAX)) as u32
    }
}
