// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The drawing target interface and a CPU reference implementation.
//!
//! [`Canvas`] is the narrow slice of a 2D drawing API that capture needs: a
//! transform stack, solid fills and image blits. [`RasterCanvas`] implements
//! it with pixel-center sampling and nearest-neighbour image lookup,
//! straight into a [`PixelBuffer`].

use kurbo::{Affine, Point, Rect};
use vitrine_core::params::SurfaceBuffer;

use crate::pixel::{PixelBuffer, Rgba8};

/// A 2D drawing target.
pub trait Canvas {
    /// Width of the target in pixels.
    fn width(&self) -> u32;

    /// Height of the target in pixels.
    fn height(&self) -> u32;

    /// Pushes the current transform.
    fn save(&mut self);

    /// Pops the transform pushed by the matching [`save`](Self::save).
    fn restore(&mut self);

    /// Post-multiplies the current transform by `transform`.
    fn concat(&mut self, transform: Affine);

    /// The current user-to-device transform.
    fn transform(&self) -> Affine;

    /// Sets every pixel to `color`, ignoring the transform.
    fn clear(&mut self, color: Rgba8);

    /// Fills `rect` (user space) with `color`.
    fn fill_rect(&mut self, rect: Rect, color: Rgba8);

    /// Draws `image` stretched over `dst` (user space) at `opacity`.
    fn draw_image(&mut self, image: &SurfaceBuffer, dst: Rect, opacity: f32);
}

/// A [`Canvas`] that rasterizes into an owned [`PixelBuffer`].
#[derive(Debug)]
pub struct RasterCanvas {
    target: PixelBuffer,
    transform: Affine,
    stack: Vec<Affine>,
}

impl RasterCanvas {
    /// Wraps `target` with an identity transform.
    #[must_use]
    pub fn new(target: PixelBuffer) -> Self {
        Self {
            target,
            transform: Affine::IDENTITY,
            stack: Vec::new(),
        }
    }

    /// The pixels drawn so far.
    #[must_use]
    pub fn target(&self) -> &PixelBuffer {
        &self.target
    }

    /// Returns the target buffer.
    #[must_use]
    pub fn into_inner(self) -> PixelBuffer {
        self.target
    }

    /// Calls `f` with the user-space position of every pixel center that
    /// falls inside `rect`.
    fn for_each_covered(&mut self, rect: Rect, mut f: impl FnMut(Point, &mut Rgba8)) {
        if rect.is_zero_area() || self.transform.determinant() == 0.0 {
            return;
        }
        let inverse = self.transform.inverse();
        let bbox = self.transform.transform_rect_bbox(rect);
        let (w, h) = (self.target.width(), self.target.height());
        let (x0, x1) = pixel_span(bbox.x0, bbox.x1, w);
        let (y0, y1) = pixel_span(bbox.y0, bbox.y1, h);
        let stride = w as usize;
        let pixels = self.target.pixels_mut();
        for y in y0..y1 {
            for x in x0..x1 {
                let center = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                let user = inverse * center;
                if rect.contains(user) {
                    f(user, &mut pixels[y as usize * stride + x as usize]);
                }
            }
        }
    }
}

/// Range of pixel indices whose centers lie in `[lo, hi)`, clamped to
/// `0..max`.
#[expect(
    clippy::cast_possible_truncation,
    reason = "clamped to 0..=max before the cast"
)]
fn pixel_span(lo: f64, hi: f64, max: u32) -> (u32, u32) {
    let clamp = |v: f64| v.clamp(0.0, f64::from(max)) as u32;
    (clamp((lo - 0.5).ceil()), clamp((hi - 0.5).ceil()))
}

/// Nearest-neighbour texel of `image` for user-space `p` inside `dst`.
#[expect(
    clippy::cast_possible_truncation,
    reason = "texel coordinates are clamped to the image size"
)]
fn sample(image: &SurfaceBuffer, dst: Rect, p: Point) -> Rgba8 {
    let (iw, ih) = (image.width(), image.height());
    let u = ((p.x - dst.x0) / dst.width() * f64::from(iw)).floor();
    let v = ((p.y - dst.y0) / dst.height() * f64::from(ih)).floor();
    let u = u.clamp(0.0, f64::from(iw.saturating_sub(1))) as usize;
    let v = v.clamp(0.0, f64::from(ih.saturating_sub(1))) as usize;
    let i = (v * iw as usize + u) * SurfaceBuffer::BYTES_PER_PIXEL;
    match image.data().get(i..i + SurfaceBuffer::BYTES_PER_PIXEL) {
        Some(&[r, g, b, a]) => Rgba8::new(r, g, b, a),
        _ => Rgba8::TRANSPARENT,
    }
}

impl Canvas for RasterCanvas {
    fn width(&self) -> u32 {
        self.target.width()
    }

    fn height(&self) -> u32 {
        self.target.height()
    }

    fn save(&mut self) {
        self.stack.push(self.transform);
    }

    fn restore(&mut self) {
        if let Some(t) = self.stack.pop() {
            self.transform = t;
        } else {
            log::warn!("RasterCanvas::restore without matching save");
        }
    }

    fn concat(&mut self, transform: Affine) {
        self.transform *= transform;
    }

    fn transform(&self) -> Affine {
        self.transform
    }

    fn clear(&mut self, color: Rgba8) {
        self.target.fill(color);
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba8) {
        self.for_each_covered(rect, |_, px| *px = color.over(*px, 1.0));
    }

    fn draw_image(&mut self, image: &SurfaceBuffer, dst: Rect, opacity: f32) {
        if image.width() == 0 || image.height() == 0 || opacity <= 0.0 {
            return;
        }
        self.for_each_covered(dst, |p, px| {
            *px = sample(image, dst, p).over(*px, opacity);
        });
    }
}
