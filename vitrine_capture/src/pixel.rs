// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Destination pixel buffers and their allocators.
//!
//! A [`PixelBuffer`] is the caller-visible result of a capture. Its storage
//! is a boxed slice that never reallocates, so its address stays stable for
//! the lifetime of the buffer and can be handed to a GPU readback.

use std::fmt;
use std::sync::{Arc, Mutex};

use bytemuck::{Pod, Zeroable};
use vitrine_core::output::ColorGamut;

use crate::error::CaptureError;

/// One straight-alpha RGBA8 pixel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Rgba8 {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Rgba8 {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    /// Opaque black.
    pub const BLACK: Self = Self::new(0, 0, 0, 255);
    /// Opaque white.
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    /// Creates a pixel from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Composites `self` over `dst` after scaling its alpha by `opacity`.
    #[must_use]
    pub fn over(self, dst: Self, opacity: f32) -> Self {
        let sa = f32::from(self.a) / 255.0 * opacity.clamp(0.0, 1.0);
        if sa >= 1.0 {
            return self;
        }
        if sa <= 0.0 {
            return dst;
        }
        let da = f32::from(dst.a) / 255.0;
        let out_a = sa + da * (1.0 - sa);
        let channel = |s: u8, d: u8| {
            let v = (f32::from(s) * sa + f32::from(d) * da * (1.0 - sa)) / out_a;
            unit_to_u8(v / 255.0)
        };
        Self {
            r: channel(self.r, dst.r),
            g: channel(self.g, dst.g),
            b: channel(self.b, dst.b),
            a: unit_to_u8(out_a),
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "value is clamped to 0..=255 before the cast"
)]
fn unit_to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Where a buffer's storage came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocationKind {
    /// Process heap.
    Heap,
    /// A pool shared across capture requests.
    Shared,
}

/// A width × height grid of pixels, rows top to bottom.
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Box<[Rgba8]>,
    color_space: ColorGamut,
    pool: Option<Arc<PoolInner>>,
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("kind", &self.kind())
            .field("color_space", &self.color_space)
            .finish_non_exhaustive()
    }
}

impl PixelBuffer {
    fn zeroed(len: usize) -> Result<Box<[Rgba8]>, CaptureError> {
        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len).map_err(|e| {
            CaptureError::ResourceUnavailable(format!("cannot allocate {len} pixels: {e}"))
        })?;
        pixels.resize(len, Rgba8::TRANSPARENT);
        Ok(pixels.into_boxed_slice())
    }

    /// Allocates a transparent buffer on the heap.
    pub fn new(width: u32, height: u32) -> Result<Self, CaptureError> {
        Ok(Self {
            width,
            height,
            pixels: Self::zeroed(pixel_count(width, height)?)?,
            color_space: ColorGamut::Srgb,
            pool: None,
        })
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Color space the pixels are tagged with.
    #[must_use]
    pub fn color_space(&self) -> ColorGamut {
        self.color_space
    }

    /// Tags the pixels with a color space. The pixels are not converted.
    pub fn set_color_space(&mut self, color_space: ColorGamut) {
        self.color_space = color_space;
    }

    /// Where the storage came from.
    #[must_use]
    pub fn kind(&self) -> AllocationKind {
        if self.pool.is_some() {
            AllocationKind::Shared
        } else {
            AllocationKind::Heap
        }
    }

    /// All pixels, row-major.
    #[must_use]
    pub fn pixels(&self) -> &[Rgba8] {
        &self.pixels
    }

    /// All pixels, row-major, mutably.
    pub fn pixels_mut(&mut self) -> &mut [Rgba8] {
        &mut self.pixels
    }

    /// The pixels as tightly packed RGBA bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// The pixels as tightly packed RGBA bytes, mutably.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.pixels)
    }

    /// Returns the pixel at (`x`, `y`), if in bounds.
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<Rgba8> {
        (x < self.width && y < self.height)
            .then(|| self.pixels[y as usize * self.width as usize + x as usize])
    }

    /// Sets every pixel to `color`.
    pub fn fill(&mut self, color: Rgba8) {
        self.pixels.fill(color);
    }
}

impl Drop for PixelBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.recycle(core::mem::take(&mut self.pixels));
        }
    }
}

fn pixel_count(width: u32, height: u32) -> Result<usize, CaptureError> {
    if width == 0 || height == 0 {
        return Err(CaptureError::ResourceUnavailable(format!(
            "empty destination {width}x{height}"
        )));
    }
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| CaptureError::ResourceUnavailable(format!("{width}x{height} overflows")))
}

/// Creates destination buffers for capture requests.
pub trait PixelBufferAllocator {
    /// Allocates a transparent `width` × `height` buffer.
    fn allocate(&self, width: u32, height: u32) -> Result<PixelBuffer, CaptureError>;
}

/// Allocates every buffer on the heap.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapAllocator;

impl PixelBufferAllocator for HeapAllocator {
    fn allocate(&self, width: u32, height: u32) -> Result<PixelBuffer, CaptureError> {
        PixelBuffer::new(width, height)
    }
}

#[derive(Debug)]
struct PoolInner {
    budget: usize,
    state: Mutex<PoolState>,
}

#[derive(Debug, Default)]
struct PoolState {
    in_use: usize,
    free: Vec<Box<[Rgba8]>>,
}

impl PoolInner {
    fn recycle(&self, pixels: Box<[Rgba8]>) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.in_use = state.in_use.saturating_sub(pixels.len());
        state.free.push(pixels);
    }
}

/// A bounded pool of buffers shared across capture requests.
///
/// Buffers return to the pool when dropped and are reused by later requests
/// of the same size. Requests that would exceed the pool's pixel budget fail
/// with [`CaptureError::ResourceUnavailable`].
#[derive(Clone, Debug)]
pub struct SharedPoolAllocator {
    inner: Arc<PoolInner>,
}

impl SharedPoolAllocator {
    /// Creates a pool holding at most `budget` pixels in live buffers.
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                budget,
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// Pixels currently handed out.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.inner.state.lock().map_or(0, |s| s.in_use)
    }
}

impl PixelBufferAllocator for SharedPoolAllocator {
    fn allocate(&self, width: u32, height: u32) -> Result<PixelBuffer, CaptureError> {
        let len = pixel_count(width, height)?;
        let mut state = self
            .inner
            .state
            .lock()
            .map_err(|_| CaptureError::ResourceUnavailable("buffer pool poisoned".into()))?;
        if state.in_use.saturating_add(len) > self.inner.budget {
            return Err(CaptureError::ResourceUnavailable(format!(
                "buffer pool exhausted: {} + {len} > {}",
                state.in_use, self.inner.budget
            )));
        }
        let pixels = match state.free.iter().position(|b| b.len() == len) {
            Some(i) => {
                let mut reused = state.free.swap_remove(i);
                reused.fill(Rgba8::TRANSPARENT);
                reused
            }
            None => PixelBuffer::zeroed(len)?,
        };
        state.in_use += len;
        Ok(PixelBuffer {
            width,
            height,
            pixels,
            color_space: ColorGamut::Srgb,
            pool: Some(Arc::clone(&self.inner)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_buffer_is_refused() {
        assert!(matches!(
            HeapAllocator.allocate(0, 10),
            Err(CaptureError::ResourceUnavailable(_))
        ));
    }

    #[test]
    fn unaddressable_buffer_is_refused() {
        assert!(matches!(
            HeapAllocator.allocate(u32::MAX, u32::MAX),
            Err(CaptureError::ResourceUnavailable(_))
        ));
        let pool = SharedPoolAllocator::new(usize::MAX);
        assert!(matches!(
            pool.allocate(u32::MAX, u32::MAX),
            Err(CaptureError::ResourceUnavailable(_))
        ));
        assert_eq!(pool.in_use(), 0, "failed request holds nothing");
    }

    #[test]
    fn byte_view_matches_pixels() {
        let mut buf = HeapAllocator.allocate(2, 1).expect("allocates");
        buf.pixels_mut()[1] = Rgba8::new(1, 2, 3, 4);
        assert_eq!(buf.as_bytes(), [0, 0, 0, 0, 1, 2, 3, 4]);
        assert_eq!(buf.get(1, 0), Some(Rgba8::new(1, 2, 3, 4)));
        assert_eq!(buf.get(2, 0), None);
    }

    #[test]
    fn pool_recycles_and_enforces_budget() {
        let pool = SharedPoolAllocator::new(16);
        let a = pool.allocate(4, 2).expect("fits");
        assert_eq!(a.kind(), AllocationKind::Shared);
        let b = pool.allocate(4, 2).expect("fits");
        assert_eq!(pool.in_use(), 16);
        assert!(pool.allocate(1, 1).is_err(), "budget exhausted");
        let addr = a.pixels().as_ptr();
        drop(a);
        drop(b);
        assert_eq!(pool.in_use(), 0);
        let c = pool.allocate(2, 4).expect("reuses");
        assert_eq!(pool.in_use(), 8);
        assert!(
            c.pixels().iter().all(|p| *p == Rgba8::TRANSPARENT),
            "reused storage is cleared"
        );
        assert!(
            core::ptr::eq(c.pixels().as_ptr(), addr),
            "storage comes from the free list"
        );
    }

    #[test]
    fn over_blends_straight_alpha() {
        let red = Rgba8::new(255, 0, 0, 255);
        let blue = Rgba8::new(0, 0, 255, 255);
        assert_eq!(red.over(blue, 1.0), red);
        assert_eq!(red.over(blue, 0.0), blue);
        let half = red.over(blue, 0.5);
        assert_eq!((half.r, half.b, half.a), (128, 128, 255));
        assert_eq!(red.over(Rgba8::TRANSPARENT, 0.5).r, 255);
    }
}
