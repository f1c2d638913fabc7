// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::OnceLock;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use vitrine_capture::CaptureError;
use vitrine_capture::canvas::{Canvas, RasterCanvas};
use vitrine_capture::gpu::{GpuBackend, GpuSurface};
use vitrine_capture::pixel::PixelBuffer;
use vitrine_core::output::ColorGamut;

use crate::config::WgpuBackendConfig;

const BYTES_PER_PIXEL: u32 = 4;

// -- Backend --

struct Gpu {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

/// A [`GpuBackend`] owning one `wgpu` device.
///
/// The device is opened on the first surface request and shared by every
/// later one. A failed open is remembered; each later request fails the
/// same way without retrying.
pub struct WgpuBackend {
    config: WgpuBackendConfig,
    gpu: OnceLock<Result<Gpu, CaptureError>>,
}

impl core::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("config", &self.config)
            .field("opened", &self.gpu.get().map(Result::is_ok))
            .finish_non_exhaustive()
    }
}

impl WgpuBackend {
    /// Creates a backend that opens its device on first use.
    #[must_use]
    pub fn new(config: WgpuBackendConfig) -> Self {
        Self {
            config,
            gpu: OnceLock::new(),
        }
    }

    /// Wraps a device the caller already owns.
    #[must_use]
    pub fn from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        config: WgpuBackendConfig,
    ) -> Self {
        Self {
            config,
            gpu: OnceLock::from(Ok(Gpu { device, queue })),
        }
    }

    /// The shared device, opening it if needed.
    ///
    /// Fails with [`CaptureError::ResourceUnavailable`] when no adapter
    /// matches or the device cannot be created.
    pub fn device(&self) -> Result<&wgpu::Device, CaptureError> {
        self.gpu().map(|gpu| &gpu.device)
    }

    fn gpu(&self) -> Result<&Gpu, CaptureError> {
        self.gpu
            .get_or_init(|| pollster::block_on(open(&self.config)))
            .as_ref()
            .map_err(Clone::clone)
    }
}

async fn open(config: &WgpuBackendConfig) -> Result<Gpu, CaptureError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: config.backends,
        ..wgpu::InstanceDescriptor::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference,
            compatible_surface: None,
            force_fallback_adapter: config.force_fallback_adapter,
        })
        .await
        .map_err(|e| CaptureError::ResourceUnavailable(format!("no GPU adapter: {e}")))?;
    let info = adapter.get_info();
    log::info!("capture device: {} ({:?})", info.name, info.backend);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("vitrine capture device"),
            required_features: wgpu::Features::empty(),
            required_limits: config.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::Off,
        })
        .await
        .map_err(|e| CaptureError::ResourceUnavailable(format!("no GPU device: {e}")))?;
    Ok(Gpu { device, queue })
}

impl GpuBackend for WgpuBackend {
    fn create_surface(
        &self,
        width: u32,
        height: u32,
        color_space: ColorGamut,
    ) -> Result<Box<dyn GpuSurface>, CaptureError> {
        let gpu = self.gpu()?;
        let max = gpu.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(CaptureError::ResourceUnavailable(format!(
                "{width}x{height} surface exceeds the device limit of {max}"
            )));
        }
        Ok(Box::new(WgpuSurface::new(
            gpu,
            width,
            height,
            color_space,
            self.config.readback_timeout,
        )?))
    }
}

// -- Surface --

/// Offscreen texture plus its staging buffer.
///
/// Rows in the staging buffer are padded to
/// [`wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`].
pub struct WgpuSurface {
    device: wgpu::Device,
    queue: wgpu::Queue,
    texture: wgpu::Texture,
    staging: wgpu::Buffer,
    format: wgpu::TextureFormat,
    padded_bytes_per_row: u32,
    readback_timeout: Duration,
    canvas: RasterCanvas,
}

impl core::fmt::Debug for WgpuSurface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WgpuSurface")
            .field("width", &self.canvas.width())
            .field("height", &self.canvas.height())
            .field("format", &self.format)
            .field("padded_bytes_per_row", &self.padded_bytes_per_row)
            .finish_non_exhaustive()
    }
}

impl WgpuSurface {
    fn new(
        gpu: &Gpu,
        width: u32,
        height: u32,
        color_space: ColorGamut,
        readback_timeout: Duration,
    ) -> Result<Self, CaptureError> {
        let mut target = PixelBuffer::new(width, height)?;
        target.set_color_space(color_space);
        let canvas = RasterCanvas::new(target);
        let format = texture_format(color_space);

        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("vitrine capture target"),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let padded_bytes_per_row = padded_row(width);
        let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vitrine capture staging"),
            size: u64::from(padded_bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device: gpu.device.clone(),
            queue: gpu.queue.clone(),
            texture,
            staging,
            format,
            padded_bytes_per_row,
            readback_timeout,
            canvas,
        })
    }

    fn upload_and_copy(&self) {
        let (width, height) = (self.canvas.width(), self.canvas.height());
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            self.canvas.target().as_bytes(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * BYTES_PER_PIXEL),
                rows_per_image: Some(height),
            },
            extent(width, height),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("vitrine capture readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            extent(width, height),
        );
        let _ = self.queue.submit(Some(encoder.finish()));
    }

    /// Maps the staging buffer, polling the device until the map lands or
    /// the timeout passes.
    fn map_staging(&self) -> Result<(), CaptureError> {
        let (sender, receiver) = mpsc::channel();
        self.staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |res| drop(sender.send(res)));

        let deadline = Instant::now() + self.readback_timeout;
        loop {
            self.device
                .poll(wgpu::PollType::Poll)
                .map_err(|e| CaptureError::ReadbackFailure(format!("device poll: {e}")))?;
            match receiver.recv_timeout(Duration::from_millis(1)) {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(e)) => {
                    return Err(CaptureError::ReadbackFailure(format!("buffer map: {e}")));
                }
                Err(RecvTimeoutError::Timeout) if Instant::now() < deadline => {}
                Err(_) => {
                    return Err(CaptureError::ReadbackFailure(
                        "staging buffer did not map in time".into(),
                    ));
                }
            }
        }
    }
}

impl GpuSurface for WgpuSurface {
    fn canvas(&mut self) -> &mut dyn Canvas {
        &mut self.canvas
    }

    fn read_pixels(&mut self, dst: &mut PixelBuffer) -> Result<(), CaptureError> {
        let (width, height) = (self.canvas.width(), self.canvas.height());
        if dst.width() != width || dst.height() != height {
            return Err(CaptureError::ReadbackFailure(format!(
                "destination is {}x{}, surface is {width}x{height}",
                dst.width(),
                dst.height()
            )));
        }

        self.upload_and_copy();
        self.map_staging()?;

        let row_bytes = (width * BYTES_PER_PIXEL) as usize;
        let padded = self.padded_bytes_per_row as usize;
        {
            let mapped = self.staging.slice(..).get_mapped_range();
            for (dst_row, src_row) in dst
                .as_bytes_mut()
                .chunks_exact_mut(row_bytes)
                .zip(mapped.chunks(padded))
            {
                dst_row.copy_from_slice(&src_row[..row_bytes]);
            }
        }
        self.staging.unmap();
        Ok(())
    }
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

/// Texture format for a surface tagged `color_space`.
///
/// Both formats hold the same bytes; the copy and readback never convert.
fn texture_format(color_space: ColorGamut) -> wgpu::TextureFormat {
    match color_space {
        ColorGamut::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        ColorGamut::DisplayP3 | ColorGamut::Bt2020 => wgpu::TextureFormat::Rgba8Unorm,
    }
}

fn padded_row(width: u32) -> u32 {
    (width * BYTES_PER_PIXEL).next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
}
