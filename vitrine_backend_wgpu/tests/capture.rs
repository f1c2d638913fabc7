// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A display capture through the GPU matches the same capture on the CPU.

use kurbo::{Affine, Rect};
use vitrine_backend_wgpu::{WgpuBackend, WgpuBackendConfig};
use vitrine_capture::engine::RasterDrawingEngine;
use vitrine_capture::{PixelBuffer, Rgba8, SurfaceCaptureConfig, SurfaceCaptureTask};
use vitrine_core::drawable::DrawableTree;
use vitrine_core::node::{LogicalDisplayConfig, NodeId, SceneTree, ScreenNodeConfig};
use vitrine_core::output::{
    ColorGamut, ScreenId, ScreenInfo, ScreenRotation, StaticScreenGeometry,
};
use vitrine_core::params::SurfaceBuffer;
use vitrine_core::special_layer::SpecialLayers;

fn nid(n: u32) -> NodeId {
    NodeId::from_parts(3, n)
}

fn add_surface(tree: &mut SceneTree, id: u32, at: (f64, f64), rgba: [u8; 4]) {
    assert!(tree.create_surface(nid(id)), "fresh id");
    assert!(tree.add_child(nid(10), nid(id)), "display exists");
    assert!(tree.set_transform(nid(id), Affine::translate(at)), "surface exists");
    assert!(
        tree.set_surface_bounds(nid(id), Rect::new(0.0, 0.0, 16.0, 16.0)),
        "surface exists"
    );
    assert!(
        tree.set_surface_buffer(nid(id), Some(SurfaceBuffer::solid(2, 2, rgba))),
        "surface exists"
    );
}

fn scene() -> (DrawableTree, StaticScreenGeometry) {
    let mut tree = SceneTree::default();
    assert!(tree.create_screen(
        nid(1),
        ScreenNodeConfig {
            screen_id: ScreenId(4),
            is_mirrored: false,
        },
    ));
    assert!(tree.create_display(
        nid(10),
        LogicalDisplayConfig {
            screen_id: ScreenId(4),
            ..LogicalDisplayConfig::default()
        },
    ));
    add_surface(&mut tree, 20, (4.0, 4.0), [200, 40, 40, 255]);
    add_surface(&mut tree, 21, (30.0, 10.0), [40, 40, 200, 255]);
    assert!(tree.set_special_layers(nid(21), SpecialLayers::SKIP));

    let mut drawables = DrawableTree::default();
    let _ = drawables.apply(tree.sync());
    let geometry = StaticScreenGeometry::new().with_screen(
        ScreenId(4),
        ScreenInfo {
            width: 50,
            height: 30,
            rotation: ScreenRotation::Rotation0,
            color_gamut: ColorGamut::Srgb,
        },
    );
    (drawables, geometry)
}

fn capture(
    drawables: &DrawableTree,
    geometry: &StaticScreenGeometry,
    gpu: Option<&WgpuBackend>,
) -> PixelBuffer {
    let config = SurfaceCaptureConfig {
        scale_x: 1.5,
        scale_y: 1.5,
        ..SurfaceCaptureConfig::default()
    };
    let task = SurfaceCaptureTask::new(nid(10), config, drawables, geometry, &RasterDrawingEngine);
    let task = match gpu {
        Some(backend) => task.with_gpu(backend),
        None => task,
    };
    task.try_run().expect("capture succeeds")
}

#[test]
fn gpu_readback_matches_raster() {
    let backend = WgpuBackend::new(WgpuBackendConfig::default());
    if let Err(e) = backend.device() {
        eprintln!("skipping: {e}");
        return;
    }
    let (drawables, geometry) = scene();

    let cpu = capture(&drawables, &geometry, None);
    let gpu = capture(&drawables, &geometry, Some(&backend));

    assert_eq!((gpu.width(), gpu.height()), (75, 45), "ceil(50 * 1.5) x ceil(30 * 1.5)");
    assert_eq!(gpu.pixels(), cpu.pixels(), "GPU and CPU captures differ");
    assert_eq!(
        gpu.get(50, 20),
        Some(Rgba8::WHITE),
        "SKIP surface is redacted"
    );
}
