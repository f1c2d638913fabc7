// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Producer and consumer on separate threads, joined by the frame pipeline.

use std::sync::{Arc, Mutex};
use std::thread;

use kurbo::{Affine, Rect};
use vitrine_core::command;
use vitrine_core::config::SceneConfig;
use vitrine_core::drawable::{DrawableTree, NodeRegistry};
use vitrine_core::hooks::CallbackSlots;
use vitrine_core::node::{LogicalDisplayConfig, NodeId, SceneTree, ScreenNodeConfig};
use vitrine_core::output::{ScreenId, ScreenRotation};
use vitrine_core::params::SurfaceBuffer;
use vitrine_core::sync::frame_pipeline;

const FRAMES: u64 = 16;

fn nid(n: u32) -> NodeId {
    NodeId::from_parts(42, n)
}

#[test]
fn frames_cross_threads_in_order() {
    let hooks = Arc::new(CallbackSlots::new());
    let released = Arc::new(Mutex::new(0_usize));
    let sink = Arc::clone(&released);
    assert!(
        hooks.set_buffer_release_hook(move |_, _| *sink.lock().unwrap() += 1),
        "hook slot is empty"
    );

    let (sender, receiver) = frame_pipeline();
    let producer_hooks = Arc::clone(&hooks);
    let producer = thread::spawn(move || {
        let mut tree = SceneTree::new(SceneConfig::default(), producer_hooks);
        assert!(tree.create_screen(
            nid(1),
            ScreenNodeConfig {
                screen_id: ScreenId(0),
                is_mirrored: false,
            },
        ));
        assert!(command::create(
            &mut tree,
            nid(2),
            LogicalDisplayConfig {
                screen_id: ScreenId(0),
                ..LogicalDisplayConfig::default()
            },
        ));
        assert!(tree.create_surface(nid(3)));
        assert!(tree.add_child(nid(2), nid(3)));
        assert!(tree.set_surface_bounds(nid(3), Rect::new(0.0, 0.0, 4.0, 4.0)));

        for frame in 0..FRAMES {
            #[expect(clippy::cast_possible_truncation, reason = "frame counts are tiny")]
            let shade = frame as u8;
            assert!(tree.set_surface_buffer(
                nid(3),
                Some(SurfaceBuffer::solid(4, 4, [shade, 0, 0, 255])),
            ));
            let dx = frame as f64;
            assert!(tree.set_transform(nid(3), Affine::translate((dx, 0.0))));
            if frame == FRAMES / 2 {
                assert!(command::set_screen_rotation(
                    &mut tree,
                    nid(2),
                    ScreenRotation::Rotation90
                ));
            }
            assert!(sender.submit(tree.sync()), "consumer alive");
        }
        assert!(tree.destroy(nid(3)));
        assert!(sender.submit(tree.sync()), "consumer alive");
    });

    let mut drawables = DrawableTree::new(hooks);
    let mut last_frame = 0;
    while let Some(batch) = receiver.recv() {
        assert!(batch.frame_index > last_frame, "frames arrive in order");
        last_frame = batch.frame_index;
        let _ = drawables.apply(batch);

        if let Some(surface) = drawables.get(nid(3)) {
            let expected = (last_frame - 1) as f64;
            assert_eq!(
                surface.abs_transform().translation().x,
                expected,
                "surface transform matches its frame"
            );
        }
        let _ = drawables.collect_garbage();
    }
    producer.join().expect("producer thread");

    assert_eq!(last_frame, FRAMES + 1);
    assert_eq!(drawables.screens(), [nid(1)]);
    assert!(drawables.get(nid(3)).is_none(), "destroyed surface is gone");
    let display = drawables.get(nid(2)).expect("display synced");
    assert_eq!(
        display.as_display().map(|d| d.rotation),
        Some(ScreenRotation::Rotation90)
    );
    // Every buffer but the last is released on replacement, and the last
    // one when its surface is destroyed.
    assert_eq!(*released.lock().unwrap() as u64, FRAMES);
}
