// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON snapshots of the scene.
//!
//! [`scene_json`] describes the producer's [`SceneTree`], [`drawables_json`]
//! the consumer's synced [`DrawableTree`]. Both nest children under their
//! parents, starting from the screens. The output is meant for eyeballing
//! and diffing, not for loading back.

use std::io::{self, Write};

use kurbo::{Affine, Rect};
use serde_json::{Value, json};

use vitrine_core::damage::DamageRegion;
use vitrine_core::drawable::{DrawableTree, NodeRegistry};
use vitrine_core::node::{NodeId, NodeKind, SceneTree};
use vitrine_core::params::NodeParams;

fn id_json(id: NodeId) -> Value {
    json!(format!("{}:{}", id.pid(), id.0 & 0xFFFF_FFFF))
}

fn rect_json(r: Rect) -> Value {
    json!([r.x0, r.y0, r.x1, r.y1])
}

fn affine_json(t: Affine) -> Value {
    json!(t.as_coeffs())
}

fn damage_json(d: &DamageRegion) -> Value {
    match d {
        DamageRegion::Full => json!("full"),
        DamageRegion::None => json!("none"),
        DamageRegion::Rects(rects) => {
            Value::Array(rects.iter().copied().map(rect_json).collect())
        }
    }
}

/// Describes every node of `tree`, nested under its screens.
///
/// Nodes not reachable from a screen are left out.
#[must_use]
pub fn scene_json(tree: &SceneTree) -> Value {
    let screens: Vec<Value> = tree.screens().map(|id| scene_node(tree, id)).collect();
    json!({
        "frame_index": tree.frame_index(),
        "screens": screens,
    })
}

fn scene_node(tree: &SceneTree, id: NodeId) -> Value {
    let mut node = match tree.node(id) {
        Some(NodeKind::Screen(s)) => json!({
            "kind": "screen",
            "screen_id": s.screen_id().0,
            "mirror_source": s.mirror_source().map(id_json),
            "has_mirror_screen": s.has_mirror_screen(),
            "composite_type": format!("{:?}", s.composite_type()),
            "force_close_hdr": s.force_close_hdr(),
        }),
        Some(NodeKind::Display(d)) => json!({
            "kind": "display",
            "screen_id": d.screen_id().0,
            "waiting_attach": d.is_waiting_attach(),
            "content_rect": rect_json(d.content_rect()),
            "rotation": d.rotation().degrees(),
            "mirror_source": d.mirror_source().map(id_json),
            "security_display": d.security_display(),
        }),
        Some(NodeKind::Surface(s)) => json!({
            "kind": "surface",
            "bounds": rect_json(s.bounds()),
            "alpha": s.alpha(),
            "visible": s.visible(),
            "has_buffer": s.buffer().is_some(),
            "special_layers": format!("{:?}", s.special_layers()),
        }),
        None => json!({ "kind": "missing" }),
    };
    node["id"] = id_json(id);
    if let Some(t) = tree.abs_transform(id) {
        node["abs_transform"] = affine_json(t);
    }
    let children: Vec<Value> = tree.children(id).map(|c| scene_node(tree, c)).collect();
    node["children"] = Value::Array(children);
    node
}

/// Describes the synced drawables reachable from the screens of `tree`.
#[must_use]
pub fn drawables_json(tree: &DrawableTree) -> Value {
    let screens: Vec<Value> = tree
        .screens()
        .into_iter()
        .map(|id| drawable_node(tree, id))
        .collect();
    json!({
        "frame_index": tree.frame_index(),
        "live": tree.len(),
        "graveyard": tree.graveyard_len(),
        "screens": screens,
    })
}

fn drawable_node(tree: &DrawableTree, id: NodeId) -> Value {
    let Some(d) = tree.get(id) else {
        return json!({ "id": id_json(id), "kind": "unsynced" });
    };
    let mut node = match d.params() {
        NodeParams::Screen(p) => json!({
            "kind": "screen",
            "screen_id": p.screen_id.0,
            "damage": damage_json(&p.damage),
            "contains_boot_animation": p.contains_boot_animation,
        }),
        NodeParams::Display(p) => json!({
            "kind": "display",
            "rotation": p.rotation.degrees(),
            "fixed_size": [p.fixed_width, p.fixed_height],
            "security_layers": p
                .security_layer_ids
                .iter()
                .copied()
                .map(id_json)
                .collect::<Vec<_>>(),
        }),
        NodeParams::Surface(p) => json!({
            "kind": "surface",
            "bounds": rect_json(p.bounds),
            "should_paint": p.should_paint,
        }),
    };
    node["id"] = id_json(id);
    node["frame_index"] = json!(d.frame_index());
    node["abs_transform"] = affine_json(d.abs_transform());
    let children: Vec<Value> = d
        .children()
        .iter()
        .map(|&c| drawable_node(tree, c))
        .collect();
    node["children"] = Value::Array(children);
    node
}

/// Writes `value` as pretty-printed JSON.
pub fn write_pretty(value: &Value, writer: &mut dyn Write) -> io::Result<()> {
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_core::node::{LogicalDisplayConfig, ScreenNodeConfig};
    use vitrine_core::output::ScreenId;

    fn nid(n: u32) -> NodeId {
        NodeId::from_parts(7, n)
    }

    fn tree() -> SceneTree {
        let mut tree = SceneTree::default();
        assert!(tree.create_screen(
            nid(1),
            ScreenNodeConfig {
                screen_id: ScreenId(5),
                is_mirrored: false,
            },
        ));
        assert!(tree.create_display(
            nid(2),
            LogicalDisplayConfig {
                screen_id: ScreenId(5),
                ..LogicalDisplayConfig::default()
            },
        ));
        assert!(tree.create_surface(nid(3)));
        assert!(tree.add_child(nid(2), nid(3)));
        tree
    }

    #[test]
    fn scene_nests_children() {
        let v = scene_json(&tree());
        let screen = &v["screens"][0];
        assert_eq!(screen["kind"], "screen");
        assert_eq!(screen["id"], "7:1");
        assert_eq!(screen["children"][0]["kind"], "display");
        assert_eq!(screen["children"][0]["children"][0]["kind"], "surface");
    }

    #[test]
    fn drawables_follow_sync() {
        let mut scene = tree();
        let mut drawables = DrawableTree::default();
        let _ = drawables.apply(scene.sync());
        let v = drawables_json(&drawables);
        assert_eq!(v["live"], 3);
        assert_eq!(v["screens"][0]["children"][0]["children"][0]["id"], "7:3");

        let mut out = Vec::new();
        write_pretty(&v, &mut out).unwrap();
        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, v);
    }
}
