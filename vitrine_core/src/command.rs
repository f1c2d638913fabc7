// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fire-and-forget display commands.
//!
//! Clients do not hold references into the scene; they address logical
//! displays by [`NodeId`] and send one of the commands below. Each command
//! looks the display up and applies the change, or logs and does nothing if
//! the id does not name a logical display. The `bool` results report whether
//! the command took effect; callers are free to ignore them.
//!
//! Commands can be invoked directly, or queued as [`DisplayCommand`] values
//! and replayed with [`DisplayCommand::apply`].

use kurbo::Rect;

use crate::node::{DisplayCommandTarget, LogicalDisplayConfig, NodeId, SceneTree};
use crate::output::{ScreenId, ScreenRotation};

fn with_display(
    tree: &mut SceneTree,
    id: NodeId,
    command: &str,
    f: impl FnOnce(&mut dyn DisplayCommandTarget),
) -> bool {
    match tree.display_mut(id) {
        Some(display) => {
            f(display);
            true
        }
        None => {
            log::warn!("{command}: {id:?} is not a logical display");
            false
        }
    }
}

/// Creates a logical display and attaches it to its screen.
pub fn create(tree: &mut SceneTree, id: NodeId, config: LogicalDisplayConfig) -> bool {
    tree.create_display(id, config)
}

/// Reassigns a display to another screen.
pub fn set_screen_id(tree: &mut SceneTree, id: NodeId, screen_id: ScreenId) -> bool {
    tree.set_screen_id(id, screen_id)
}

/// Sets the content rectangle shown by a display.
pub fn set_display_content_rect(tree: &mut SceneTree, id: NodeId, rect: Rect) -> bool {
    with_display(tree, id, "set_display_content_rect", |d| {
        d.set_content_rect(rect);
    })
}

/// Sets the physical rotation of a display.
pub fn set_screen_rotation(tree: &mut SceneTree, id: NodeId, rotation: ScreenRotation) -> bool {
    with_display(tree, id, "set_screen_rotation", |d| {
        d.set_screen_rotation(rotation);
    })
}

/// Marks a display as a security display.
pub fn set_security_display(tree: &mut SceneTree, id: NodeId, enabled: bool) -> bool {
    with_display(tree, id, "set_security_display", |d| {
        d.set_security_display(enabled);
    })
}

/// Applies a mirror/extend display mode.
pub fn set_display_mode(tree: &mut SceneTree, id: NodeId, mode: LogicalDisplayConfig) -> bool {
    tree.set_display_mode(id, mode)
}

/// Flags a display as showing the boot animation.
///
/// The owning screen picks the flag up on the next sync.
pub fn set_boot_animation(tree: &mut SceneTree, id: NodeId, enabled: bool) -> bool {
    with_display(tree, id, "set_boot_animation", |d| {
        d.set_boot_animation(enabled);
    })
}

/// Drops every modifier created by process `pid`.
pub fn clear_modifiers_by_pid(tree: &mut SceneTree, id: NodeId, pid: u32) -> bool {
    with_display(tree, id, "clear_modifiers_by_pid", |d| {
        let cleared = d.clear_modifiers_by_pid(pid);
        log::debug!("cleared {cleared} modifiers of pid {pid} on {id:?}");
    })
}

/// Mutes or unmutes a virtual screen's display.
pub fn set_virtual_screen_mute_status(tree: &mut SceneTree, id: NodeId, muted: bool) -> bool {
    with_display(tree, id, "set_virtual_screen_mute_status", |d| {
        d.set_virtual_screen_mute_status(muted);
    })
}

/// Forces HDR off on the screen owning a display.
pub fn set_force_close_hdr(tree: &mut SceneTree, id: NodeId, force: bool) -> bool {
    tree.set_force_close_hdr(id, force)
}

/// A queued display command.
#[derive(Clone, Debug, PartialEq)]
pub enum DisplayCommand {
    /// See [`create`].
    Create(NodeId, LogicalDisplayConfig),
    /// See [`set_screen_id`].
    SetScreenId(NodeId, ScreenId),
    /// See [`set_display_content_rect`].
    SetContentRect(NodeId, Rect),
    /// See [`set_screen_rotation`].
    SetScreenRotation(NodeId, ScreenRotation),
    /// See [`set_security_display`].
    SetSecurityDisplay(NodeId, bool),
    /// See [`set_display_mode`].
    SetDisplayMode(NodeId, LogicalDisplayConfig),
    /// See [`set_boot_animation`].
    SetBootAnimation(NodeId, bool),
    /// See [`clear_modifiers_by_pid`].
    ClearModifiersByPid(NodeId, u32),
    /// See [`set_virtual_screen_mute_status`].
    SetVirtualScreenMuteStatus(NodeId, bool),
    /// See [`set_force_close_hdr`].
    SetForceCloseHdr(NodeId, bool),
}

impl DisplayCommand {
    /// Applies the command to `tree`.
    pub fn apply(self, tree: &mut SceneTree) -> bool {
        match self {
            Self::Create(id, config) => create(tree, id, config),
            Self::SetScreenId(id, screen_id) => set_screen_id(tree, id, screen_id),
            Self::SetContentRect(id, rect) => set_display_content_rect(tree, id, rect),
            Self::SetScreenRotation(id, rotation) => set_screen_rotation(tree, id, rotation),
            Self::SetSecurityDisplay(id, enabled) => set_security_display(tree, id, enabled),
            Self::SetDisplayMode(id, mode) => set_display_mode(tree, id, mode),
            Self::SetBootAnimation(id, enabled) => set_boot_animation(tree, id, enabled),
            Self::ClearModifiersByPid(id, pid) => clear_modifiers_by_pid(tree, id, pid),
            Self::SetVirtualScreenMuteStatus(id, muted) => {
                set_virtual_screen_mute_status(tree, id, muted)
            }
            Self::SetForceCloseHdr(id, force) => set_force_close_hdr(tree, id, force),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ScreenNodeConfig;
    use crate::params::NodeParams;

    fn nid(n: u32) -> NodeId {
        NodeId::from_parts(1, n)
    }

    fn tree_with_display() -> SceneTree {
        let mut tree = SceneTree::default();
        assert!(tree.create_screen(
            nid(1),
            ScreenNodeConfig {
                screen_id: ScreenId(3),
                is_mirrored: false,
            },
        ));
        assert!(create(
            &mut tree,
            nid(10),
            LogicalDisplayConfig {
                screen_id: ScreenId(3),
                ..LogicalDisplayConfig::default()
            },
        ));
        tree
    }

    #[test]
    fn unknown_target_is_ignored() {
        let mut tree = tree_with_display();
        assert!(!set_security_display(&mut tree, nid(99), true));
        assert!(!set_security_display(&mut tree, nid(1), true), "screen, not display");
        assert!(!DisplayCommand::SetForceCloseHdr(nid(99), true).apply(&mut tree));
    }

    #[test]
    fn node_local_commands_update_display() {
        let mut tree = tree_with_display();
        let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
        for cmd in [
            DisplayCommand::SetContentRect(nid(10), rect),
            DisplayCommand::SetScreenRotation(nid(10), ScreenRotation::Rotation270),
            DisplayCommand::SetSecurityDisplay(nid(10), true),
            DisplayCommand::SetVirtualScreenMuteStatus(nid(10), true),
        ] {
            assert!(cmd.apply(&mut tree));
        }
        let d = tree.display(nid(10)).expect("display exists");
        assert_eq!(d.content_rect(), rect);
        assert_eq!(d.screen_rotation(), ScreenRotation::Rotation270);
        assert!(d.security_display());
        assert!(d.virtual_screen_muted());
    }

    #[test]
    fn boot_animation_reaches_screen_params() {
        let mut tree = tree_with_display();
        let _ = tree.sync();
        assert!(set_boot_animation(&mut tree, nid(10), true));
        let batch = tree.sync();
        let screen = batch
            .entries
            .iter()
            .find_map(|e| match &e.params {
                NodeParams::Screen(p) if e.id == nid(1) => Some(p.clone()),
                _ => None,
            })
            .expect("screen restaged");
        assert!(screen.contains_boot_animation);
    }

    #[test]
    fn force_close_hdr_targets_owning_screen() {
        let mut tree = tree_with_display();
        assert!(set_force_close_hdr(&mut tree, nid(10), true));
        assert!(tree.screen(nid(1)).is_some_and(|s| s.force_close_hdr()));
    }

    #[test]
    fn reassigning_screen_id_waits_for_screen() {
        let mut tree = tree_with_display();
        assert!(!set_screen_id(&mut tree, nid(10), ScreenId(4)));
        assert!(tree.display(nid(10)).is_some_and(|d| d.is_waiting_attach()));
        assert!(tree.create_screen(
            nid(2),
            ScreenNodeConfig {
                screen_id: ScreenId(4),
                is_mirrored: false,
            },
        ));
        assert_eq!(tree.parent(nid(10)), Some(nid(2)));
    }
}
