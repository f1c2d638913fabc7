// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene configuration.

use crate::damage::DEFAULT_HISTORY;

/// Tuning knobs for a [`SceneTree`](crate::node::SceneTree).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneConfig {
    /// Previous frames each screen keeps for buffer-age damage.
    pub damage_history: usize,
    /// Whether creating a screen retries attaching displays that are waiting
    /// for it.
    pub retry_attach_on_screen_create: bool,
    /// Whether a display whose rotation is in flight forces full damage on
    /// its screen.
    pub full_damage_on_rotation: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            damage_history: DEFAULT_HISTORY,
            retry_attach_on_screen_create: true,
            full_damage_on_rotation: true,
        }
    }
}
