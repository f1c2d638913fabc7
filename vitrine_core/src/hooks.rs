// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-wide callback registrations.
//!
//! A [`CallbackSlots`] is built once at startup, its slots are filled once,
//! and it is handed to the [`SceneTree`](crate::node::SceneTree) and the
//! [`DrawableTree`](crate::drawable::DrawableTree) as an `Arc`. Dropping the
//! last `Arc` is the teardown.

use std::sync::OnceLock;

use crate::node::NodeId;
use crate::output::ScreenId;
use crate::params::SurfaceBuffer;

/// Lifecycle change of a screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScreenStatus {
    /// A screen node was created.
    Connected,
    /// A screen node was destroyed.
    Disconnected,
}

/// Receives screen lifecycle changes.
pub type ScreenStatusNotifier = dyn Fn(ScreenId, ScreenStatus) + Send + Sync;

/// Receives client buffers the consumer no longer references.
pub type BufferReleaseHook = dyn Fn(NodeId, &SurfaceBuffer) + Send + Sync;

/// Set-once callback registrations shared by both contexts.
#[derive(Default)]
pub struct CallbackSlots {
    screen_status: OnceLock<Box<ScreenStatusNotifier>>,
    buffer_release: OnceLock<Box<BufferReleaseHook>>,
}

impl core::fmt::Debug for CallbackSlots {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CallbackSlots")
            .field("screen_status", &self.screen_status.get().is_some())
            .field("buffer_release", &self.buffer_release.get().is_some())
            .finish()
    }
}

impl CallbackSlots {
    /// Creates empty slots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the screen status notifier.
    ///
    /// Returns `false` if a notifier was already registered.
    pub fn set_screen_status_notifier(
        &self,
        notifier: impl Fn(ScreenId, ScreenStatus) + Send + Sync + 'static,
    ) -> bool {
        self.screen_status.set(Box::new(notifier)).is_ok()
    }

    /// Registers the buffer release hook.
    ///
    /// Returns `false` if a hook was already registered.
    pub fn set_buffer_release_hook(
        &self,
        hook: impl Fn(NodeId, &SurfaceBuffer) + Send + Sync + 'static,
    ) -> bool {
        self.buffer_release.set(Box::new(hook)).is_ok()
    }

    pub(crate) fn notify_screen_status(&self, screen: ScreenId, status: ScreenStatus) {
        if let Some(notifier) = self.screen_status.get() {
            notifier(screen, status);
        }
    }

    pub(crate) fn release_buffer(&self, node: NodeId, buffer: &SurfaceBuffer) {
        if let Some(hook) = self.buffer_release.get() {
            hook(node, buffer);
        }
    }
}
