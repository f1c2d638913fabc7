// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Capture failures.

use vitrine_core::node::NodeId;

/// Why a capture request produced no buffer.
///
/// Every variant is local to the failing request: the scene and the
/// consumer's next frame are unaffected, and the callback never fires.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CaptureError {
    /// A scale factor was zero, negative or not finite.
    #[error("invalid capture scale {scale_x}x{scale_y}")]
    InvalidArgument {
        /// Requested horizontal scale.
        scale_x: f64,
        /// Requested vertical scale.
        scale_y: f64,
    },
    /// The target is not a synced surface or logical display, or its screen
    /// has no known geometry.
    #[error("capture target {0:?} not found")]
    NotFound(NodeId),
    /// The destination buffer or drawing surface could not be created.
    #[error("capture resources unavailable: {0}")]
    ResourceUnavailable(String),
    /// Copying the drawn pixels back from the GPU failed.
    #[error("pixel readback failed: {0}")]
    ReadbackFailure(String),
}
