// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing hooks for synchronization, garbage collection, and capture.
//!
//! [`TraceSink`] has one method per event, each defaulting to a no-op, so a
//! sink only overrides the events it cares about.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. Without the `trace`
//! feature every `Tracer` method compiles to nothing. With it, each call is a
//! single `Option` branch before dispatch.

use crate::node::NodeId;

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted by the producer after a sync batch is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncEvent {
    /// Frame the batch belongs to.
    pub frame_index: u64,
    /// Number of nodes whose synced half will be written.
    pub entries: usize,
    /// Number of nodes destroyed since the previous batch.
    pub removed: usize,
}

/// Emitted by the consumer after a batch has been applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplyEvent {
    /// Frame the batch belongs to.
    pub frame_index: u64,
    /// Entries written.
    pub applied: usize,
    /// Entries rejected because the node was already written this frame.
    pub rejected: usize,
}

/// Emitted by the consumer after a garbage-collection pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GcEvent {
    /// Drawables freed by this pass.
    pub freed: usize,
    /// Drawables still held by an in-flight handle.
    pub deferred: usize,
}

/// Emitted when a capture request finishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureEvent {
    /// Captured node.
    pub node: NodeId,
    /// Destination width, or 0 if the request failed before sizing.
    pub width: u32,
    /// Destination height, or 0 if the request failed before sizing.
    pub height: u32,
    /// Number of surfaces replaced by a uniform fill.
    pub redacted: usize,
    /// Whether the callback fired.
    pub success: bool,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events.
///
/// All methods have default no-op implementations.
pub trait TraceSink {
    /// Called when the producer builds a sync batch.
    fn on_sync(&mut self, e: &SyncEvent) {
        _ = e;
    }

    /// Called when the consumer applies a sync batch.
    fn on_apply(&mut self, e: &ApplyEvent) {
        _ = e;
    }

    /// Called after a garbage-collection pass.
    fn on_gc(&mut self, e: &GcEvent) {
        _ = e;
    }

    /// Called when a capture request finishes.
    fn on_capture(&mut self, e: &CaptureEvent) {
        _ = e;
    }
}

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`SyncEvent`].
    #[inline]
    pub fn sync(&mut self, e: &SyncEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_sync(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`ApplyEvent`].
    #[inline]
    pub fn apply(&mut self, e: &ApplyEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_apply(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`GcEvent`].
    #[inline]
    pub fn gc(&mut self, e: &GcEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_gc(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`CaptureEvent`].
    #[inline]
    pub fn capture(&mut self, e: &CaptureEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_capture(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_sync(&SyncEvent {
            frame_index: 1,
            entries: 2,
            removed: 0,
        });
        sink.on_gc(&GcEvent {
            freed: 0,
            deferred: 0,
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.sync(&SyncEvent {
            frame_index: 1,
            entries: 0,
            removed: 0,
        });
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_sink() {
        struct RecordingSink {
            frames: Vec<u64>,
        }
        impl TraceSink for RecordingSink {
            fn on_sync(&mut self, e: &SyncEvent) {
                self.frames.push(e.frame_index);
            }
        }

        let mut sink = RecordingSink { frames: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        tracer.sync(&SyncEvent {
            frame_index: 7,
            entries: 1,
            removed: 0,
        });
        drop(tracer);
        assert_eq!(sink.frames, &[7]);
    }
}
