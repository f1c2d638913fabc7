// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr).

use std::io::Write;

use vitrine_core::trace::{ApplyEvent, CaptureEvent, GcEvent, SyncEvent, TraceSink};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the destination.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_sync(&mut self, e: &SyncEvent) {
        let _ = writeln!(
            self.writer,
            "[sync] frame={} entries={} removed={}",
            e.frame_index, e.entries, e.removed,
        );
    }

    fn on_apply(&mut self, e: &ApplyEvent) {
        let _ = writeln!(
            self.writer,
            "[apply] frame={} applied={} rejected={}",
            e.frame_index, e.applied, e.rejected,
        );
    }

    fn on_gc(&mut self, e: &GcEvent) {
        let _ = writeln!(
            self.writer,
            "[gc] freed={} deferred={}",
            e.freed, e.deferred
        );
    }

    fn on_capture(&mut self, e: &CaptureEvent) {
        let outcome = if e.success { "ok" } else { "FAILED" };
        let _ = writeln!(
            self.writer,
            "[capture] node={:?} {}x{} redacted={} {outcome}",
            e.node, e.width, e.height, e.redacted,
        );
    }
}
