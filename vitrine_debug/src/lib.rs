// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Development diagnostics for vitrine.
//!
//! - [`logging::init_logging`]: one-shot `env_logger` setup honoring
//!   `RUST_LOG`.
//! - [`pretty::PrettyPrintSink`]: a
//!   [`TraceSink`](vitrine_core::trace::TraceSink) writing one line per
//!   sync, apply, GC and capture event.
//! - [`dump`]: JSON snapshots of the producer scene and the consumer's
//!   synced drawables.

pub mod dump;
pub mod logging;
pub mod pretty;
