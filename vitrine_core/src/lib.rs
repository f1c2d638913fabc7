// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene graph and cross-thread render-parameter synchronization for a
//! display compositor.
//!
//! `vitrine_core` models the compositor's scene as screens (physical or
//! virtual sinks), logical displays (content rectangles assigned to a
//! screen) and surfaces (client content). Two contexts share the scene
//! without locks:
//!
//! ```text
//!   Client commands                 Producer context
//!       │                              │
//!       ▼                              ▼
//!   command::* ──► SceneTree ──► SceneTree::sync() ──► SyncBatch
//!                                                        │
//!                         ┌──────── FrameSender ─────────┘
//!                         ▼
//!                    FrameReceiver              Consumer context
//!                         │                          │
//!                         ▼                          ▼
//!               DrawableTree::apply() ──► Arc<Drawable> handles
//!                         │                 (render, capture)
//!                         ▼
//!               DrawableTree::collect_garbage() ──► buffer-release hook
//! ```
//!
//! **[`node`]**: Arena-backed scene tree with [`ScreenNode`](node::ScreenNode),
//! [`LogicalDisplayNode`](node::LogicalDisplayNode) and
//! [`SurfaceNode`](node::SurfaceNode). Mutations mark dirty channels; the
//! sync pass turns them into per-node parameter copies.
//!
//! **[`params`]**: The staging/synced parameter pair and the render
//! parameters of each node kind.
//!
//! **[`sync`]**: [`SyncBatch`](sync::SyncBatch) and the single-producer
//! frame pipeline between the two contexts.
//!
//! **[`drawable`]**: Consumer-side snapshots, the
//! [`NodeRegistry`](drawable::NodeRegistry) lookup used by capture, and the
//! deferred garbage collector.
//!
//! **[`command`]**: Fire-and-forget display commands addressed by node id.
//!
//! **[`damage`]**: Per-screen dirty region tracking with buffer-age history.
//!
//! **[`special_layer`]**: Security and skip layer tags
//! and the per-display registry.
//!
//! **[`hdr`]**: HDR headroom bookkeeping.
//!
//! **[`output`]**: Screen ids, rotations and the screen geometry provider.
//!
//! **[`hooks`]**: Process-wide callback slots, set at most once.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types
//! for sync/apply/GC/capture instrumentation, with a zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod command;
pub mod config;
pub mod damage;
pub mod dirty;
pub mod drawable;
pub mod hdr;
pub mod hooks;
pub mod node;
pub mod output;
pub mod params;
pub mod special_layer;
pub mod sync;
pub mod time;
pub mod trace;
