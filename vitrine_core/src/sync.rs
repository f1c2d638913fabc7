// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sync batches and the producer → consumer hand-off.
//!
//! A [`SyncBatch`] is everything the consumer needs to bring its synced
//! snapshots up to date for one frame. The producer builds it with
//! [`SceneTree::sync`](crate::node::SceneTree::sync) and pushes it through a
//! [`FrameSender`]; the consumer blocks on the matching [`FrameReceiver`].

use std::sync::mpsc;
use std::time::Duration;

use kurbo::Affine;

use crate::node::NodeId;
use crate::params::NodeParams;

/// The synced state of one node for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncEntry {
    /// Node identity.
    pub id: NodeId,
    /// Parent in the scene tree.
    pub parent: Option<NodeId>,
    /// Children in draw order.
    pub children: Vec<NodeId>,
    /// Accumulated transform from the root.
    pub abs_transform: Affine,
    /// Render parameters copied from the staging half.
    pub params: NodeParams,
}

/// One frame's worth of synchronization.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncBatch {
    /// Monotonic frame counter, starting at 1.
    pub frame_index: u64,
    /// Nodes whose synced half must be written, parents before children.
    pub entries: Vec<SyncEntry>,
    /// Nodes destroyed since the previous batch.
    pub removed: Vec<NodeId>,
}

impl SyncBatch {
    /// Returns `true` if the batch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.removed.is_empty()
    }
}

/// Producer end of the frame pipeline.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<SyncBatch>,
}

impl FrameSender {
    /// Pushes a batch to the consumer.
    ///
    /// Returns `false` if the consumer has gone away.
    pub fn submit(&self, batch: SyncBatch) -> bool {
        match self.tx.send(batch) {
            Ok(()) => true,
            Err(mpsc::SendError(batch)) => {
                log::warn!(
                    "frame {} dropped: consumer disconnected",
                    batch.frame_index
                );
                false
            }
        }
    }
}

/// Consumer end of the frame pipeline.
#[derive(Debug)]
pub struct FrameReceiver {
    rx: mpsc::Receiver<SyncBatch>,
}

impl FrameReceiver {
    /// Blocks until the next batch arrives.
    ///
    /// Returns `None` once every sender has been dropped.
    pub fn recv(&self) -> Option<SyncBatch> {
        self.rx.recv().ok()
    }

    /// Blocks for at most `timeout` waiting for a batch.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<SyncBatch> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Returns a batch if one is already queued.
    pub fn try_recv(&self) -> Option<SyncBatch> {
        self.rx.try_recv().ok()
    }
}

/// Creates a connected producer/consumer pair.
#[must_use]
pub fn frame_pipeline() -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::channel();
    (FrameSender { tx }, FrameReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batches_arrive_in_order() {
        let (tx, rx) = frame_pipeline();
        for frame_index in 1..=3 {
            assert!(tx.submit(SyncBatch {
                frame_index,
                ..SyncBatch::default()
            }));
        }
        let frames: Vec<u64> = core::iter::from_fn(|| rx.try_recv())
            .map(|b| b.frame_index)
            .collect();
        assert_eq!(frames, [1, 2, 3]);
    }

    #[test]
    fn submit_fails_after_consumer_drops() {
        let (tx, rx) = frame_pipeline();
        drop(rx);
        assert!(!tx.submit(SyncBatch::default()));
    }

    #[test]
    fn recv_ends_after_producer_drops() {
        let (tx, rx) = frame_pipeline();
        drop(tx);
        assert!(rx.recv().is_none());
    }
}
