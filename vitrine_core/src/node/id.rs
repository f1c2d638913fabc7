// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node identity types.

use core::fmt;

/// Sentinel value indicating "no slot" in index fields.
pub const INVALID: u32 = u32::MAX;

/// Stable identity of a node, assigned by the client that created it.
///
/// The upper 32 bits hold the creating process id, so every node (and
/// modifier) a client owns can be found when that client disconnects.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Builds an id from an owning process id and a per-process counter.
    #[inline]
    #[must_use]
    pub const fn from_parts(pid: u32, local: u32) -> Self {
        Self(((pid as u64) << 32) | local as u64)
    }

    /// Returns the owning process id.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the shift leaves exactly 32 significant bits"
    )]
    pub const fn pid(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}:{})", self.pid(), self.0 & 0xFFFF_FFFF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pid_round_trips_through_parts() {
        let id = NodeId::from_parts(4242, 17);
        assert_eq!(id.pid(), 4242);
        assert_eq!(id.0 & 0xFFFF_FFFF, 17);
    }
}
