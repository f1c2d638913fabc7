// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! HDR headroom bookkeeping.
//!
//! A screen keeps a [`HeadroomMap`] counting how many active sources of each
//! HDR status request each brightness level; the dynamic-range policy reads
//! it to decide how much headroom to give the panel. Logical displays keep
//! [`HdrTypeCounts`] for the kinds of HDR content among their children.

use std::collections::BTreeMap;

/// Why a source wants HDR headroom.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HdrStatus {
    /// HDR still image.
    HdrPhoto,
    /// Plain HDR video.
    HdrVideo,
    /// AI-upscaled video using a global tone map.
    AiHdrVideoGtm,
    /// AI-upscaled video using a gain map.
    AiHdrVideoGainmap,
    /// HDR shader effect.
    HdrEffect,
    /// HDR UI component.
    HdrUiComponent,
}

impl HdrStatus {
    /// Returns `true` for the video-driven statuses.
    #[must_use]
    pub const fn is_video(self) -> bool {
        matches!(
            self,
            Self::HdrVideo | Self::AiHdrVideoGtm | Self::AiHdrVideoGainmap
        )
    }
}

/// HDR status → brightness level → number of active sources.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeadroomMap {
    counts: BTreeMap<HdrStatus, BTreeMap<u32, u32>>,
}

impl HeadroomMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one more active source for `(status, level)`.
    pub fn increase(&mut self, status: HdrStatus, level: u32) {
        *self
            .counts
            .entry(status)
            .or_default()
            .entry(level)
            .or_insert(0) += 1;
    }

    /// Releases one active source for `(status, level)`.
    ///
    /// Counts never go below zero; an entry that reaches zero is removed.
    pub fn decrease(&mut self, status: HdrStatus, level: u32) {
        let Some(levels) = self.counts.get_mut(&status) else {
            return;
        };
        if let Some(count) = levels.get_mut(&level) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                let _ = levels.remove(&level);
            }
        }
        if levels.is_empty() {
            let _ = self.counts.remove(&status);
        }
    }

    /// Removes every video-driven status, leaving the others untouched.
    pub fn reset_video(&mut self) {
        self.counts.retain(|status, _| !status.is_video());
    }

    /// Returns the active source count for `(status, level)`.
    #[must_use]
    pub fn count(&self, status: HdrStatus, level: u32) -> u32 {
        self.counts
            .get(&status)
            .and_then(|levels| levels.get(&level))
            .copied()
            .unwrap_or(0)
    }

    /// Returns `true` if any level of `status` has an active source.
    #[must_use]
    pub fn has_status(&self, status: HdrStatus) -> bool {
        self.counts.contains_key(&status)
    }

    /// Returns `true` if no source is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterates `(status, level, count)` triples in key order.
    pub fn iter(&self) -> impl Iterator<Item = (HdrStatus, u32, u32)> + '_ {
        self.counts.iter().flat_map(|(status, levels)| {
            levels
                .iter()
                .map(move |(level, count)| (*status, *level, *count))
        })
    }
}

/// Kind of HDR content a display's child presents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HdrType {
    /// HDR photo.
    Photo,
    /// HDR video.
    Video,
    /// HDR shader effect.
    Effect,
    /// HDR UI component.
    UiComponent,
}

/// Per-type reference counts of HDR children.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HdrTypeCounts {
    counts: BTreeMap<HdrType, u32>,
}

impl HdrTypeCounts {
    /// Registers one more child of type `ty`.
    pub fn increase(&mut self, ty: HdrType) {
        *self.counts.entry(ty).or_insert(0) += 1;
    }

    /// Releases one child of type `ty`, never going below zero.
    pub fn decrease(&mut self, ty: HdrType) {
        if let Some(count) = self.counts.get_mut(&ty) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                let _ = self.counts.remove(&ty);
            }
        }
    }

    /// Returns the count for `ty`.
    #[must_use]
    pub fn count(&self, ty: HdrType) -> u32 {
        self.counts.get(&ty).copied().unwrap_or(0)
    }

    /// Returns `true` if any HDR child is present.
    #[must_use]
    pub fn any(&self) -> bool {
        !self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increase_reports_count() {
        let mut map = HeadroomMap::new();
        map.increase(HdrStatus::HdrPhoto, 0);
        assert_eq!(map.count(HdrStatus::HdrPhoto, 0), 1);
        map.increase(HdrStatus::HdrPhoto, 0);
        assert_eq!(map.count(HdrStatus::HdrPhoto, 0), 2);
        assert_eq!(map.count(HdrStatus::HdrPhoto, 1), 0);
    }

    #[test]
    fn decrease_never_goes_negative() {
        let mut map = HeadroomMap::new();
        map.decrease(HdrStatus::HdrVideo, 3);
        assert_eq!(map.count(HdrStatus::HdrVideo, 3), 0);

        map.increase(HdrStatus::HdrVideo, 3);
        map.decrease(HdrStatus::HdrVideo, 3);
        map.decrease(HdrStatus::HdrVideo, 3);
        assert_eq!(map.count(HdrStatus::HdrVideo, 3), 0);
        assert!(map.is_empty());
    }

    #[test]
    fn reset_video_removes_only_video_statuses() {
        let mut map = HeadroomMap::new();
        for status in [
            HdrStatus::HdrPhoto,
            HdrStatus::HdrVideo,
            HdrStatus::AiHdrVideoGtm,
            HdrStatus::AiHdrVideoGainmap,
            HdrStatus::HdrEffect,
            HdrStatus::HdrUiComponent,
        ] {
            map.increase(status, 1);
        }

        map.reset_video();

        assert_eq!(map.count(HdrStatus::HdrVideo, 1), 0);
        assert_eq!(map.count(HdrStatus::AiHdrVideoGtm, 1), 0);
        assert_eq!(map.count(HdrStatus::AiHdrVideoGainmap, 1), 0);
        assert_eq!(map.count(HdrStatus::HdrPhoto, 1), 1);
        assert_eq!(map.count(HdrStatus::HdrEffect, 1), 1);
        assert_eq!(map.count(HdrStatus::HdrUiComponent, 1), 1);
        assert_eq!(map.iter().count(), 3);
    }

    #[test]
    fn type_counts_saturate() {
        let mut counts = HdrTypeCounts::default();
        counts.decrease(HdrType::Effect);
        assert!(!counts.any());
        counts.increase(HdrType::Effect);
        assert_eq!(counts.count(HdrType::Effect), 1);
        counts.decrease(HdrType::Effect);
        assert!(!counts.any());
    }
}
