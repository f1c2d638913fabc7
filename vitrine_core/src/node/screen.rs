// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Screen nodes: one per physical or virtual display sink.

use crate::damage::DirtyRegionTracker;
use crate::hdr::{HdrStatus, HeadroomMap};
use crate::output::{ColorGamut, CompositeType, ScreenId};
use crate::params::ScreenRenderParams;
use crate::time::{Duration, HostTime, NANOS_PER_SEC};

use super::id::NodeId;

/// Tolerance applied to the next expected refresh when the refresh rate is
/// not a multiple of the skip interval.
pub const SKIP_FRAME_JITTER: Duration = Duration::from_millis(2);

/// Creation parameters of a screen node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScreenNodeConfig {
    /// Sink the screen drives.
    pub screen_id: ScreenId,
    /// Whether the screen is a mirror of another screen.
    pub is_mirrored: bool,
}

/// A physical or virtual display sink and the policy state aggregated across
/// its logical displays.
#[derive(Debug)]
pub struct ScreenNode {
    pub(crate) screen_id: ScreenId,
    pub(crate) is_mirrored: bool,
    pub(crate) composite_type: CompositeType,
    pub(crate) color_gamut: ColorGamut,
    pub(crate) dirty_region: DirtyRegionTracker,
    pub(crate) mirror_source: Option<NodeId>,
    pub(crate) has_mirror_screen: bool,
    pub(crate) headroom: HeadroomMap,
    pub(crate) exists_hwc_node: bool,
    pub(crate) force_close_hdr: bool,
    pub(crate) contains_boot_animation: bool,
    pub(crate) round_corner_top: Option<NodeId>,
    pub(crate) round_corner_bottom: Option<NodeId>,
    last_refresh: HostTime,
    next_expected_refresh: Option<HostTime>,
}

impl ScreenNode {
    pub(crate) fn new(config: ScreenNodeConfig) -> Self {
        Self {
            screen_id: config.screen_id,
            is_mirrored: config.is_mirrored,
            composite_type: if config.is_mirrored {
                CompositeType::UniRenderMirror
            } else {
                CompositeType::UniRender
            },
            color_gamut: ColorGamut::default(),
            dirty_region: DirtyRegionTracker::default(),
            mirror_source: None,
            has_mirror_screen: false,
            headroom: HeadroomMap::new(),
            exists_hwc_node: false,
            force_close_hdr: false,
            contains_boot_animation: false,
            round_corner_top: None,
            round_corner_bottom: None,
            last_refresh: HostTime(0),
            next_expected_refresh: None,
        }
    }

    /// Sink this screen drives.
    #[must_use]
    pub fn screen_id(&self) -> ScreenId {
        self.screen_id
    }

    /// Whether the screen was created as a mirror.
    #[must_use]
    pub fn is_mirrored(&self) -> bool {
        self.is_mirrored
    }

    /// Screen whose content this one mirrors.
    #[must_use]
    pub fn mirror_source(&self) -> Option<NodeId> {
        self.mirror_source
    }

    /// Whether another screen currently mirrors this one.
    #[must_use]
    pub fn has_mirror_screen(&self) -> bool {
        self.has_mirror_screen
    }

    /// Layer combination strategy.
    #[must_use]
    pub fn composite_type(&self) -> CompositeType {
        self.composite_type
    }

    /// Output color space.
    #[must_use]
    pub fn color_gamut(&self) -> ColorGamut {
        self.color_gamut
    }

    /// Whether HDR is forcibly disabled.
    #[must_use]
    pub fn force_close_hdr(&self) -> bool {
        self.force_close_hdr
    }

    /// Whether any child is composed by the hardware composer.
    #[must_use]
    pub fn exists_hwc_node(&self) -> bool {
        self.exists_hwc_node
    }

    /// Records whether any child is composed by the hardware composer.
    pub fn set_exists_hwc_node(&mut self, exists: bool) {
        self.exists_hwc_node = exists;
    }

    /// The per-frame damage tracker.
    #[must_use]
    pub fn dirty_region(&self) -> &DirtyRegionTracker {
        &self.dirty_region
    }

    /// Mutable access to the per-frame damage tracker.
    pub fn dirty_region_mut(&mut self) -> &mut DirtyRegionTracker {
        &mut self.dirty_region
    }

    /// The HDR headroom map.
    #[must_use]
    pub fn headroom(&self) -> &HeadroomMap {
        &self.headroom
    }

    /// Registers an HDR source at `level`.
    pub fn update_headroom_map_increase(&mut self, status: HdrStatus, level: u32) {
        self.headroom.increase(status, level);
    }

    /// Releases an HDR source at `level`. Never drives a count below zero.
    pub fn update_headroom_map_decrease(&mut self, status: HdrStatus, level: u32) {
        self.headroom.decrease(status, level);
    }

    /// Drops every video-driven headroom entry.
    pub fn reset_video_headroom_info(&mut self) {
        self.headroom.reset_video();
    }

    /// Decides whether to drop this frame to pace a virtual screen.
    ///
    /// When `skip_interval` divides `refresh_rate`, the virtual screen runs
    /// at `refresh_rate / skip_interval`. Otherwise `skip_interval` is the
    /// virtual screen's own rate in Hz and frames are matched against an
    /// expected refresh time. `now` is the current host time.
    pub fn skip_frame(&mut self, refresh_rate: u32, skip_interval: u32, now: HostTime) -> bool {
        if refresh_rate == 0 || skip_interval <= 1 {
            return false;
        }
        if refresh_rate % skip_interval != 0 {
            return self.skip_frame_irregular(skip_interval, now);
        }

        // 110/100 allows the frame to arrive up to 10% late.
        let frame_period = NANOS_PER_SEC / u64::from(refresh_rate);
        let threshold = frame_period * u64::from(skip_interval - 1) * 110 / 100;
        let elapsed = now.saturating_duration_since(self.last_refresh);
        let skip = elapsed.nanos() < threshold;
        if !skip {
            self.last_refresh = now;
        }
        skip
    }

    fn skip_frame_irregular(&mut self, virtual_rate: u32, now: HostTime) -> bool {
        let interval = Duration(NANOS_PER_SEC / u64::from(virtual_rate));
        let Some(next) = self.next_expected_refresh else {
            self.next_expected_refresh = now.checked_add(interval);
            return false;
        };
        if now + SKIP_FRAME_JITTER < next {
            return true;
        }
        let late = (now + SKIP_FRAME_JITTER).saturating_duration_since(next).nanos();
        let missed = if interval.nanos() == 0 {
            0
        } else {
            late / interval.nanos()
        };
        self.next_expected_refresh = next.checked_add(Duration(interval.nanos() * (missed + 1)));
        false
    }

    /// Sets the round-corner overlay nodes.
    pub fn set_round_corner_nodes(&mut self, top: Option<NodeId>, bottom: Option<NodeId>) {
        self.round_corner_top = top;
        self.round_corner_bottom = bottom;
    }

    /// Builds the staging snapshot for the next sync.
    pub(crate) fn render_params(&self, force_full_damage: bool) -> ScreenRenderParams {
        ScreenRenderParams {
            screen_id: self.screen_id,
            composite_type: self.composite_type,
            color_gamut: self.color_gamut,
            mirror_source: self.mirror_source,
            has_mirror_screen: self.has_mirror_screen,
            force_close_hdr: self.force_close_hdr,
            hdr_present: !self.headroom.is_empty(),
            contains_boot_animation: self.contains_boot_animation,
            round_corner_top: self.round_corner_top,
            round_corner_bottom: self.round_corner_bottom,
            damage: if force_full_damage {
                crate::damage::DamageRegion::Full
            } else {
                self.dirty_region.damage_for_buffer_age()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> ScreenNode {
        ScreenNode::new(ScreenNodeConfig {
            screen_id: ScreenId(0),
            is_mirrored: false,
        })
    }

    const SECOND: u64 = NANOS_PER_SEC;

    #[test]
    fn zero_rate_or_unit_interval_never_skips() {
        let mut s = screen();
        for t in 0..5 {
            assert!(!s.skip_frame(0, 2, HostTime(SECOND + t)));
            assert!(!s.skip_frame(60, 1, HostTime(SECOND + t)));
            assert!(!s.skip_frame(60, 0, HostTime(SECOND + t)));
        }
    }

    #[test]
    fn regular_interval_skips_within_threshold() {
        let mut s = screen();
        let t0 = HostTime(SECOND);
        assert!(!s.skip_frame(60, 2, t0), "first frame is accepted");
        assert!(s.skip_frame(60, 2, t0 + Duration::from_millis(5)));
        assert!(s.skip_frame(60, 2, t0 + Duration::from_millis(18)));
        // (1/60) * 1 * 1.10 s = 18.33 ms.
        assert!(!s.skip_frame(60, 2, t0 + Duration(18_340_000)));
    }

    #[test]
    fn accepted_frame_resets_baseline() {
        let mut s = screen();
        let t0 = HostTime(SECOND);
        assert!(!s.skip_frame(60, 2, t0));
        let t1 = t0 + Duration::from_millis(20);
        assert!(!s.skip_frame(60, 2, t1));
        assert!(s.skip_frame(60, 2, t1 + Duration::from_millis(10)));
    }

    // 60 Hz source driving a 7 Hz virtual screen: interval = 1/7 s.
    const SEVENTH: u64 = 142_857_142;

    #[test]
    fn irregular_interval_uses_expected_refresh_with_jitter() {
        let mut s = screen();
        let t0 = HostTime(SECOND);
        assert!(!s.skip_frame(60, 7, t0));
        assert!(s.skip_frame(60, 7, t0 + Duration::from_millis(100)));
        assert!(s.skip_frame(60, 7, t0 + Duration::from_millis(140)));
        // Within the 2 ms jitter before the expected refresh at 142.86 ms.
        assert!(!s.skip_frame(60, 7, t0 + Duration::from_millis(141)));
        // Next expected is now t0 + 285.7 ms.
        assert!(s.skip_frame(60, 7, t0 + Duration::from_millis(250)));
        assert!(!s.skip_frame(60, 7, t0 + Duration::from_millis(284)));
    }

    #[test]
    fn irregular_interval_catches_up_after_missed_intervals() {
        let mut s = screen();
        let t0 = HostTime(SECOND);
        assert!(!s.skip_frame(60, 7, t0));
        // Three intervals past the expected refresh, plus 50 ms.
        let late = t0 + Duration(SEVENTH * 4 + 50_000_000);
        assert!(!s.skip_frame(60, 7, late));
        // Next expected is t0 + 5 intervals, so 40 ms later is still early.
        assert!(s.skip_frame(60, 7, late + Duration::from_millis(40)));
        assert!(!s.skip_frame(60, 7, t0 + Duration(SEVENTH * 5)));
    }

    #[test]
    fn jitter_counts_toward_missed_intervals() {
        let mut s = screen();
        let t0 = HostTime(SECOND);
        assert!(!s.skip_frame(60, 7, t0));
        // 1 ms short of the second expected refresh: with the jitter this
        // counts as having missed the first one.
        let almost = t0 + Duration(SEVENTH * 2 - 1_000_000);
        assert!(!s.skip_frame(60, 7, almost));
        assert!(s.skip_frame(60, 7, t0 + Duration(SEVENTH * 2 + 1_000_000)));
        assert!(!s.skip_frame(60, 7, t0 + Duration(SEVENTH * 3)));
    }

    #[test]
    fn headroom_helpers_delegate() {
        let mut s = screen();
        s.update_headroom_map_increase(HdrStatus::HdrPhoto, 0);
        s.update_headroom_map_increase(HdrStatus::HdrVideo, 0);
        s.reset_video_headroom_info();
        assert_eq!(s.headroom().count(HdrStatus::HdrPhoto, 0), 1);
        assert_eq!(s.headroom().count(HdrStatus::HdrVideo, 0), 0);
        s.update_headroom_map_decrease(HdrStatus::HdrPhoto, 0);
        s.update_headroom_map_decrease(HdrStatus::HdrPhoto, 0);
        assert_eq!(s.headroom().count(HdrStatus::HdrPhoto, 0), 0);
    }
}
