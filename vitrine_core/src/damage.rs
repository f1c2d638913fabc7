// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-screen damage tracking for partial redraw.
//!
//! A [`DirtyRegionTracker`] collects the rectangles modified during the
//! current frame. At the end of the frame, [`advance_frame`] pushes them into
//! a bounded history so that the damage needed for a back buffer of a given
//! *buffer age* (how many frames ago its contents were produced) can be
//! reconstructed by merging the last `age` frames.
//!
//! [`advance_frame`]: DirtyRegionTracker::advance_frame

use std::collections::VecDeque;

use kurbo::Rect;

/// A region of the output that needs re-rendering.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum DamageRegion {
    /// The entire output needs redrawing.
    #[default]
    Full,
    /// A list of axis-aligned rectangles in screen pixels.
    Rects(Vec<Rect>),
    /// Nothing changed; the previous frame can be reused.
    None,
}

impl DamageRegion {
    /// Returns `true` if no region needs redrawing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Merges another damage region into this one.
    pub fn merge(&mut self, other: &Self) {
        match (&*self, other) {
            (Self::Full, _) | (_, Self::Full) => *self = Self::Full,
            (Self::None, _) => *self = other.clone(),
            (_, Self::None) => {}
            (Self::Rects(a), Self::Rects(b)) => {
                let mut merged = a.clone();
                merged.extend_from_slice(b);
                *self = Self::Rects(merged);
            }
        }
    }

    /// Returns the bounding box of the damage, clipped to `screen`.
    #[must_use]
    pub fn bounds(&self, screen: Rect) -> Option<Rect> {
        match self {
            Self::Full => Some(screen),
            Self::None => None,
            Self::Rects(rects) => rects
                .iter()
                .map(|r| r.intersect(screen))
                .filter(|r| !r.is_zero_area())
                .reduce(|a, b| a.union(b)),
        }
    }
}

/// Default number of previous frames kept for buffer-age reconstruction.
pub const DEFAULT_HISTORY: usize = 4;

/// Accumulates modified screen area for the current frame plus buffer age.
#[derive(Clone, Debug)]
pub struct DirtyRegionTracker {
    current: Vec<Rect>,
    force_full: bool,
    buffer_age: u32,
    history: VecDeque<DamageRegion>,
    history_len: usize,
}

impl Default for DirtyRegionTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}

impl DirtyRegionTracker {
    /// Creates a tracker that remembers `history_len` previous frames.
    #[must_use]
    pub fn new(history_len: usize) -> Self {
        Self {
            current: Vec::new(),
            force_full: false,
            buffer_age: 0,
            history: VecDeque::with_capacity(history_len),
            history_len,
        }
    }

    /// Adds a modified rectangle to the current frame. Empty rectangles are
    /// ignored.
    pub fn merge_dirty_rect(&mut self, rect: Rect) {
        if rect.is_zero_area() || !rect.is_finite() {
            return;
        }
        self.current.push(rect.abs());
    }

    /// Marks the whole screen dirty for the current frame.
    pub fn force_full_redraw(&mut self) {
        self.force_full = true;
    }

    /// Sets the age of the back buffer about to be drawn into.
    pub fn set_buffer_age(&mut self, age: u32) {
        self.buffer_age = age;
    }

    /// Returns the age of the back buffer.
    #[must_use]
    pub fn buffer_age(&self) -> u32 {
        self.buffer_age
    }

    /// Returns the damage accumulated during the current frame only.
    #[must_use]
    pub fn current_damage(&self) -> DamageRegion {
        if self.force_full {
            DamageRegion::Full
        } else if self.current.is_empty() {
            DamageRegion::None
        } else {
            DamageRegion::Rects(self.current.clone())
        }
    }

    /// Returns the damage a back buffer of the current buffer age needs.
    ///
    /// An age of 0 (undefined contents) or an age older than the retained
    /// history yields [`DamageRegion::Full`].
    #[must_use]
    pub fn damage_for_buffer_age(&self) -> DamageRegion {
        let age = self.buffer_age as usize;
        if age == 0 || age - 1 > self.history.len() {
            return DamageRegion::Full;
        }
        let mut damage = self.current_damage();
        for past in self.history.iter().take(age - 1) {
            damage.merge(past);
        }
        damage
    }

    /// Closes the current frame: records its damage in history and resets
    /// the per-frame state.
    pub fn advance_frame(&mut self) {
        let damage = self.current_damage();
        if self.history_len > 0 {
            if self.history.len() == self.history_len {
                let _ = self.history.pop_back();
            }
            self.history.push_front(damage);
        }
        self.current.clear();
        self.force_full = false;
    }
}
