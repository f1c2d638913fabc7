// Copyright 2026 the Vitrine Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display sink identification and geometry.
//!
//! [`ScreenId`] names a physical or virtual display sink. Sinks are owned by
//! the display-driver integration; this crate only asks it for geometry via
//! [`ScreenGeometryProvider`].

use core::fmt;
use std::collections::HashMap;

/// Identifies a physical or virtual display sink.
///
/// Assigned by the display-driver integration; core treats it as opaque.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ScreenId(pub u64);

impl fmt::Debug for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScreenId({})", self.0)
    }
}

/// Screen rotation in quarter turns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScreenRotation {
    /// No rotation.
    #[default]
    Rotation0,
    /// A quarter turn.
    Rotation90,
    /// A half turn.
    Rotation180,
    /// Three quarter turns.
    Rotation270,
}

impl ScreenRotation {
    /// Builds a rotation from a quadrant index, wrapping modulo 4.
    #[must_use]
    pub const fn from_quadrant(quadrant: u32) -> Self {
        match quadrant % 4 {
            0 => Self::Rotation0,
            1 => Self::Rotation90,
            2 => Self::Rotation180,
            _ => Self::Rotation270,
        }
    }

    /// Returns the quadrant index (0..=3).
    #[must_use]
    pub const fn quadrant(self) -> u32 {
        match self {
            Self::Rotation0 => 0,
            Self::Rotation90 => 1,
            Self::Rotation180 => 2,
            Self::Rotation270 => 3,
        }
    }

    /// Returns `true` for 90° and 270°, where width and height swap.
    #[must_use]
    pub const fn is_portrait_swap(self) -> bool {
        matches!(self, Self::Rotation90 | Self::Rotation270)
    }

    /// Returns the rotation that, applied after `self`, yields `target`.
    #[must_use]
    pub const fn offset_to(self, target: Self) -> Self {
        Self::from_quadrant(target.quadrant() + 4 - self.quadrant())
    }

    /// Returns the angle in degrees.
    #[must_use]
    pub const fn degrees(self) -> f64 {
        match self {
            Self::Rotation0 => 0.0,
            Self::Rotation90 => 90.0,
            Self::Rotation180 => 180.0,
            Self::Rotation270 => 270.0,
        }
    }
}

/// Strategy used to combine a frame's layers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CompositeType {
    /// Unified rendering on the GPU.
    #[default]
    UniRender,
    /// Unified rendering of a mirrored screen.
    UniRenderMirror,
    /// Unified rendering of an extended screen.
    UniRenderExpand,
    /// Hardware composer handles the layers.
    Hardware,
    /// CPU fallback.
    Software,
}

/// Color gamut of a screen or capture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColorGamut {
    /// sRGB.
    #[default]
    Srgb,
    /// Display P3.
    DisplayP3,
    /// BT.2020.
    Bt2020,
}

/// Geometry and capabilities of one sink.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenInfo {
    /// Width in pixels, before rotation.
    pub width: u32,
    /// Height in pixels, before rotation.
    pub height: u32,
    /// Physical rotation of the panel.
    pub rotation: ScreenRotation,
    /// Native color gamut.
    pub color_gamut: ColorGamut,
}

/// Resolves a [`ScreenId`] to its geometry.
///
/// Implemented by the display-driver integration.
pub trait ScreenGeometryProvider {
    /// Returns the geometry of `screen`, or `None` if it is unknown.
    fn screen_info(&self, screen: ScreenId) -> Option<ScreenInfo>;
}

/// A fixed table of screens, for embedding and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticScreenGeometry {
    screens: HashMap<ScreenId, ScreenInfo>,
}

impl StaticScreenGeometry {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the geometry of `screen`.
    #[must_use]
    pub fn with_screen(mut self, screen: ScreenId, info: ScreenInfo) -> Self {
        let _ = self.screens.insert(screen, info);
        self
    }
}

impl ScreenGeometryProvider for StaticScreenGeometry {
    fn screen_info(&self, screen: ScreenId) -> Option<ScreenInfo> {
        self.screens.get(&screen).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrant_wraps() {
        assert_eq!(ScreenRotation::from_quadrant(5), ScreenRotation::Rotation90);
        assert_eq!(ScreenRotation::from_quadrant(3).quadrant(), 3);
    }

    #[test]
    fn offset_composes_back_to_target() {
        let src = ScreenRotation::Rotation270;
        let dst = ScreenRotation::Rotation90;
        let off = src.offset_to(dst);
        assert_eq!(off, ScreenRotation::Rotation180);
        assert_eq!(
            ScreenRotation::from_quadrant(src.quadrant() + off.quadrant()),
            dst
        );
    }

    #[test]
    fn static_geometry_lookup() {
        let info = ScreenInfo {
            width: 1260,
            height: 2720,
            rotation: ScreenRotation::Rotation0,
            color_gamut: ColorGamut::DisplayP3,
        };
        let geo = StaticScreenGeometry::new().with_screen(ScreenId(1), info);
        assert_eq!(geo.screen_info(ScreenId(1)), Some(info));
        assert_eq!(geo.screen_info(ScreenId(2)), None);
    }
}
