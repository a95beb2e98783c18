//! Color values and palettes shared by the timeline and viewer.
//!
//! Category colors come from a fixed warm/cool gradient sampled at even
//! intervals, except when exactly seven distinct keys exist — that count
//! gets the hand-picked [`SEVEN_KEY_PALETTE`] with stronger adjacent
//! contrast instead of interpolation.

use serde::{Deserialize, Serialize};

/// Float RGBA color, channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Construct from 8-bit channels.
    pub const fn from_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    pub fn with_alpha(mut self, a: f32) -> Self {
        self.a = a;
        self
    }

    /// Linear blend toward `other` by `t` in `0..=1`.
    pub fn mix(&self, other: &Rgba, t: f32) -> Rgba {
        let t = t.clamp(0.0, 1.0);
        Rgba {
            r: self.r * (1.0 - t) + other.r * t,
            g: self.g * (1.0 - t) + other.g * t,
            b: self.b * (1.0 - t) + other.b * t,
            a: self.a * (1.0 - t) + other.a * t,
        }
    }

    /// Brighten by `factor` (1.0 = unchanged), clamped per channel.
    pub fn lighter(&self, factor: f32) -> Rgba {
        Rgba {
            r: (self.r * factor).min(1.0),
            g: (self.g * factor).min(1.0),
            b: (self.b * factor).min(1.0),
            a: self.a,
        }
    }

    /// True for pure black regardless of alpha.
    pub fn is_black(&self) -> bool {
        self.r == 0.0 && self.g == 0.0 && self.b == 0.0
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Rgba::new(1.0, 1.0, 1.0, 1.0)
    }
}

// =============================================================================
// NAMED UI COLORS
// =============================================================================

/// Base color for render-function documents with no mapped category color.
pub const COLOR_RENDER: Rgba = Rgba::from_u8(255, 255, 255, 255);

/// Base color for documents whose category carries no color mapping.
pub const COLOR_DISABLED: Rgba = Rgba::from_u8(126, 126, 126, 255);

/// Cluster hull / snap guide color.
pub const COLOR_CLUSTER: Rgba = Rgba::from_u8(255, 255, 255, 100);

/// Playhead / progression accent.
pub const COLOR_TIMELINE: Rgba = Rgba::from_u8(45, 202, 225, 255);

/// Foreground text.
pub const COLOR_TEXT: Rgba = Rgba::from_u8(245, 248, 250, 255);

/// Timeline background.
pub const COLOR_BACKGROUND: Rgba = Rgba::from_u8(71, 77, 79, 255);

/// Alternate band backgrounds (strong / light).
pub const COLOR_ALTERNATE: Rgba = Rgba::from_u8(255, 255, 255, 12);
pub const COLOR_ALTERNATE_LIGHT: Rgba = Rgba::from_u8(255, 255, 255, 8);

// =============================================================================
// PALETTES
// =============================================================================

/// Gradient stops sampled by [`scale_color`].
const GRADIENT: [Rgba; 8] = [
    Rgba::from_u8(229, 149, 205, 255),
    Rgba::from_u8(123, 144, 206, 255),
    Rgba::from_u8(74, 201, 159, 255),
    Rgba::from_u8(166, 204, 91, 255),
    Rgba::from_u8(255, 234, 136, 255),
    Rgba::from_u8(255, 147, 102, 255),
    Rgba::from_u8(181, 134, 118, 255),
    Rgba::from_u8(255, 84, 79, 255),
];

/// Hand-picked palette used when exactly seven distinct color keys exist.
pub const SEVEN_KEY_PALETTE: [Rgba; 7] = [
    Rgba::from_u8(74, 201, 159, 255),
    Rgba::from_u8(255, 84, 79, 255),
    Rgba::from_u8(229, 149, 205, 255),
    Rgba::from_u8(255, 147, 102, 255),
    Rgba::from_u8(166, 204, 91, 255),
    Rgba::from_u8(181, 134, 118, 255),
    Rgba::from_u8(255, 234, 136, 255),
];

/// Sample the category gradient at `t` in `0..=1`.
pub fn scale_color(t: f64) -> Rgba {
    let t = t.clamp(0.0, 1.0);
    let pos = t * (GRADIENT.len() - 1) as f64;
    let low = pos.floor() as usize;
    let high = (low + 1).min(GRADIENT.len() - 1);
    GRADIENT[low].mix(&GRADIENT[high], (pos - low as f64) as f32)
}
