//! Colorspace capability consumed when resolving paints. Conversions
//! beyond the device spaces are supplied by the document layer.

use std::fmt::Debug;
use tiny_skia::Color;

pub trait ColorSpace: Debug {
    /// Convert color components to an opaque color. Returns `None` if
    /// `color` does not hold `components()` values in `0.0..=1.0`.
    fn to_color(&self, color: &[f32]) -> Option<Color>;

    /// Number of color components in this color space.
    fn components(&self) -> usize;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceGray;

impl ColorSpace for DeviceGray {
    fn to_color(&self, color: &[f32]) -> Option<Color> {
        match color {
            &[g] => Color::from_rgba(g, g, g, 1.0),
            _ => None,
        }
    }

    fn components(&self) -> usize {
        1
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceRgb;

impl ColorSpace for DeviceRgb {
    fn to_color(&self, color: &[f32]) -> Option<Color> {
        match color {
            &[r, g, b] => Color::from_rgba(r, g, b, 1.0),
            _ => None,
        }
    }

    fn components(&self) -> usize {
        3
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceCmyk;

impl ColorSpace for DeviceCmyk {
    fn to_color(&self, color: &[f32]) -> Option<Color> {
        match color {
            &[c, m, y, k] => Color::from_rgba(
                (1.0 - c) * (1.0 - k),
                (1.0 - m) * (1.0 - k),
                (1.0 - y) * (1.0 - k),
                1.0,
            ),
            _ => None,
        }
    }

    fn components(&self) -> usize {
        4
    }
}
