//! Gradient definitions resolved by the document layer: geometry in user
//! space plus pre-sampled color stops.

use super::Point;
use tiny_skia::Color;

/// Whether the gradient paints beyond its start/end geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extend(bool, bool);

impl Extend {
    pub fn new(begin: bool, end: bool) -> Self {
        Self(begin, end)
    }

    pub fn begin(self) -> bool {
        self.0
    }

    pub fn end(self) -> bool {
        self.1
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialCircle {
    pub point: Point,
    pub r: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axial {
    pub start: Point,
    pub end: Point,
    pub extend: Extend,
    pub stops: Vec<(f32, Color)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Radial {
    pub start: RadialCircle,
    pub end: RadialCircle,
    pub extend: Extend,
    pub stops: Vec<(f32, Color)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shading {
    Axial(Axial),
    Radial(Radial),
}
