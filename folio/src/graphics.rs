//! Graphics model consumed by the renderer: geometry, state parameters,
//! paint sources, and the operation set of a content stream.
//!
//! Operations arrive pre-parsed: names, dictionaries and streams are
//! already resolved to model values by the document layer.

use crate::{
    font::Font,
    image::Image,
    page::{FormStream, TilingPattern},
};
use smallvec::SmallVec;
use std::rc::Rc;
use tiny_skia::Color;

pub mod color_space;
pub mod shading;
pub mod trans;

use self::{
    color_space::ColorSpace,
    shading::Shading,
    trans::{PatternToLogicDeviceSpace, TextToUserSpace, UserToUserSpace},
};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl<U> From<Point> for euclid::Point2D<f32, U> {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Rectangle {
    pub left_x: f32,
    pub lower_y: f32,
    pub right_x: f32,
    pub upper_y: f32,
}

impl Rectangle {
    /// From left, bottom, right, top, re-order them to make sure that
    /// left <= right, bottom <= top
    pub fn from_lbrt(left_x: f32, bottom_y: f32, right_x: f32, top_y: f32) -> Self {
        Self {
            left_x: left_x.min(right_x),
            lower_y: bottom_y.min(top_y),
            right_x: left_x.max(right_x),
            upper_y: bottom_y.max(top_y),
        }
    }

    pub fn from_xywh(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self::from_lbrt(x, y, x + w, y + h)
    }

    pub fn width(&self) -> f32 {
        self.right_x - self.left_x
    }

    pub fn height(&self) -> f32 {
        self.upper_y - self.lower_y
    }

    pub fn left_lower(&self) -> Point {
        Point::new(self.left_x, self.lower_y)
    }

    pub fn right_upper(&self) -> Point {
        Point::new(self.right_x, self.upper_y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindingRule {
    #[default]
    NonZero,
    EvenOdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LineCapStyle {
    #[default]
    Butt = 0,
    Round = 1,
    Square = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LineJoinStyle {
    #[default]
    Miter = 0,
    Round = 1,
    Bevel = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TextRenderingMode {
    #[default]
    Fill = 0,
    Stroke = 1,
    FillAndStroke = 2,
    Invisible = 3,
    FillAndClip = 4,
    StrokeAndClip = 5,
    FillStrokeAndClip = 6,
    Clip = 7,
}

impl TextRenderingMode {
    pub fn is_fill(self) -> bool {
        matches!(
            self,
            Self::Fill | Self::FillAndStroke | Self::FillAndClip | Self::FillStrokeAndClip
        )
    }

    pub fn is_stroke(self) -> bool {
        matches!(
            self,
            Self::Stroke | Self::FillAndStroke | Self::StrokeAndClip | Self::FillStrokeAndClip
        )
    }

    pub fn is_clip(self) -> bool {
        matches!(
            self,
            Self::FillAndClip | Self::StrokeAndClip | Self::FillStrokeAndClip | Self::Clip
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

/// A color value paired with the colorspace interpreting it.
#[derive(Debug, Clone)]
pub struct ColorSpec {
    pub space: Rc<dyn ColorSpace>,
    pub components: SmallVec<[f32; 4]>,
}

impl ColorSpec {
    pub fn new(space: Rc<dyn ColorSpace>, components: &[f32]) -> Self {
        Self {
            space,
            components: SmallVec::from_slice(components),
        }
    }

    /// `None` if the colorspace rejects the component values.
    pub fn resolve(&self) -> Option<Color> {
        self.space.to_color(&self.components)
    }
}

/// Paint source installed by color operations, consumed on fill/stroke.
#[derive(Debug, Clone)]
pub enum PaintSpec {
    Color(ColorSpec),
    /// `color` set for uncolored patterns, painted in that color.
    Tiling {
        pattern: Rc<TilingPattern>,
        color: Option<ColorSpec>,
    },
    /// `matrix` anchors the shading to base coordinates, not the ctm
    /// at paint time.
    Shading {
        shading: Rc<Shading>,
        matrix: PatternToLogicDeviceSpace,
    },
}

#[derive(Debug, Clone, Default)]
pub enum SoftMask {
    /// Explicit reset, no mask applies.
    #[default]
    None,
    /// Alpha channel of the rendered group.
    Alpha(Rc<FormStream>),
    /// Grayscale rendering of the group's color channels.
    Luminosity(Rc<FormStream>),
    /// Subtype the document layer could not interpret.
    Other,
}

/// Resolved graphics state parameter set, fields absent from the source
/// dictionary are `None`.
#[derive(Debug, Clone, Default)]
pub struct StateParams {
    pub line_width: Option<f32>,
    pub line_cap: Option<LineCapStyle>,
    pub line_join: Option<LineJoinStyle>,
    pub miter_limit: Option<f32>,
    pub dash_pattern: Option<(Vec<f32>, f32)>,
    pub stroke_alpha: Option<f32>,
    pub fill_alpha: Option<f32>,
    pub blend_mode: Option<BlendMode>,
    pub soft_mask: Option<SoftMask>,
}

/// One positioned glyph of a text showing operation. `matrix` is the text
/// matrix already advanced to this glyph by the document layer.
#[derive(Debug, Clone)]
pub struct ShowGlyph {
    pub matrix: TextToUserSpace,
    pub font: Rc<Font>,
    pub code: u32,
    /// Advance to the next glyph origin, in unscaled text space.
    pub displacement: Point,
}

#[derive(Debug, Clone)]
pub enum Operation {
    // Graphics State Operations
    SetLineWidth(f32),
    SetLineCap(LineCapStyle),
    SetLineJoin(LineJoinStyle),
    SetMiterLimit(f32),
    SetDashPattern(Vec<f32>, f32),
    SetGraphicsStateParameters(StateParams),
    SaveGraphicsState,
    RestoreGraphicsState,
    ModifyCTM(UserToUserSpace),

    // Path Construction Operations
    MoveToNext(Point),
    LineToNext(Point),
    AppendBezierCurve(Point, Point, Point),
    ClosePath,
    AppendRectangle(Point, Point, Point, Point),

    // Path Painting Operations
    FillPath(WindingRule),
    StrokePath,
    FillAndStrokePath(WindingRule),
    EndPath,

    // Clipping Path Operations
    Clip(WindingRule),

    // Color Operations
    SetFillPaint(PaintSpec),
    SetStrokePaint(PaintSpec),

    // Text Operations
    BeginText,
    EndText,
    SetTextRenderingMode(TextRenderingMode),
    ShowGlyph(ShowGlyph),

    // XObject Operations
    DrawImage(Rc<Image>),
    ShowForm(Rc<FormStream>),
    ShowTransparencyGroup(Rc<FormStream>),

    // Shading Operation
    PaintShading(Rc<Shading>),
}
