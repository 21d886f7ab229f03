use folio::graphics::{BlendMode, LineCapStyle, LineJoinStyle, Point, Rectangle, WindingRule};

pub trait IntoSkia {
    type Output;
    fn into_skia(self) -> Self::Output;
}

impl IntoSkia for Point {
    type Output = tiny_skia::Point;

    fn into_skia(self) -> Self::Output {
        Self::Output::from_xy(self.x, self.y)
    }
}

impl IntoSkia for Rectangle {
    type Output = tiny_skia::Rect;

    fn into_skia(self) -> Self::Output {
        Self::Output::from_ltrb(self.left_x, self.lower_y, self.right_x, self.upper_y).unwrap()
    }
}

impl IntoSkia for LineCapStyle {
    type Output = tiny_skia::LineCap;

    fn into_skia(self) -> Self::Output {
        match self {
            Self::Butt => Self::Output::Butt,
            Self::Round => Self::Output::Round,
            Self::Square => Self::Output::Square,
        }
    }
}

impl IntoSkia for LineJoinStyle {
    type Output = tiny_skia::LineJoin;

    fn into_skia(self) -> Self::Output {
        match self {
            Self::Miter => Self::Output::Miter,
            Self::Round => Self::Output::Round,
            Self::Bevel => Self::Output::Bevel,
        }
    }
}

impl IntoSkia for WindingRule {
    type Output = tiny_skia::FillRule;

    fn into_skia(self) -> Self::Output {
        match self {
            Self::NonZero => Self::Output::Winding,
            Self::EvenOdd => Self::Output::EvenOdd,
        }
    }
}

impl IntoSkia for BlendMode {
    type Output = tiny_skia::BlendMode;

    fn into_skia(self) -> Self::Output {
        match self {
            Self::Normal => Self::Output::SourceOver,
            Self::Multiply => Self::Output::Multiply,
            Self::Screen => Self::Output::Screen,
            Self::Overlay => Self::Output::Overlay,
            Self::Darken => Self::Output::Darken,
            Self::Lighten => Self::Output::Lighten,
            Self::ColorDodge => Self::Output::ColorDodge,
            Self::ColorBurn => Self::Output::ColorBurn,
            Self::HardLight => Self::Output::HardLight,
            Self::SoftLight => Self::Output::SoftLight,
            Self::Difference => Self::Output::Difference,
            Self::Exclusion => Self::Output::Exclusion,
            Self::Hue => Self::Output::Hue,
            Self::Saturation => Self::Output::Saturation,
            Self::Color => Self::Output::Color,
            Self::Luminosity => Self::Output::Luminosity,
        }
    }
}
