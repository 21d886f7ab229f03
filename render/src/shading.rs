//! Conversion of gradient models to tiny-skia shaders. Stops arrive
//! pre-sampled, geometry is interpreted in the space `transform` maps from.

use crate::into_skia::IntoSkia;
use folio::graphics::shading::{Axial, Radial, Shading};
use tiny_skia::{
    Color, GradientStop, LinearGradient, RadialGradient, Shader, SpreadMode, Transform,
};

/// `None` when the geometry is degenerate and paints nothing.
pub fn to_shader(shading: &Shading, transform: Transform, alpha: f32) -> Option<Shader<'static>> {
    match shading {
        Shading::Axial(axial) => axial_to_shader(axial, transform, alpha),
        Shading::Radial(radial) => radial_to_shader(radial, transform, alpha),
    }
}

fn axial_to_shader(axial: &Axial, transform: Transform, alpha: f32) -> Option<Shader<'static>> {
    if axial.start == axial.end {
        return None;
    }

    LinearGradient::new(
        axial.start.into_skia(),
        axial.end.into_skia(),
        stops_to_skia(&axial.stops, alpha),
        SpreadMode::Pad,
        transform,
    )
}

fn radial_to_shader(radial: &Radial, transform: Transform, alpha: f32) -> Option<Shader<'static>> {
    if (radial.start.r == 0.0 && radial.end.r == 0.0) || radial.start.r < 0. || radial.end.r < 0. {
        return None;
    }

    RadialGradient::new(
        radial.start.point.into_skia(),
        radial.end.point.into_skia(),
        radial.start.r.max(radial.end.r),
        stops_to_skia(&radial.stops, alpha),
        SpreadMode::Pad,
        transform,
    )
}

fn stops_to_skia(stops: &[(f32, Color)], alpha: f32) -> Vec<GradientStop> {
    stops
        .iter()
        .map(|(t, c)| {
            let mut c = *c;
            c.set_alpha(alpha);
            GradientStop::new(*t, c)
        })
        .collect()
}
