//! Coordinate space tags and transforms between them: CTM, glyph/text
//! matrices, image and pattern placement, user space to device pixels.

use euclid::Transform2D;
use num_traits::AsPrimitive;

pub enum UserSpace {}
/// Space between UserSpace and DeviceSpace, the target of the content
/// stream's ctm. Device independent, y-axis up.
pub enum LogicDeviceSpace {}
/// Canvas pixels, y-axis down.
pub enum DeviceSpace {}
pub enum ImageSpace {}
pub enum TextSpace {}
pub enum FormSpace {}
/// Glyph outline units, `units_per_em` box for outline fonts.
pub enum GlyphSpace {}
pub enum PatternSpace {}

pub type UserToUserSpace = Transform2D<f32, UserSpace, UserSpace>;
pub type UserToLogicDeviceSpace = Transform2D<f32, UserSpace, LogicDeviceSpace>;
pub type UserToDeviceSpace = Transform2D<f32, UserSpace, DeviceSpace>;
pub type LogicDeviceToDeviceSpace = Transform2D<f32, LogicDeviceSpace, DeviceSpace>;
pub type ImageToUserSpace = Transform2D<f32, ImageSpace, UserSpace>;
pub type ImageToDeviceSpace = Transform2D<f32, ImageSpace, DeviceSpace>;
pub type ImageToLogicDeviceSpace = Transform2D<f32, ImageSpace, LogicDeviceSpace>;
pub type TextToUserSpace = Transform2D<f32, TextSpace, UserSpace>;
pub type FormToUserSpace = Transform2D<f32, FormSpace, UserSpace>;
pub type GlyphToTextSpace = Transform2D<f32, GlyphSpace, TextSpace>;
pub type GlyphToDeviceSpace = Transform2D<f32, GlyphSpace, DeviceSpace>;
pub type PatternToLogicDeviceSpace = Transform2D<f32, PatternSpace, LogicDeviceSpace>;

/// Convert current object into tiny_skia `Transform`.
pub trait IntoSkiaTransform {
    fn into_skia(self) -> tiny_skia::Transform;
}

impl<S, D> IntoSkiaTransform for Transform2D<f32, S, D> {
    fn into_skia(self) -> tiny_skia::Transform {
        tiny_skia::Transform::from_row(self.m11, self.m12, self.m21, self.m22, self.m31, self.m32)
    }
}

/// Flip y-axis and apply zoom, content streams use left-bottom as origin.
pub fn logic_device_to_device(
    logic_device_height: impl AsPrimitive<f32>,
    zoom: f32,
) -> LogicDeviceToDeviceSpace {
    Transform2D::scale(zoom, -zoom).then_translate((0.0, logic_device_height.as_() * zoom).into())
}

/// Return a transform convert space to device space.
pub fn to_device_space<S>(
    logic_device_height: impl AsPrimitive<f32>,
    zoom: f32,
    to_logic_device: &Transform2D<f32, S, LogicDeviceSpace>,
) -> Transform2D<f32, S, DeviceSpace> {
    to_logic_device.then(&logic_device_to_device(logic_device_height, zoom))
}

/// Return a transform from image space to user space.
/// The image (width, height) map to User space (1, 1), row 0 at the top.
pub fn image_to_user_space(img_w: u32, img_h: u32) -> ImageToUserSpace {
    Transform2D::scale(1.0 / img_w as f32, -1.0 / img_h as f32).then_translate((0.0, 1.0).into())
}

pub fn image_to_device_space(
    img_w: u32,
    img_h: u32,
    ctm: &UserToLogicDeviceSpace,
    logic_device_to_device: &LogicDeviceToDeviceSpace,
) -> ImageToDeviceSpace {
    image_to_user_space(img_w, img_h)
        .then(ctm)
        .then(logic_device_to_device)
}

/// Flip y-axis inside a box of `height` units, used to map y-down pixel
/// buffers into y-up spaces and back.
pub fn f_flip<S, D>(height: f32) -> Transform2D<f32, S, D> {
    Transform2D::scale(1.0, -1.0).then_translate((0.0, height).into())
}

/// Transform a scalar width by the matrix, root-mean-square of the two
/// axis scales. Used for stroke widths and dash lengths.
pub fn transform_width<S, D>(m: &Transform2D<f32, S, D>, width: f32) -> f32 {
    let x = m.m11 + m.m21;
    let y = m.m12 + m.m22;
    width * ((x * x + y * y) * 0.5).sqrt()
}
