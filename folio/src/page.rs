//! Page level model: content, reusable sub-streams, annotations.

use crate::graphics::{
    trans::{FormToUserSpace, PatternToLogicDeviceSpace},
    Operation, Rectangle,
};
use std::rc::Rc;

/// Self-contained content sub-stream with its own coordinate system,
/// shown as a plain form, a transparency group, or a soft mask source.
#[derive(Debug, Clone)]
pub struct FormStream {
    pub b_box: Rectangle,
    pub matrix: FormToUserSpace,
    pub ops: Box<[Operation]>,
}

/// Pattern cell content, tiled over the painted area. `matrix` maps
/// pattern space to the base space of the stream the pattern is used
/// from, not to the user space current when painting.
#[derive(Debug, Clone)]
pub struct TilingPattern {
    pub b_box: Rectangle,
    pub x_step: f32,
    pub y_step: f32,
    pub matrix: PatternToLogicDeviceSpace,
    pub ops: Box<[Operation]>,
}

#[derive(Debug, Clone)]
pub struct Annotation {
    /// Target rectangle on the page, in user space.
    pub rect: Rectangle,
    /// Normal appearance already selected by the document layer, `None`
    /// if the annotation has none.
    pub appearance: Option<Rc<FormStream>>,
    pub hidden: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub width: f32,
    pub height: f32,
    pub content: Vec<Operation>,
    pub annotations: Vec<Annotation>,
}
