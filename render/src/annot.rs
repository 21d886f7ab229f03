//! Annotation appearance placement: fits the appearance's bounding box
//! through its own matrix onto the annotation rectangle, split into the
//! ctm, a canvas origin shift and a clip for the sub-stream.

use euclid::{Box2D, Transform2D};
use folio::graphics::{
    trans::{FormToUserSpace, UserSpace},
    Point, Rectangle,
};
use log::warn;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AppearancePlacement {
    /// Fitted matrix with its translation removed, installed as the
    /// sub-stream's ctm.
    pub(crate) ctm: FormToUserSpace,
    /// The removed translation, moves the canvas origin for the run.
    pub(crate) translation: Point,
    /// Annotation rectangle in the moved origin, clips the run.
    pub(crate) clip: Rectangle,
}

impl AppearancePlacement {
    /// Map `b_box` through `matrix`, take the axis-aligned bounds of
    /// the result and fit them onto `rect`. `None` when the transformed
    /// box collapses, such an annotation is skipped.
    pub(crate) fn compute(
        rect: &Rectangle,
        b_box: &Rectangle,
        matrix: FormToUserSpace,
    ) -> Option<Self> {
        let corners = [
            (b_box.left_x, b_box.lower_y),
            (b_box.right_x, b_box.lower_y),
            (b_box.right_x, b_box.upper_y),
            (b_box.left_x, b_box.upper_y),
        ];
        let quad: Box2D<f32, UserSpace> =
            Box2D::from_points(corners.map(|(x, y)| matrix.transform_point((x, y).into())));
        if !(quad.width() > 0.0 && quad.height() > 0.0)
            || !quad.width().is_finite()
            || !quad.height().is_finite()
        {
            warn!("appearance box collapses under its matrix, annotation skipped");
            return None;
        }

        let fit: Transform2D<f32, UserSpace, UserSpace> =
            Transform2D::translation(-quad.min.x, -quad.min.y)
                .then_scale(rect.width() / quad.width(), rect.height() / quad.height())
                .then_translate((rect.left_x, rect.lower_y).into());
        let aa = matrix.then(&fit);
        let translation = Point::new(aa.m31, aa.m32);
        let ctm = FormToUserSpace::new(aa.m11, aa.m12, aa.m21, aa.m22, 0.0, 0.0);
        let clip = Rectangle::from_xywh(
            rect.left_x - translation.x,
            rect.lower_y - translation.y,
            rect.width(),
            rect.height(),
        );
        Some(Self {
            ctm,
            translation,
            clip,
        })
    }
}
