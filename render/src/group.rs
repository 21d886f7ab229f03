//! Offscreen compositor for transparency groups. A group renders its
//! sub-stream isolated into a buffer sized to the group's effective
//! clip, then the buffer comes back as a fitted image, or as the alpha
//! or luminosity source of a soft mask.

use crate::{
    glyph::GlyphCache,
    into_skia::IntoSkia,
    render::{intersect_rects, Render, State},
};
use euclid::Transform2D;
use folio::{
    graphics::{
        trans::{image_to_user_space, IntoSkiaTransform, UserToLogicDeviceSpace},
        BlendMode, SoftMask,
    },
    page::FormStream,
};
use log::{debug, warn};
use tiny_skia::{
    FillRule, FilterQuality, Mask, MaskType, PathBuilder, Pixmap, PixmapPaint, Rect, Transform,
};

pub(crate) struct TransparencyGroup {
    buffer: Pixmap,
    /// Canvas pixel of the buffer's upper-left corner.
    origin: (i32, i32),
    /// Places the buffer as a user space unit square, composed with the
    /// outer device transform at draw time.
    matrix: UserToLogicDeviceSpace,
}

impl TransparencyGroup {
    /// Render `form` isolated into an offscreen buffer. The buffer
    /// covers the integer pixel rect of the effective clip, the
    /// intersection of the current clip and the form's bounding box.
    /// `None` when that rect is empty or the placement is not
    /// invertible.
    pub(crate) fn render(
        form: &FormStream,
        state: &State,
        glyphs: GlyphCache,
        canvas_width: u32,
        canvas_height: u32,
    ) -> Option<Self> {
        let mut inner = state.clone();
        let ctm = form.matrix.then(&inner.ctm).with_source();
        inner.set_ctm(ctm);
        let b_box = PathBuilder::from_rect(form.b_box.into_skia());
        let b_box = b_box.transform(inner.user_to_device.into_skia())?;
        inner.push_clip(b_box, FillRule::Winding);

        // pixels outside the canvas can never show, the canvas extent
        // bounds the buffer like an outermost clip
        let canvas = Rect::from_xywh(0.0, 0.0, canvas_width as f32, canvas_height as f32)?;
        let bounds = inner.clip.as_ref()?.bounds()?;
        let Some(bounds) = intersect_rects(&bounds, &canvas) else {
            debug!("transparency group clipped to nothing");
            return None;
        };
        let min_x = bounds.left().floor() as i32;
        let min_y = bounds.top().floor() as i32;
        let max_x = bounds.right().floor() as i32 + 1;
        let max_y = bounds.bottom().floor() as i32 + 1;
        let mut buffer = Pixmap::new((max_x - min_x) as u32, (max_y - min_y) as u32)?;

        let offset = (-(min_x as f32), -(min_y as f32));
        inner.device = inner.device.then_translate(offset.into());
        let ctm = inner.ctm;
        inner.set_ctm(ctm);
        let clip = inner.clip.take()?;
        inner.clip = Some(clip.translated(&inner.seq, offset)?);

        // isolated: outer alpha, blend and soft mask apply at paint
        // back, not while the group renders
        inner.blend_mode = BlendMode::Normal;
        inner.fill_paint.alpha = 1.0;
        inner.stroke_paint.alpha = 1.0;
        inner.soft_mask = SoftMask::None;

        let Some(inverse) = inner.device.inverse() else {
            warn!("transparency group transform not invertible, skipped");
            return None;
        };
        let unit = Transform2D::translation(0.0, -1.0)
            .then_scale(buffer.width() as f32, -(buffer.height() as f32));
        let matrix: UserToLogicDeviceSpace = unit.then(&inverse);

        let mut render = Render::with_glyphs(&mut buffer, inner, glyphs);
        render.run(&form.ops);
        drop(render);

        Some(Self {
            buffer,
            origin: (min_x, min_y),
            matrix,
        })
    }

    /// Paint the buffer back under the outer state's alpha, blend mode
    /// and resolved soft mask. The placement lands pixels 1:1 at the
    /// integer origin.
    pub(crate) fn draw(&self, canvas: &mut Pixmap, state: &State, mask: Option<&Mask>) {
        let ts = image_to_user_space(self.buffer.width(), self.buffer.height())
            .then(&self.matrix)
            .then(&state.device);
        let paint = PixmapPaint {
            opacity: state.fill_paint.alpha,
            blend_mode: state.blend_mode.into_skia(),
            quality: FilterQuality::Nearest,
        };
        canvas.draw_pixmap(0, 0, self.buffer.as_ref(), &paint, ts.into_skia(), mask);
    }

    /// Full canvas mask from the buffer's alpha or luminance, the
    /// buffer placed at its integer origin. Pixels outside the group
    /// stay transparent, which reads as zero in both modes.
    pub(crate) fn to_mask(
        &self,
        canvas_width: u32,
        canvas_height: u32,
        mask_type: MaskType,
    ) -> Option<Mask> {
        let mut full = Pixmap::new(canvas_width, canvas_height)?;
        full.draw_pixmap(
            self.origin.0,
            self.origin.1,
            self.buffer.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
        Some(Mask::from_pixmap(full.as_ref(), mask_type))
    }
}
