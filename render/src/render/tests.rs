use super::*;
use assert_approx_eq::assert_approx_eq;
use folio::{
    font::{Font, FontId, GlyphSource, PathSink, Type3Glyphs},
    graphics::{
        color_space::DeviceRgb,
        shading::{Axial, Extend},
        trans::{FormToUserSpace, GlyphToTextSpace},
        Rectangle,
    },
};
use test_case::test_case;
use test_log::test;
use tiny_skia::PathSegment;

fn new_state() -> State {
    State::new(LogicDeviceToDeviceSpace::identity())
}

fn rect_points(r: Rectangle) -> [Point; 4] {
    [
        r.left_lower(),
        Point::new(r.right_x, r.lower_y),
        r.right_upper(),
        Point::new(r.left_x, r.upper_y),
    ]
}

fn append_rect(r: &mut Render<'_>, rect: Rectangle) {
    let [p0, p1, p2, p3] = rect_points(rect);
    r.exec(&Operation::AppendRectangle(p0, p1, p2, p3)).unwrap();
}

fn fill_rect(r: &mut Render<'_>, rect: Rectangle) {
    append_rect(r, rect);
    r.exec(&Operation::FillPath(WindingRule::NonZero)).unwrap();
}

fn clip_rect(r: &mut Render<'_>, rect: Rectangle) {
    append_rect(r, rect);
    r.exec(&Operation::Clip(WindingRule::NonZero)).unwrap();
    r.exec(&Operation::EndPath).unwrap();
}

fn rgb_fill(red: f32, green: f32, blue: f32) -> Operation {
    Operation::SetFillPaint(PaintSpec::Color(ColorSpec::new(
        Rc::new(DeviceRgb),
        &[red, green, blue],
    )))
}

fn rgb_stroke(red: f32, green: f32, blue: f32) -> Operation {
    Operation::SetStrokePaint(PaintSpec::Color(ColorSpec::new(
        Rc::new(DeviceRgb),
        &[red, green, blue],
    )))
}

fn alpha_at(canvas: &Pixmap, x: u32, y: u32) -> u8 {
    canvas.pixel(x, y).unwrap().alpha()
}

#[test_case(&[3.0, 3.0], 1.0, 2.0 => Some((vec![6.0, 6.0], 2.0)); "scaled with the width")]
#[test_case(&[2.0], 0.0, 1.0 => Some((vec![2.0, 2.0], 0.0)); "odd count doubled")]
#[test_case(&[], 0.0, 1.0 => None; "empty is solid")]
#[test_case(&[0.0, 0.0], 0.0, 1.0 => None; "all zero is solid")]
#[test_case(&[-1.0, 2.0], 0.0, 1.0 => None; "negative is solid")]
#[test_case(&[1.0, 1.0], f32::INFINITY, 1.0 => None; "infinite phase is solid")]
fn dash_to_device(array: &[f32], phase: f32, scale: f32) -> Option<(Vec<f32>, f32)> {
    transform_dash(&UserToDeviceSpace::scale(scale, scale), array, phase)
}

#[test]
fn stroke_width_has_device_floor() {
    let mut state = new_state();
    state.set_line_width(0.0);
    assert_eq!(state.device_stroke().width, MIN_STROKE_WIDTH);
    state.set_line_width(0.1);
    assert_eq!(state.device_stroke().width, MIN_STROKE_WIDTH);
    state.set_line_width(4.0);
    assert_eq!(state.device_stroke().width, 4.0);
}

#[test]
fn stroke_width_transformed_to_device() {
    let mut state = State::new(logic_device_to_device(100u32, 2.0));
    state.set_line_width(3.0);
    assert_eq!(state.device_stroke().width, 6.0);
}

#[test]
fn stroke_width_invariant_under_rotation() {
    let m: UserToDeviceSpace = Transform2D::rotation(euclid::Angle::degrees(90.0));
    assert_approx_eq!(transform_width(&m, 3.0), 3.0, 1e-4);
}

#[test]
fn append_rect_first_edge_is_p0_to_p1() {
    let mut p = Path::default();
    p.append_rect(
        Point::new(5.0, 1.0),
        Point::new(5.0, 9.0),
        Point::new(2.0, 9.0),
        Point::new(2.0, 1.0),
    );
    let path = p.finish().unwrap();
    let mut segments = path.segments();
    assert_eq!(
        segments.next(),
        Some(PathSegment::MoveTo(tiny_skia::Point::from_xy(5.0, 1.0)))
    );
    assert_eq!(
        segments.next(),
        Some(PathSegment::LineTo(tiny_skia::Point::from_xy(5.0, 9.0)))
    );
}

#[test]
fn current_point_tracks_open_subpath() {
    let mut p = Path::default();
    assert_eq!(p.current_point(), None);
    p.move_to(Point::new(2.0, 3.0));
    assert_eq!(p.current_point(), Some(Point::new(2.0, 3.0)));
    p.line_to(Point::new(7.0, 3.0));
    assert_eq!(p.current_point(), Some(Point::new(7.0, 3.0)));
}

#[test]
fn segments_require_current_point() {
    let mut p = Path::default();
    p.line_to(Point::new(3.0, 3.0));
    p.curve_to(
        Point::new(1.0, 1.0),
        Point::new(2.0, 2.0),
        Point::new(3.0, 0.0),
    );
    assert!(p.finish().is_none());
}

#[test]
fn concat_ctm_applies_before_existing() {
    let mut canvas = Pixmap::new(4, 4).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    r.exec(&Operation::ModifyCTM(UserToUserSpace::translation(
        10.0, 0.0,
    )))
    .unwrap();
    r.exec(&Operation::ModifyCTM(UserToUserSpace::scale(2.0, 2.0)))
        .unwrap();
    let p = r
        .state()
        .user_to_device
        .transform_point((1.0, 1.0).into());
    assert_eq!((p.x, p.y), (12.0, 2.0));
}

#[test]
fn save_restore_restores_parameters() {
    let mut canvas = Pixmap::new(4, 4).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    r.exec(&Operation::SetLineWidth(5.0)).unwrap();
    r.exec(&Operation::SaveGraphicsState).unwrap();
    r.exec(&Operation::SetLineWidth(9.0)).unwrap();
    r.exec(&Operation::SetGraphicsStateParameters(StateParams {
        fill_alpha: Some(0.5),
        ..Default::default()
    }))
    .unwrap();
    assert_eq!(r.state().fill_paint.alpha, 0.5);
    r.exec(&Operation::RestoreGraphicsState).unwrap();
    assert_eq!(r.state().stroke.width, 5.0);
    assert_eq!(r.state().fill_paint.alpha, 1.0);
}

#[test]
fn restore_brings_back_clip_stamp() {
    let mut canvas = Pixmap::new(20, 20).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    clip_rect(&mut r, Rectangle::from_lbrt(2.0, 2.0, 10.0, 10.0));
    let outer = r.state().clip.clone().unwrap();

    r.exec(&Operation::SaveGraphicsState).unwrap();
    clip_rect(&mut r, Rectangle::from_lbrt(4.0, 4.0, 8.0, 8.0));
    let inner = r.state().clip.clone().unwrap();
    assert_ne!(inner.stamp, outer.stamp);
    // nesting only shrinks
    let b = inner.bounds().unwrap();
    assert_eq!((b.left(), b.top(), b.right(), b.bottom()), (4.0, 4.0, 8.0, 8.0));

    r.exec(&Operation::RestoreGraphicsState).unwrap();
    let restored = r.state().clip.clone().unwrap();
    assert_eq!(restored.stamp, outer.stamp);
    assert!(Rc::ptr_eq(&restored.region, &outer.region));
}

/// Paint operators leave a pending clip armed, only `EndPath` realizes
/// it, with whatever path is pending at that point.
#[test]
fn pending_clip_realized_by_end_path_only() {
    let mut canvas = Pixmap::new(20, 20).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    append_rect(&mut r, Rectangle::from_lbrt(2.0, 2.0, 10.0, 10.0));
    r.exec(&Operation::Clip(WindingRule::EvenOdd)).unwrap();
    r.exec(&Operation::FillPath(WindingRule::NonZero)).unwrap();
    assert!(r.state().clip.is_none());
    assert_eq!(r.pending_clip, Some(WindingRule::EvenOdd));

    append_rect(&mut r, Rectangle::from_lbrt(4.0, 4.0, 8.0, 8.0));
    r.exec(&Operation::EndPath).unwrap();
    assert!(r.pending_clip.is_none());
    let clip = r.state().clip.clone().unwrap();
    assert_eq!(clip.node.rule, FillRule::EvenOdd);
    let b = clip.bounds().unwrap();
    assert_eq!((b.left(), b.top(), b.right(), b.bottom()), (4.0, 4.0, 8.0, 8.0));
}

/// `EndPath` consumes the pending path even when no clip is pending, a
/// later paint operator must find nothing to paint.
#[test]
fn end_path_discards_pending_geometry() {
    let mut canvas = Pixmap::new(12, 12).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    r.exec(&rgb_fill(1.0, 0.0, 0.0)).unwrap();
    r.exec(&Operation::MoveToNext(Point::new(0.0, 0.0))).unwrap();
    r.exec(&Operation::LineToNext(Point::new(10.0, 0.0))).unwrap();
    r.exec(&Operation::LineToNext(Point::new(10.0, 10.0))).unwrap();
    r.exec(&Operation::ClosePath).unwrap();
    r.exec(&Operation::EndPath).unwrap();
    r.exec(&Operation::FillPath(WindingRule::NonZero)).unwrap();
    drop(r);
    assert!(canvas.data().iter().all(|b| *b == 0));
}

#[test]
fn reset_clears_unfinished_builder() {
    let mut p = Path::default();
    p.move_to(Point::new(1.0, 1.0));
    p.line_to(Point::new(5.0, 1.0));
    p.reset();
    assert!(p.finish().is_none());
}

#[test]
fn end_path_with_empty_path_clips_everything() {
    let mut canvas = Pixmap::new(10, 10).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    r.exec(&Operation::Clip(WindingRule::NonZero)).unwrap();
    r.exec(&Operation::EndPath).unwrap();
    fill_rect(&mut r, Rectangle::from_lbrt(0.0, 0.0, 10.0, 10.0));
    drop(r);
    assert!(canvas.data().iter().all(|b| *b == 0));
}

#[test]
fn underflow_aborts_substream_only() {
    let mut canvas = Pixmap::new(10, 10).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    r.exec(&Operation::SaveGraphicsState).unwrap();

    // the second restore would unwind past the sub-stream's floor
    r.run(&[
        Operation::SaveGraphicsState,
        Operation::RestoreGraphicsState,
        Operation::RestoreGraphicsState,
        Operation::SetLineWidth(9.0),
    ]);
    assert_eq!(r.stack.len(), 2);
    assert_eq!(r.state().stroke.width, 1.0);

    r.exec(&Operation::RestoreGraphicsState).unwrap();
    assert_eq!(r.stack.len(), 1);
    assert!(r.exec(&Operation::RestoreGraphicsState).is_err());
}

#[test]
fn clip_mask_reissued_only_on_new_stamp() {
    let mut canvas = Pixmap::new(20, 20).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    clip_rect(&mut r, Rectangle::from_lbrt(2.0, 2.0, 8.0, 8.0));
    let first = r.clip_mask().unwrap();
    let again = r.clip_mask().unwrap();
    assert!(Rc::ptr_eq(&first, &again));

    clip_rect(&mut r, Rectangle::from_lbrt(3.0, 3.0, 7.0, 7.0));
    let shrunk = r.clip_mask().unwrap();
    assert!(!Rc::ptr_eq(&again, &shrunk));
}

#[test]
fn shading_fill_bypasses_and_invalidates_mask_cache() {
    let shading = Rc::new(Shading::Axial(Axial {
        start: Point::new(0.0, 0.0),
        end: Point::new(10.0, 0.0),
        extend: Extend::new(true, true),
        stops: vec![(0.0, SkiaColor::BLACK), (1.0, SkiaColor::WHITE)],
    }));
    let mut canvas = Pixmap::new(10, 10).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    clip_rect(&mut r, Rectangle::from_lbrt(2.0, 2.0, 8.0, 8.0));
    let before = r.clip_mask().unwrap();

    r.exec(&Operation::PaintShading(shading)).unwrap();
    assert!(r.issued.is_none());
    let after = r.clip_mask().unwrap();
    assert!(!Rc::ptr_eq(&before, &after));
    assert_eq!(before.data(), after.data());
    drop(r);

    assert_eq!(alpha_at(&canvas, 5, 5), 255);
    assert_eq!(alpha_at(&canvas, 1, 1), 0);
}

#[test]
fn fill_and_stroke_share_geometry() {
    let tri = [
        Point::new(3.0, 3.0),
        Point::new(13.0, 3.0),
        Point::new(13.0, 11.0),
    ];
    let build = |r: &mut Render<'_>| {
        r.exec(&Operation::MoveToNext(tri[0])).unwrap();
        r.exec(&Operation::LineToNext(tri[1])).unwrap();
        r.exec(&Operation::LineToNext(tri[2])).unwrap();
        r.exec(&Operation::ClosePath).unwrap();
    };

    let mut combined = Pixmap::new(16, 16).unwrap();
    let mut r = Render::new(&mut combined, new_state());
    r.exec(&rgb_fill(1.0, 0.0, 0.0)).unwrap();
    r.exec(&rgb_stroke(0.0, 0.0, 1.0)).unwrap();
    build(&mut r);
    r.exec(&Operation::FillAndStrokePath(WindingRule::NonZero))
        .unwrap();
    drop(r);

    let mut separate = Pixmap::new(16, 16).unwrap();
    let mut r = Render::new(&mut separate, new_state());
    r.exec(&rgb_fill(1.0, 0.0, 0.0)).unwrap();
    r.exec(&rgb_stroke(0.0, 0.0, 1.0)).unwrap();
    build(&mut r);
    r.exec(&Operation::FillPath(WindingRule::NonZero)).unwrap();
    build(&mut r);
    r.exec(&Operation::StrokePath).unwrap();
    drop(r);

    assert_eq!(combined.data(), separate.data());
}

/// Outlines the glyph space unit square for every glyph.
#[derive(Debug)]
struct SquareSource;

impl GlyphSource for SquareSource {
    fn outline(&self, _glyph: u16, sink: &mut dyn PathSink) -> anyhow::Result<()> {
        sink.move_to(Point::new(0.0, 0.0));
        sink.line_to(Point::new(1.0, 0.0));
        sink.line_to(Point::new(1.0, 1.0));
        sink.line_to(Point::new(0.0, 1.0));
        sink.close();
        Ok(())
    }
}

fn square_font(id: u64) -> Rc<Font> {
    Rc::new(Font {
        id: FontId(id),
        glyph_to_text: GlyphToTextSpace::identity(),
        variant: FontVariant::TrueType(Box::new(SquareSource)),
    })
}

fn show(font: Rc<Font>, matrix: TextToUserSpace) -> Operation {
    Operation::ShowGlyph(ShowGlyph {
        matrix,
        font,
        code: 5,
        displacement: Point::new(1.0, 0.0),
    })
}

#[test]
fn glyph_filled_with_fill_paint() {
    let mut canvas = Pixmap::new(8, 8).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    r.exec(&rgb_fill(1.0, 0.0, 0.0)).unwrap();
    r.exec(&Operation::BeginText).unwrap();
    let matrix = TextToUserSpace::scale(4.0, 4.0).then_translate((2.0, 2.0).into());
    r.exec(&show(square_font(1), matrix)).unwrap();
    r.exec(&Operation::EndText).unwrap();
    drop(r);

    let px = canvas.pixel(4, 4).unwrap();
    assert_eq!((px.red(), px.alpha()), (255, 255));
    assert_eq!(alpha_at(&canvas, 1, 1), 0);
}

#[test]
fn invisible_text_paints_nothing() {
    let mut canvas = Pixmap::new(8, 8).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    r.exec(&Operation::BeginText).unwrap();
    r.exec(&Operation::SetTextRenderingMode(
        TextRenderingMode::Invisible,
    ))
    .unwrap();
    let matrix = TextToUserSpace::scale(4.0, 4.0).then_translate((2.0, 2.0).into());
    r.exec(&show(square_font(1), matrix)).unwrap();
    r.exec(&Operation::EndText).unwrap();
    assert!(r.state().clip.is_none());
    drop(r);
    assert!(canvas.data().iter().all(|b| *b == 0));
}

#[test]
fn text_clip_intersects_at_end_text() {
    let mut canvas = Pixmap::new(12, 12).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    r.exec(&Operation::BeginText).unwrap();
    r.exec(&Operation::SetTextRenderingMode(TextRenderingMode::Clip))
        .unwrap();
    let matrix = TextToUserSpace::scale(4.0, 4.0).then_translate((2.0, 2.0).into());
    r.exec(&show(square_font(1), matrix)).unwrap();
    // nothing intersected while the text object is open
    assert!(r.state().clip.is_none());
    r.exec(&Operation::EndText).unwrap();
    let b = r.state().clip.as_ref().unwrap().bounds().unwrap();
    assert_eq!((b.left(), b.top(), b.right(), b.bottom()), (2.0, 2.0, 6.0, 6.0));

    fill_rect(&mut r, Rectangle::from_lbrt(0.0, 0.0, 12.0, 12.0));
    drop(r);
    assert_eq!(alpha_at(&canvas, 4, 4), 255);
    assert_eq!(alpha_at(&canvas, 9, 9), 0);
}

/// Writes no outline for any glyph.
#[derive(Debug)]
struct EmptySource;

impl GlyphSource for EmptySource {
    fn outline(&self, _glyph: u16, _sink: &mut dyn PathSink) -> anyhow::Result<()> {
        Ok(())
    }
}

#[test]
fn clip_text_without_outline_masks_everything() {
    let font = Rc::new(Font {
        id: FontId(2),
        glyph_to_text: GlyphToTextSpace::identity(),
        variant: FontVariant::TrueType(Box::new(EmptySource)),
    });
    let mut canvas = Pixmap::new(8, 8).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    r.exec(&Operation::BeginText).unwrap();
    r.exec(&Operation::SetTextRenderingMode(TextRenderingMode::Clip))
        .unwrap();
    r.exec(&show(font, TextToUserSpace::identity())).unwrap();
    r.exec(&Operation::EndText).unwrap();

    fill_rect(&mut r, Rectangle::from_lbrt(0.0, 0.0, 8.0, 8.0));
    drop(r);
    assert!(canvas.data().iter().all(|b| *b == 0));
}

#[test]
fn type3_reentry_preserves_text_registers() {
    let mut procs: ahash::HashMap<u32, Rc<[Operation]>> = ahash::HashMap::default();
    procs.insert(1, vec![Operation::BeginText, Operation::EndText].into());
    let font = Rc::new(Font {
        id: FontId(7),
        glyph_to_text: GlyphToTextSpace::scale(0.01, 0.01),
        variant: FontVariant::Type3(Type3Glyphs::new(procs)),
    });

    let mut canvas = Pixmap::new(8, 8).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    r.exec(&Operation::BeginText).unwrap();
    r.exec(&Operation::ShowGlyph(ShowGlyph {
        matrix: TextToUserSpace::translation(5.0, 7.0),
        font,
        code: 1,
        displacement: Point::new(2.0, 0.0),
    }))
    .unwrap();
    assert_eq!(r.text_matrix, TextToUserSpace::translation(7.0, 7.0));
    assert_eq!(r.stack.len(), 1);
    r.exec(&Operation::EndText).unwrap();
}

#[test]
fn form_clipped_to_bbox_and_state_restored() {
    let mut ops = vec![rgb_fill(1.0, 0.0, 0.0)];
    let [p0, p1, p2, p3] = rect_points(Rectangle::from_lbrt(0.0, 0.0, 20.0, 20.0));
    ops.push(Operation::AppendRectangle(p0, p1, p2, p3));
    ops.push(Operation::FillPath(WindingRule::NonZero));
    let form = Rc::new(FormStream {
        b_box: Rectangle::from_lbrt(0.0, 0.0, 4.0, 4.0),
        matrix: FormToUserSpace::identity(),
        ops: ops.into_boxed_slice(),
    });

    let mut canvas = Pixmap::new(10, 10).unwrap();
    let mut r = Render::new(&mut canvas, new_state());
    r.exec(&Operation::ShowForm(form)).unwrap();
    assert_eq!(r.stack.len(), 1);
    assert!(r.state().clip.is_none());
    drop(r);
    assert_eq!(alpha_at(&canvas, 2, 2), 255);
    assert_eq!(alpha_at(&canvas, 6, 6), 0);
}

#[test]
fn image_row_zero_lands_at_top() {
    let mut img = RgbaImage::new(2, 2);
    for x in 0..2 {
        img.put_pixel(x, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(x, 1, image::Rgba([0, 0, 255, 255]));
    }
    let mut canvas = Pixmap::new(4, 4).unwrap();
    let mut r = Render::new(&mut canvas, State::new(logic_device_to_device(4u32, 1.0)));
    r.exec(&Operation::ModifyCTM(UserToUserSpace::scale(4.0, 4.0)))
        .unwrap();
    r.exec(&Operation::DrawImage(Rc::new(Image {
        kind: ImageKind::Rgba(img),
        interpolate: false,
    })))
    .unwrap();
    drop(r);

    let top = canvas.pixel(1, 0).unwrap();
    assert_eq!((top.red(), top.blue()), (255, 0));
    let bottom = canvas.pixel(1, 3).unwrap();
    assert_eq!((bottom.red(), bottom.blue()), (0, 255));
}

#[test]
fn stencil_recolored_with_fill_paint() {
    // only the (0, 0) sample marked, zero marks
    let stencil = Stencil::new(2, 2, false, vec![0x7F, 0xFF]).unwrap();
    let mut canvas = Pixmap::new(2, 2).unwrap();
    let mut r = Render::new(&mut canvas, State::new(logic_device_to_device(2u32, 1.0)));
    r.exec(&Operation::ModifyCTM(UserToUserSpace::scale(2.0, 2.0)))
        .unwrap();
    r.exec(&rgb_fill(1.0, 0.0, 0.0)).unwrap();
    r.exec(&Operation::DrawImage(Rc::new(Image {
        kind: ImageKind::Stencil(stencil),
        interpolate: false,
    })))
    .unwrap();
    drop(r);

    let marked = canvas.pixel(0, 0).unwrap();
    assert_eq!((marked.red(), marked.alpha()), (255, 255));
    assert_eq!(alpha_at(&canvas, 1, 1), 0);
}

/// Stencil covering the whole canvas, every sample marked.
fn full_stencil() -> Rc<Image> {
    Rc::new(Image {
        kind: ImageKind::Stencil(Stencil::new(2, 2, false, vec![0x00, 0x00]).unwrap()),
        interpolate: false,
    })
}

/// Luminosity mask lit on the left half of the unit square.
fn half_lit_mask() -> SoftMask {
    let mut ops = vec![rgb_fill(1.0, 1.0, 1.0)];
    let [p0, p1, p2, p3] = rect_points(Rectangle::from_lbrt(0.0, 0.0, 0.5, 1.0));
    ops.push(Operation::AppendRectangle(p0, p1, p2, p3));
    ops.push(Operation::FillPath(WindingRule::NonZero));
    SoftMask::Luminosity(Rc::new(FormStream {
        b_box: Rectangle::from_lbrt(0.0, 0.0, 1.0, 1.0),
        matrix: FormToUserSpace::identity(),
        ops: ops.into_boxed_slice(),
    }))
}

#[test]
fn stencil_weighed_by_soft_mask() {
    let mut canvas = Pixmap::new(4, 4).unwrap();
    let mut r = Render::new(&mut canvas, State::new(logic_device_to_device(4u32, 1.0)));
    r.exec(&Operation::ModifyCTM(UserToUserSpace::scale(4.0, 4.0)))
        .unwrap();
    r.exec(&Operation::SetGraphicsStateParameters(StateParams {
        soft_mask: Some(half_lit_mask()),
        ..Default::default()
    }))
    .unwrap();
    r.exec(&rgb_fill(1.0, 0.0, 0.0)).unwrap();
    r.exec(&Operation::DrawImage(full_stencil())).unwrap();
    drop(r);

    let lit = canvas.pixel(1, 2).unwrap();
    assert!(
        lit.red() >= 250 && lit.alpha() >= 250,
        "lit pixel not red: {:?}",
        lit
    );
    assert_eq!(alpha_at(&canvas, 3, 2), 0);
}

#[test]
fn stencil_skipped_on_unknown_soft_mask() {
    let mut canvas = Pixmap::new(4, 4).unwrap();
    let mut r = Render::new(&mut canvas, State::new(logic_device_to_device(4u32, 1.0)));
    r.exec(&Operation::ModifyCTM(UserToUserSpace::scale(4.0, 4.0)))
        .unwrap();
    r.exec(&Operation::SetGraphicsStateParameters(StateParams {
        soft_mask: Some(SoftMask::Other),
        ..Default::default()
    }))
    .unwrap();
    r.exec(&rgb_fill(1.0, 0.0, 0.0)).unwrap();
    r.exec(&Operation::DrawImage(full_stencil())).unwrap();
    drop(r);
    assert!(canvas.data().iter().all(|b| *b == 0));
}

#[test]
fn stencil_confined_by_clip() {
    let mut canvas = Pixmap::new(4, 4).unwrap();
    let mut r = Render::new(&mut canvas, State::new(logic_device_to_device(4u32, 1.0)));
    clip_rect(&mut r, Rectangle::from_lbrt(0.0, 0.0, 2.0, 4.0));
    r.exec(&Operation::ModifyCTM(UserToUserSpace::scale(4.0, 4.0)))
        .unwrap();
    r.exec(&rgb_fill(1.0, 0.0, 0.0)).unwrap();
    r.exec(&Operation::DrawImage(full_stencil())).unwrap();
    drop(r);

    assert_eq!(alpha_at(&canvas, 1, 2), 255);
    assert_eq!(alpha_at(&canvas, 3, 2), 0);
}

#[test]
fn to_pixmap_premultiplies() {
    let mut img = RgbaImage::new(1, 1);
    img.put_pixel(0, 0, image::Rgba([255, 0, 0, 128]));
    let pm = to_pixmap(&img).unwrap();
    let px = pm.pixel(0, 0).unwrap();
    assert_eq!(px.alpha(), 128);
    assert!((127..=129).contains(&px.red()));
}

#[test]
fn invalid_color_falls_back_to_black() {
    let spec = ColorSpec::new(Rc::new(DeviceRgb), &[2.0, 0.0, 0.0]);
    assert_eq!(resolve_color(&spec), SkiaColor::BLACK);
}
