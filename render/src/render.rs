//! Content stream interpreter. Executes operations against a pixmap,
//! owning the state stack, the pending path and the clip chain. Paths
//! are moved to device space before they reach the canvas, so every
//! canvas call passes an identity transform and shaders are composed
//! to device space as well.

use crate::{
    annot::AppearancePlacement,
    error::RenderError,
    glyph::GlyphCache,
    group::TransparencyGroup,
    into_skia::IntoSkia,
    shading::to_shader,
};
use educe::Educe;
use either::Either::{self, Left, Right};
use euclid::Transform2D;
use folio::{
    font::FontVariant,
    graphics::{
        shading::Shading,
        trans::{
            f_flip, image_to_user_space, logic_device_to_device, transform_width,
            ImageToDeviceSpace, IntoSkiaTransform, LogicDeviceToDeviceSpace, PatternSpace,
            PatternToLogicDeviceSpace, TextToUserSpace, UserToDeviceSpace, UserToLogicDeviceSpace,
            UserToUserSpace,
        },
        BlendMode, ColorSpec, LineCapStyle, LineJoinStyle, Operation, PaintSpec, Point, ShowGlyph,
        SoftMask, StateParams, TextRenderingMode, WindingRule,
    },
    image::{Image, ImageKind, Stencil},
    page::{FormStream, TilingPattern},
};
use image::RgbaImage;
use log::{debug, error, info, warn};
use std::{cell::Cell, mem, rc::Rc};
use tiny_skia::{
    Color as SkiaColor, ColorU8, FillRule, FilterQuality, IntSize, Mask, MaskType, Paint,
    Path as SkiaPath, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, StrokeDash, Transform,
};

/// Device floor for stroke widths, thinner strokes disappear.
const MIN_STROKE_WIDTH: f32 = 0.25;

/// Counter stamping clip chains. Shared by every state cloned from the
/// same render pass, so two different chains never carry the same stamp.
#[derive(Debug, Clone, Default)]
pub(crate) struct ClipSeq(Rc<Cell<u64>>);

impl ClipSeq {
    fn next(&self) -> u64 {
        let v = self.0.get() + 1;
        self.0.set(v);
        v
    }
}

#[derive(Debug, Clone)]
struct ClipNode {
    /// Device space path.
    path: SkiaPath,
    rule: FillRule,
    parent: Option<Rc<ClipNode>>,
}

/// Intersection chain of clip paths, in device space. `stamp` changes
/// whenever the region does, a restore brings the old stamp back.
#[derive(Debug, Clone)]
pub(crate) struct ClipPath {
    stamp: u64,
    /// Union of the chain's paths, filled when a paint covers the whole
    /// clip region.
    region: Rc<SkiaPath>,
    node: Rc<ClipNode>,
}

impl ClipPath {
    /// Intersect every path of the chain into `mask`.
    fn carve(&self, mask: &mut Mask) {
        let mut node = Some(&self.node);
        while let Some(n) = node {
            mask.intersect_path(&n.path, n.rule, true, Transform::identity());
            node = n.parent.as_ref();
        }
    }

    /// Device bounds of the chain, `None` when the chain intersects to
    /// nothing.
    pub(crate) fn bounds(&self) -> Option<Rect> {
        let mut r = self.node.path.bounds();
        let mut node = self.node.parent.as_ref();
        while let Some(n) = node {
            r = intersect_rects(&r, &n.path.bounds())?;
            node = n.parent.as_ref();
        }
        Some(r)
    }

    /// The same region in a canvas whose origin moved by `offset`,
    /// stamped fresh.
    pub(crate) fn translated(&self, seq: &ClipSeq, offset: (f32, f32)) -> Option<Self> {
        let ts = Transform::from_translate(offset.0, offset.1);
        let region = self.region.as_ref().clone().transform(ts)?;

        let mut chain = Vec::new();
        let mut node = Some(&self.node);
        while let Some(n) = node {
            chain.push(n);
            node = n.parent.as_ref();
        }
        let mut parent = None;
        for n in chain.into_iter().rev() {
            let path = n.path.clone().transform(ts)?;
            parent = Some(Rc::new(ClipNode {
                path,
                rule: n.rule,
                parent,
            }));
        }
        Some(Self {
            stamp: seq.next(),
            region: Rc::new(region),
            node: parent?,
        })
    }
}

pub(crate) fn intersect_rects(a: &Rect, b: &Rect) -> Option<Rect> {
    Rect::from_ltrb(
        a.left().max(b.left()),
        a.top().max(b.top()),
        a.right().min(b.right()),
        a.bottom().min(b.bottom()),
    )
}

/// Full coverage mask carved down by every path of the chain.
fn rasterize_clip(w: u32, h: u32, clip: &ClipPath) -> Option<Mask> {
    let mut mask = Mask::new(w, h)?;
    let full = PathBuilder::from_rect(Rect::from_xywh(0.0, 0.0, w as f32, h as f32)?);
    mask.fill_path(&full, FillRule::Winding, true, Transform::identity());
    clip.carve(&mut mask);
    Some(mask)
}

#[derive(Clone, Debug)]
enum PaintRepr {
    Color(SkiaColor),
    Shading {
        shading: Rc<Shading>,
        matrix: PatternToLogicDeviceSpace,
    },
    Tile {
        cell: Rc<Pixmap>,
        matrix: PatternToLogicDeviceSpace,
    },
}

#[derive(Debug, Clone, Educe)]
#[educe(Default)]
pub(crate) struct PaintState {
    #[educe(Default(expression = "PaintRepr::Color(SkiaColor::BLACK)"))]
    repr: PaintRepr,
    #[educe(Default = 1.0)]
    pub(crate) alpha: f32,
}

impl PaintState {
    fn create(&self, state: &State, anti_alias: bool) -> Paint<'_> {
        let mut r = Paint {
            blend_mode: state.blend_mode.into_skia(),
            anti_alias,
            ..Default::default()
        };
        match &self.repr {
            PaintRepr::Color(c) => {
                let mut c = *c;
                c.set_alpha(self.alpha);
                r.set_color(c);
            }
            PaintRepr::Shading { shading, matrix } => {
                let ts = matrix.then(&state.device);
                match to_shader(shading, ts.into_skia(), self.alpha) {
                    Some(shader) => r.shader = shader,
                    None => {
                        info!("degenerate shading paint, painting black");
                        let mut c = SkiaColor::BLACK;
                        c.set_alpha(self.alpha);
                        r.set_color(c);
                    }
                }
            }
            PaintRepr::Tile { cell, matrix } => {
                let cell: &Pixmap = cell;
                let ts = f_flip::<PatternSpace, PatternSpace>(cell.height() as f32)
                    .then(matrix)
                    .then(&state.device);
                r.shader = tiny_skia::Pattern::new(
                    cell.as_ref(),
                    tiny_skia::SpreadMode::Repeat,
                    FilterQuality::Bicubic,
                    self.alpha,
                    ts.into_skia(),
                );
            }
        }
        r
    }
}

/// Fall back to opaque black when the colorspace rejects the components.
fn resolve_color(spec: &ColorSpec) -> SkiaColor {
    spec.resolve().unwrap_or_else(|| {
        info!("invalid color {:?}, painting black", spec);
        SkiaColor::BLACK
    })
}

#[derive(Debug, Clone)]
pub(crate) struct State {
    pub(crate) device: LogicDeviceToDeviceSpace,
    pub(crate) ctm: UserToLogicDeviceSpace,
    pub(crate) user_to_device: UserToDeviceSpace,
    /// Cap, join, miter limit and the user space line width. Dash is
    /// kept raw, both move to device space in `device_stroke()`.
    stroke: Stroke,
    dash: Option<(Vec<f32>, f32)>,
    pub(crate) fill_paint: PaintState,
    pub(crate) stroke_paint: PaintState,
    pub(crate) blend_mode: BlendMode,
    pub(crate) soft_mask: SoftMask,
    render_mode: TextRenderingMode,
    pub(crate) clip: Option<ClipPath>,
    pub(crate) seq: ClipSeq,
}

impl State {
    pub(crate) fn new(device: LogicDeviceToDeviceSpace) -> Self {
        let mut r = Self {
            device,
            ctm: UserToLogicDeviceSpace::identity(),
            user_to_device: UserToDeviceSpace::identity(),
            stroke: Stroke::default(),
            dash: None,
            fill_paint: PaintState::default(),
            stroke_paint: PaintState::default(),
            blend_mode: BlendMode::default(),
            soft_mask: SoftMask::default(),
            render_mode: TextRenderingMode::default(),
            clip: None,
            seq: ClipSeq::default(),
        };

        r.set_line_cap(LineCapStyle::default());
        r.set_line_join(LineJoinStyle::default());
        r.set_miter_limit(10.0);
        r.update_user_to_device();
        r
    }

    fn update_user_to_device(&mut self) {
        self.user_to_device = self.ctm.then(&self.device);
        debug!("user_to_device to {:?}", self.user_to_device);
    }

    pub(crate) fn set_ctm(&mut self, ctm: UserToLogicDeviceSpace) {
        self.ctm = ctm;
        self.update_user_to_device();
    }

    fn concat_ctm(&mut self, m: UserToUserSpace) {
        self.ctm = m.then(&self.ctm);
        self.update_user_to_device();
    }

    fn set_line_width(&mut self, w: f32) {
        self.stroke.width = w;
    }

    fn set_line_cap(&mut self, cap: LineCapStyle) {
        self.stroke.line_cap = cap.into_skia();
    }

    fn set_line_join(&mut self, join: LineJoinStyle) {
        self.stroke.line_join = join.into_skia();
    }

    fn set_miter_limit(&mut self, limit: f32) {
        self.stroke.miter_limit = limit;
    }

    fn set_dash_pattern(&mut self, array: Vec<f32>, phase: f32) {
        self.dash = if array.is_empty() {
            None
        } else {
            Some((array, phase))
        };
    }

    fn apply_params(&mut self, params: &StateParams) {
        if let Some(w) = params.line_width {
            self.set_line_width(w);
        }
        if let Some(cap) = params.line_cap {
            self.set_line_cap(cap);
        }
        if let Some(join) = params.line_join {
            self.set_line_join(join);
        }
        if let Some(limit) = params.miter_limit {
            self.set_miter_limit(limit);
        }
        if let Some((array, phase)) = &params.dash_pattern {
            self.set_dash_pattern(array.clone(), *phase);
        }
        if let Some(alpha) = params.stroke_alpha {
            self.stroke_paint.alpha = alpha;
        }
        if let Some(alpha) = params.fill_alpha {
            self.fill_paint.alpha = alpha;
        }
        if let Some(mode) = params.blend_mode {
            self.blend_mode = mode;
        }
        if let Some(mask) = &params.soft_mask {
            self.soft_mask = mask.clone();
        }
    }

    /// Stroke parameters moved to device space. Paths given to the
    /// canvas are pre-transformed, tiny-skia must not scale the width
    /// again.
    pub(crate) fn device_stroke(&self) -> Stroke {
        let mut r = self.stroke.clone();
        r.width = transform_width(&self.user_to_device, self.stroke.width).max(MIN_STROKE_WIDTH);
        r.dash = self.dash.as_ref().and_then(|(array, phase)| {
            let (array, phase) = transform_dash(&self.user_to_device, array, *phase)?;
            StrokeDash::new(array, phase)
        });
        r
    }

    /// Intersect a device space path into the clip chain.
    pub(crate) fn push_clip(&mut self, path: SkiaPath, rule: FillRule) {
        let region = match &self.clip {
            None => path.clone(),
            Some(clip) => {
                let mut b = PathBuilder::new();
                b.push_path(&clip.region);
                b.push_path(&path);
                b.finish().unwrap()
            }
        };
        let parent = self.clip.as_ref().map(|c| c.node.clone());
        self.clip = Some(ClipPath {
            stamp: self.seq.next(),
            region: Rc::new(region),
            node: Rc::new(ClipNode { path, rule, parent }),
        });
    }

    fn image_transform(&self, img_w: u32, img_h: u32) -> ImageToDeviceSpace {
        image_to_user_space(img_w, img_h).then(&self.user_to_device)
    }
}

/// Dash lengths share the stroke width scalar. `None` when the pattern
/// degenerates to a solid line.
fn transform_dash(m: &UserToDeviceSpace, array: &[f32], phase: f32) -> Option<(Vec<f32>, f32)> {
    if array.is_empty() {
        return None;
    }

    let scale = transform_width(m, 1.0);
    let mut array: Vec<_> = array.iter().map(|v| v * scale).collect();
    let degenerate =
        array.iter().any(|v| !v.is_finite() || *v < 0.0) || array.iter().all(|v| *v == 0.0);
    if degenerate || !phase.is_finite() {
        return None;
    }
    // odd counts repeat the sequence
    if array.len() % 2 == 1 {
        array.extend_from_within(..);
    }
    Some((array, phase * scale))
}

#[derive(Debug, Clone, Educe)]
#[educe(Default)]
struct Path {
    #[educe(Default(expression = "Either::Left(PathBuilder::new())"))]
    path: Either<PathBuilder, SkiaPath>,
}

impl Path {
    fn path_builder(&mut self) -> &mut PathBuilder {
        self.path.as_mut().left().unwrap()
    }

    pub fn close_path(&mut self) {
        self.path_builder().close();
    }

    pub fn move_to(&mut self, p: Point) {
        self.path_builder().move_to(p.x, p.y);
    }

    /// Last point of the open subpath, `None` while the path is empty.
    pub fn current_point(&mut self) -> Option<Point> {
        self.path_builder()
            .last_point()
            .map(|p| Point::new(p.x, p.y))
    }

    /// Segments need a current point, stray ones are dropped.
    pub fn line_to(&mut self, p: Point) {
        if self.current_point().is_none() {
            warn!("line_to without current point");
            return;
        }
        self.path_builder().line_to(p.x, p.y);
    }

    pub fn curve_to(&mut self, p1: Point, p2: Point, p3: Point) {
        if self.current_point().is_none() {
            warn!("curve_to without current point");
            return;
        }
        self.path_builder()
            .cubic_to(p1.x, p1.y, p2.x, p2.y, p3.x, p3.y);
    }

    /// Rectangle as four explicit segments, the first edge running `p0`
    /// to `p1`.
    pub fn append_rect(&mut self, p0: Point, p1: Point, p2: Point, p3: Point) {
        let b = self.path_builder();
        b.move_to(p0.x, p0.y);
        b.line_to(p1.x, p1.y);
        b.line_to(p2.x, p2.y);
        b.line_to(p3.x, p3.y);
        b.close();
    }

    /// Build path and keep it until `reset()`, `None` if path is empty.
    pub fn finish(&mut self) -> Option<&SkiaPath> {
        if let Left(_) = self.path {
            let temp = Left(PathBuilder::new());
            let pb = mem::replace(&mut self.path, temp).left().unwrap();
            if let Some(p) = pb.finish() {
                self.path = Right(p);
            } else {
                debug!("empty or invalid path");
            }
        }

        match &self.path {
            Left(_) => None,
            Right(p) => Some(p),
        }
    }

    /// Drop the pending geometry, finished or still in the builder. A
    /// finished path donates its allocation back.
    pub fn reset(&mut self) {
        let p = mem::replace(&mut self.path, Left(PathBuilder::new()));
        if let Right(p) = p {
            self.path = Left(p.clear());
        }
    }
}

/// Zero area stand-in, masks everything off.
fn zero_path() -> SkiaPath {
    let mut b = PathBuilder::new();
    b.move_to(0.0, 0.0);
    b.line_to(0.0, 0.0);
    b.finish().unwrap()
}

/// Device quad of the user space unit square.
fn unit_quad(ts: &UserToDeviceSpace) -> Option<SkiaPath> {
    let mut b = PathBuilder::new();
    let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
    for (i, (x, y)) in corners.into_iter().enumerate() {
        let p = ts.transform_point((x, y).into());
        if i == 0 {
            b.move_to(p.x, p.y);
        } else {
            b.line_to(p.x, p.y);
        }
    }
    b.close();
    b.finish()
}

fn to_pixmap(img: &RgbaImage) -> Option<Pixmap> {
    let mut r = Pixmap::new(img.width(), img.height())?;
    for (dst, px) in r.pixels_mut().iter_mut().zip(img.pixels()) {
        let [red, green, blue, alpha] = px.0;
        *dst = ColorU8::from_rgba(red, green, blue, alpha).premultiply();
    }
    Some(r)
}

#[derive(Educe)]
#[educe(Debug)]
pub(crate) struct Render<'c> {
    canvas: &'c mut Pixmap,
    stack: Vec<State>,
    /// Restores may not unwind entries below this, sub-streams raise it
    /// for their run.
    floor: usize,
    path: Path,
    pending_clip: Option<WindingRule>,
    /// Last mask handed to the canvas, keyed by clip stamp.
    issued: Option<(u64, Rc<Mask>)>,
    #[educe(Debug(ignore))]
    glyphs: GlyphCache,
    text_matrix: TextToUserSpace,
    text_line_matrix: TextToUserSpace,
    text_clip: PathBuilder,
    text_clip_requested: bool,
}

impl<'c> Render<'c> {
    pub(crate) fn new(canvas: &'c mut Pixmap, state: State) -> Self {
        Self::with_glyphs(canvas, state, GlyphCache::new())
    }

    /// Offscreen sub-stream renders of the same pass adopt the pass
    /// cache instead of opening their own.
    pub(crate) fn with_glyphs(canvas: &'c mut Pixmap, state: State, glyphs: GlyphCache) -> Self {
        Self {
            canvas,
            stack: vec![state],
            floor: 1,
            path: Path::default(),
            pending_clip: None,
            issued: None,
            glyphs,
            text_matrix: TextToUserSpace::identity(),
            text_line_matrix: TextToUserSpace::identity(),
            text_clip: PathBuilder::new(),
            text_clip_requested: false,
        }
    }

    fn push(&mut self) {
        self.stack.push(self.stack.last().unwrap().clone());
    }

    fn pop(&mut self) -> Result<(), RenderError> {
        if self.stack.len() <= self.floor {
            return Err(RenderError::StateUnderflow);
        }
        self.stack.pop();
        Ok(())
    }

    fn state(&self) -> &State {
        self.stack.last().unwrap()
    }

    fn current_mut(&mut self) -> &mut State {
        self.stack.last_mut().unwrap()
    }

    /// Execute a complete sub-stream. The state depth is fenced: a
    /// restore inside cannot unwind frames pushed before this call, and
    /// frames left over at the end are dropped.
    pub(crate) fn run(&mut self, ops: &[Operation]) {
        let floor = mem::replace(&mut self.floor, self.stack.len());
        for op in ops {
            if let Err(e) = self.exec(op) {
                error!("abort sub-stream: {}", e);
                break;
            }
        }
        self.stack.truncate(self.floor);
        self.floor = floor;
    }

    pub(crate) fn exec(&mut self, op: &Operation) -> Result<(), RenderError> {
        debug!("handle operation: {:?}", op);
        match op {
            // General Graphics State Operations
            Operation::SetLineWidth(width) => self.current_mut().set_line_width(*width),
            Operation::SetLineCap(cap) => self.current_mut().set_line_cap(*cap),
            Operation::SetLineJoin(join) => self.current_mut().set_line_join(*join),
            Operation::SetMiterLimit(limit) => self.current_mut().set_miter_limit(*limit),
            Operation::SetDashPattern(array, phase) => {
                self.current_mut().set_dash_pattern(array.clone(), *phase)
            }
            Operation::SetGraphicsStateParameters(params) => {
                self.current_mut().apply_params(params)
            }

            // Special Graphics State Operations
            Operation::SaveGraphicsState => self.push(),
            Operation::RestoreGraphicsState => self.pop()?,
            Operation::ModifyCTM(m) => self.current_mut().concat_ctm(*m),

            // Path Construction Operations
            Operation::MoveToNext(p) => self.path.move_to(*p),
            Operation::LineToNext(p) => self.path.line_to(*p),
            Operation::AppendBezierCurve(p1, p2, p3) => self.path.curve_to(*p1, *p2, *p3),
            Operation::ClosePath => self.path.close_path(),
            Operation::AppendRectangle(p0, p1, p2, p3) => {
                self.path.append_rect(*p0, *p1, *p2, *p3)
            }

            // Path Painting Operations
            Operation::FillPath(rule) => self.fill_op(*rule),
            Operation::StrokePath => self.stroke_op(),
            Operation::FillAndStrokePath(rule) => self.fill_and_stroke_op(*rule),
            Operation::EndPath => self.end_path(),

            // Clipping Path Operations
            Operation::Clip(rule) => self.pending_clip = Some(*rule),

            // Color Operations
            Operation::SetFillPaint(spec) => self.set_paint(spec, false),
            Operation::SetStrokePaint(spec) => self.set_paint(spec, true),

            // Text Operations
            Operation::BeginText => self.begin_text(),
            Operation::EndText => self.end_text(),
            Operation::SetTextRenderingMode(mode) => self.current_mut().render_mode = *mode,
            Operation::ShowGlyph(sg) => self.show_glyph(sg),

            // XObject Operations
            Operation::DrawImage(image) => self.draw_image(image),
            Operation::ShowForm(form) => self.show_form(form),
            Operation::ShowTransparencyGroup(form) => self.show_group(form),

            // Shading Operation
            Operation::PaintShading(shading) => self.shading_op(shading),
        }
        Ok(())
    }

    /// Finish the pending path and move it to device space.
    fn device_path(&mut self) -> Option<SkiaPath> {
        let ts = self.state().user_to_device;
        let p = self.path.finish()?;
        p.clone().transform(ts.into_skia())
    }

    /// Mask for the next paint: the soft mask carved by the clip chain,
    /// or the cached clip mask alone. The clip mask is reused while the
    /// clip stamp is unchanged.
    fn paint_mask(&mut self) -> Result<Option<Rc<Mask>>, RenderError> {
        let (form, mask_type) = match self.state().soft_mask.clone() {
            SoftMask::None => return Ok(self.clip_mask()),
            SoftMask::Alpha(form) => (form, MaskType::Alpha),
            SoftMask::Luminosity(form) => (form, MaskType::Luminance),
            SoftMask::Other => return Err(RenderError::InvalidSoftMask),
        };

        let (w, h) = (self.canvas.width(), self.canvas.height());
        let glyphs = self.glyphs.clone();
        let Some(group) = TransparencyGroup::render(&form, self.state(), glyphs, w, h) else {
            warn!("soft mask aborted, painting with clip only");
            return Ok(self.clip_mask());
        };
        let Some(mut mask) = group.to_mask(w, h, mask_type) else {
            return Ok(self.clip_mask());
        };
        if let Some(clip) = &self.state().clip {
            clip.carve(&mut mask);
        }
        Ok(Some(Rc::new(mask)))
    }

    fn clip_mask(&mut self) -> Option<Rc<Mask>> {
        let clip = self.state().clip.clone()?;
        if let Some((stamp, mask)) = &self.issued {
            if *stamp == clip.stamp {
                return Some(mask.clone());
            }
        }
        let mask = Rc::new(rasterize_clip(
            self.canvas.width(),
            self.canvas.height(),
            &clip,
        )?);
        self.issued = Some((clip.stamp, mask.clone()));
        Some(mask)
    }

    fn fill_op(&mut self, rule: WindingRule) {
        match self.paint_mask() {
            Ok(mask) => {
                if let Some(p) = self.device_path() {
                    let state = self.stack.last().unwrap();
                    let paint = state.fill_paint.create(state, false);
                    self.canvas.fill_path(
                        &p,
                        &paint,
                        rule.into_skia(),
                        Transform::identity(),
                        mask.as_deref(),
                    );
                }
            }
            Err(e) => warn!("skip fill: {}", e),
        }
        self.path.reset();
    }

    fn stroke_op(&mut self) {
        match self.paint_mask() {
            Ok(mask) => {
                if let Some(p) = self.device_path() {
                    let state = self.stack.last().unwrap();
                    let paint = state.stroke_paint.create(state, false);
                    let stroke = state.device_stroke();
                    self.canvas.stroke_path(
                        &p,
                        &paint,
                        &stroke,
                        Transform::identity(),
                        mask.as_deref(),
                    );
                } else {
                    debug!("stroke: empty or invalid path");
                }
            }
            Err(e) => warn!("skip stroke: {}", e),
        }
        self.path.reset();
    }

    /// Fill and stroke share one finished path, the geometry is
    /// identical for both paints.
    fn fill_and_stroke_op(&mut self, rule: WindingRule) {
        match self.paint_mask() {
            Ok(mask) => {
                if let Some(p) = self.device_path() {
                    let state = self.stack.last().unwrap();
                    let paint = state.fill_paint.create(state, false);
                    self.canvas.fill_path(
                        &p,
                        &paint,
                        rule.into_skia(),
                        Transform::identity(),
                        mask.as_deref(),
                    );
                    let paint = state.stroke_paint.create(state, false);
                    let stroke = state.device_stroke();
                    self.canvas.stroke_path(
                        &p,
                        &paint,
                        &stroke,
                        Transform::identity(),
                        mask.as_deref(),
                    );
                }
            }
            Err(e) => warn!("skip fill and stroke: {}", e),
        }
        self.path.reset();
    }

    /// Realize a pending clip with the finished path. An empty path at
    /// this point clips everything out.
    fn end_path(&mut self) {
        if let Some(rule) = self.pending_clip.take() {
            let path = self.device_path().unwrap_or_else(zero_path);
            self.current_mut().push_clip(path, rule.into_skia());
        }
        self.path.reset();
    }

    fn set_paint(&mut self, spec: &PaintSpec, stroke: bool) {
        let repr = match spec {
            PaintSpec::Color(color) => PaintRepr::Color(resolve_color(color)),
            PaintSpec::Shading { shading, matrix } => PaintRepr::Shading {
                shading: shading.clone(),
                matrix: *matrix,
            },
            PaintSpec::Tiling { pattern, color } => {
                let color = color.as_ref().map(resolve_color);
                match self.render_tile(pattern, color) {
                    Some(repr) => repr,
                    None => return,
                }
            }
        };
        let state = self.current_mut();
        let paint = if stroke {
            &mut state.stroke_paint
        } else {
            &mut state.fill_paint
        };
        paint.repr = repr;
    }

    /// Render one pattern cell to an offscreen pixmap. The cell runs as
    /// its own render pass with a fresh state, one device pixel per
    /// pattern space unit.
    fn render_tile(
        &mut self,
        pattern: &TilingPattern,
        color: Option<SkiaColor>,
    ) -> Option<PaintRepr> {
        let b_box = pattern.b_box;
        if !(pattern.x_step > 0.0
            && pattern.y_step > 0.0
            && b_box.width() > 0.0
            && b_box.height() > 0.0)
        {
            warn!("degenerate tiling pattern, keeping previous paint");
            return None;
        }
        let (w, h) = (pattern.x_step.ceil() as u64, pattern.y_step.ceil() as u64);
        if w * h > 1024 * 1024 * 16 {
            warn!("tiling cell too large: {}x{}", w, h);
            return None;
        }

        let mut cell = Pixmap::new(w as u32, h as u32)?;
        let mut state = State::new(logic_device_to_device(pattern.y_step, 1.0));
        state.concat_ctm(UserToUserSpace::translation(-b_box.left_x, -b_box.lower_y));
        let clip = PathBuilder::from_rect(b_box.into_skia());
        if let Some(clip) = clip.transform(state.user_to_device.into_skia()) {
            state.push_clip(clip, FillRule::Winding);
        }
        if let Some(color) = color {
            state.fill_paint.repr = PaintRepr::Color(color);
            state.stroke_paint.repr = PaintRepr::Color(color);
        }

        let mut render = Render::with_glyphs(&mut cell, state, self.glyphs.clone());
        render.run(&pattern.ops);
        drop(render);

        let matrix =
            Transform2D::translation(b_box.left_x, b_box.lower_y).then(&pattern.matrix);
        Some(PaintRepr::Tile {
            cell: Rc::new(cell),
            matrix,
        })
    }

    /// Fill the whole current clip region with the shading, bypassing
    /// the issued-mask cache for this one paint.
    fn shading_op(&mut self, shading: &Shading) {
        let state = self.state();
        let ts = state.user_to_device;
        let alpha = state.fill_paint.alpha;
        let Some(shader) = to_shader(shading, ts.into_skia(), alpha) else {
            info!("degenerate shading, skipped");
            return;
        };
        let paint = Paint {
            shader,
            blend_mode: state.blend_mode.into_skia(),
            anti_alias: true,
            ..Default::default()
        };

        let (w, h) = (self.canvas.width(), self.canvas.height());
        match self.stack.last().unwrap().clip.clone() {
            Some(clip) => {
                let Some(mask) = rasterize_clip(w, h, &clip) else {
                    return;
                };
                self.canvas.fill_path(
                    &clip.region,
                    &paint,
                    FillRule::Winding,
                    Transform::identity(),
                    Some(&mask),
                );
            }
            None => {
                let Some(rect) = Rect::from_xywh(0.0, 0.0, w as f32, h as f32) else {
                    return;
                };
                self.canvas.fill_rect(rect, &paint, Transform::identity(), None);
            }
        }
        self.issued = None;
    }

    fn begin_text(&mut self) {
        self.text_matrix = TextToUserSpace::identity();
        self.text_line_matrix = TextToUserSpace::identity();
        self.text_clip = PathBuilder::new();
        self.text_clip_requested = false;
    }

    /// Glyph clip outlines accumulate over the text object and
    /// intersect the clip chain once, here. A clip-requesting object
    /// that produced no outline clips everything out.
    fn end_text(&mut self) {
        let requested = mem::take(&mut self.text_clip_requested);
        let clip = mem::replace(&mut self.text_clip, PathBuilder::new());
        if !requested {
            return;
        }
        let path = clip.finish().unwrap_or_else(zero_path);
        self.current_mut().push_clip(path, FillRule::Winding);
    }

    fn show_glyph(&mut self, sg: &ShowGlyph) {
        self.text_matrix = sg.matrix;
        match &sg.font.variant {
            FontVariant::Type3(glyphs) => match glyphs.proc(sg.code) {
                Some(proc) => self.show_type3(sg, proc),
                None => warn!("type3 glyph {} has no procedure", sg.code),
            },
            _ => self.show_outline(sg),
        }
        self.text_matrix =
            Transform2D::translation(sg.displacement.x, sg.displacement.y).then(&self.text_matrix);
    }

    /// Run a glyph procedure as a sub-stream on this canvas. The text
    /// registers survive the reentry, everything else is bracketed.
    fn show_type3(&mut self, sg: &ShowGlyph, ops: &[Operation]) {
        let text_matrix = self.text_matrix;
        let text_line_matrix = self.text_line_matrix;

        self.push();
        let state = self.current_mut();
        let ctm = sg
            .font
            .glyph_to_text
            .then(&sg.matrix)
            .then(&state.ctm)
            .with_source();
        state.set_ctm(ctm);
        self.run(ops);
        self.stack.pop();

        self.text_matrix = text_matrix;
        self.text_line_matrix = text_line_matrix;
    }

    fn show_outline(&mut self, sg: &ShowGlyph) {
        let mode = self.state().render_mode;
        if !mode.is_fill() && !mode.is_stroke() && !mode.is_clip() {
            return;
        }
        // the request stands even if no outline comes out of this glyph
        if mode.is_clip() {
            self.text_clip_requested = true;
        }

        let outline = match self.glyphs.outline(&sg.font, sg.code) {
            Ok(Some(p)) => p,
            Ok(None) => return,
            Err(e) => {
                warn!("{}", e);
                return;
            }
        };
        let ts = sg
            .font
            .glyph_to_text
            .then(&sg.matrix)
            .then(&self.state().user_to_device);
        let Some(path) = outline.transform(ts.into_skia()) else {
            warn!("glyph {} outline transform failed", sg.code);
            return;
        };

        if mode.is_fill() || mode.is_stroke() {
            match self.paint_mask() {
                Ok(mask) => {
                    let state = self.stack.last().unwrap();
                    if mode.is_fill() {
                        let paint = state.fill_paint.create(state, true);
                        self.canvas.fill_path(
                            &path,
                            &paint,
                            FillRule::Winding,
                            Transform::identity(),
                            mask.as_deref(),
                        );
                    }
                    if mode.is_stroke() {
                        let paint = state.stroke_paint.create(state, true);
                        let stroke = state.device_stroke();
                        self.canvas.stroke_path(
                            &path,
                            &paint,
                            &stroke,
                            Transform::identity(),
                            mask.as_deref(),
                        );
                    }
                }
                Err(e) => warn!("skip glyph paint: {}", e),
            }
        }

        if mode.is_clip() {
            self.text_clip.push_path(&path);
        }
    }

    fn draw_image(&mut self, image: &Image) {
        match &image.kind {
            ImageKind::Rgba(img) => self.draw_rgba(img, image.interpolate),
            ImageKind::Stencil(stencil) => self.draw_stencil(stencil),
        }
    }

    fn draw_rgba(&mut self, img: &RgbaImage, interpolate: bool) {
        let mask = match self.paint_mask() {
            Ok(mask) => mask,
            Err(e) => {
                warn!("skip image: {}", e);
                return;
            }
        };
        let Some(pixmap) = to_pixmap(img) else {
            warn!("empty image");
            return;
        };
        let quality = if interpolate {
            FilterQuality::Bilinear
        } else {
            FilterQuality::Nearest
        };

        let state = self.stack.last().unwrap();
        let ts = state.image_transform(pixmap.width(), pixmap.height());
        if !matches!(state.soft_mask, SoftMask::None) {
            // the pixmap blit does not weigh source alpha by the mask,
            // paint the placement quad with the image as shader instead
            let paint = Paint {
                shader: tiny_skia::Pattern::new(
                    pixmap.as_ref(),
                    tiny_skia::SpreadMode::Pad,
                    quality,
                    state.fill_paint.alpha,
                    ts.into_skia(),
                ),
                blend_mode: state.blend_mode.into_skia(),
                anti_alias: true,
                ..Default::default()
            };
            if let Some(quad) = unit_quad(&state.user_to_device) {
                self.canvas.fill_path(
                    &quad,
                    &paint,
                    FillRule::Winding,
                    Transform::identity(),
                    mask.as_deref(),
                );
            }
            return;
        }

        let paint = PixmapPaint {
            opacity: state.fill_paint.alpha,
            blend_mode: state.blend_mode.into_skia(),
            quality,
        };
        self.canvas
            .draw_pixmap(0, 0, pixmap.as_ref(), &paint, ts.into_skia(), mask.as_deref());
    }

    /// Stencil marks become coverage: expanded to an opaque buffer,
    /// placed like an image, then the canvas is filled with the fill
    /// paint through that coverage, weighed by the clip and soft mask.
    fn draw_stencil(&mut self, stencil: &Stencil) {
        let paint_mask = match self.paint_mask() {
            Ok(mask) => mask,
            Err(e) => {
                warn!("skip stencil: {}", e);
                return;
            }
        };
        let Some(mut marks) = Pixmap::new(stencil.width(), stencil.height()) else {
            warn!("empty stencil");
            return;
        };
        let opaque = ColorU8::from_rgba(255, 255, 255, 255).premultiply();
        let w = stencil.width();
        let pixels = marks.pixels_mut();
        for y in 0..stencil.height() {
            for x in 0..w {
                if stencil.marked(x, y) {
                    pixels[(y * w + x) as usize] = opaque;
                }
            }
        }

        let (cw, ch) = (self.canvas.width(), self.canvas.height());
        let Some(mut coverage) = Pixmap::new(cw, ch) else {
            return;
        };
        let state = self.stack.last().unwrap();
        coverage.draw_pixmap(
            0,
            0,
            marks.as_ref(),
            &PixmapPaint {
                quality: FilterQuality::Nearest,
                ..Default::default()
            },
            state
                .image_transform(stencil.width(), stencil.height())
                .into_skia(),
            None,
        );
        let mut mask = Mask::from_pixmap(coverage.as_ref(), MaskType::Alpha);
        if let Some(pm) = &paint_mask {
            let data = mask
                .data()
                .iter()
                .zip(pm.data())
                .map(|(c, m)| (u16::from(*c) * u16::from(*m) / 255) as u8)
                .collect();
            let Some(size) = IntSize::from_wh(cw, ch) else {
                return;
            };
            let Some(combined) = Mask::from_vec(data, size) else {
                return;
            };
            mask = combined;
        }

        let paint = state.fill_paint.create(state, true);
        let Some(rect) = Rect::from_xywh(0.0, 0.0, cw as f32, ch as f32) else {
            return;
        };
        self.canvas
            .fill_rect(rect, &paint, Transform::identity(), Some(&mask));
    }

    /// Form brackets: cloned state, the form matrix onto the ctm, a
    /// clip to the form's bounding box, then the ops run fenced.
    fn show_form(&mut self, form: &FormStream) {
        self.push();
        let state = self.current_mut();
        let ctm = form.matrix.then(&state.ctm).with_source();
        state.set_ctm(ctm);
        let clip = PathBuilder::from_rect(form.b_box.into_skia());
        if let Some(clip) = clip.transform(state.user_to_device.into_skia()) {
            state.push_clip(clip, FillRule::Winding);
        }
        self.run(&form.ops);
        self.stack.pop();
    }

    /// Offscreen group: rendered isolated, composited back as a fitted
    /// image under the outer alpha, blend mode and soft mask.
    fn show_group(&mut self, form: &FormStream) {
        let mask = match self.paint_mask() {
            Ok(mask) => mask,
            Err(e) => {
                warn!("skip transparency group: {}", e);
                return;
            }
        };
        let (w, h) = (self.canvas.width(), self.canvas.height());
        let glyphs = self.glyphs.clone();
        let state = self.stack.last().unwrap();
        let Some(group) = TransparencyGroup::render(form, state, glyphs, w, h) else {
            return;
        };
        group.draw(self.canvas, state, mask.as_deref());
    }

    /// Run an annotation appearance bracketed: the canvas origin moves
    /// by the placement translation, the placement matrix becomes the
    /// ctm, the annotation rectangle clips.
    pub(crate) fn run_annotation(&mut self, placement: &AppearancePlacement, ops: &[Operation]) {
        self.push();
        let state = self.current_mut();
        state.device = Transform2D::translation(placement.translation.x, placement.translation.y)
            .then(&state.device);
        state.set_ctm(placement.ctm.with_source().with_destination());
        let clip = PathBuilder::from_rect(placement.clip.into_skia());
        if let Some(clip) = clip.transform(state.user_to_device.into_skia()) {
            state.push_clip(clip, FillRule::Winding);
        }
        self.run(ops);
        self.stack.pop();
    }
}

#[cfg(test)]
mod tests;
