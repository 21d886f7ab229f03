//! Glyph outline resolution, cached per font identity for one render
//! pass. Procedural glyphs never reach this layer, the interpreter runs
//! them as sub-streams.

use crate::error::RenderError;
use ahash::{HashMap, HashSet};
use folio::{
    font::{CidDescendant, Font, FontId, FontVariant, PathSink},
    graphics::Point,
};
use log::warn;
use std::{cell::RefCell, rc::Rc};
use tiny_skia::{Path as SkiaPath, PathBuilder};

pub(crate) struct SkiaPathSink(PathBuilder);

impl SkiaPathSink {
    fn new() -> Self {
        Self(PathBuilder::new())
    }

    fn into_inner(self) -> PathBuilder {
        self.0
    }
}

impl PathSink for SkiaPathSink {
    #[inline]
    fn move_to(&mut self, to: Point) {
        self.0.move_to(to.x, to.y);
    }

    #[inline]
    fn line_to(&mut self, to: Point) {
        self.0.line_to(to.x, to.y);
    }

    #[inline]
    fn quad_to(&mut self, ctrl: Point, to: Point) {
        self.0.quad_to(ctrl.x, ctrl.y, to.x, to.y);
    }

    #[inline]
    fn cubic_to(&mut self, ctrl1: Point, ctrl2: Point, to: Point) {
        self.0
            .cubic_to(ctrl1.x, ctrl1.y, ctrl2.x, ctrl2.y, to.x, to.y);
    }

    #[inline]
    fn close(&mut self) {
        self.0.close();
    }
}

/// Outlines in glyph space by font and code. One cache serves a whole
/// render pass, clones share it into offscreen sub-stream renders. A
/// cached `None` is a glyph known to produce no path.
#[derive(Clone, Default)]
pub(crate) struct GlyphCache(Rc<RefCell<CacheInner>>);

#[derive(Default)]
struct CacheInner {
    paths: HashMap<(FontId, u32), Option<SkiaPath>>,
    unsupported: HashSet<FontId>,
}

impl GlyphCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the outline of `code`. Errors only on the first failure
    /// per font or glyph, repeated lookups return `None` silently.
    pub fn outline(&self, font: &Font, code: u32) -> Result<Option<SkiaPath>, RenderError> {
        let mut inner = self.0.borrow_mut();
        if inner.unsupported.contains(&font.id) {
            return Ok(None);
        }
        if let Some(path) = inner.paths.get(&(font.id, code)) {
            return Ok(path.clone());
        }

        let source = match &font.variant {
            FontVariant::TrueType(s) | FontVariant::Type1(s) | FontVariant::CffSimple(s) => {
                s.as_ref()
            }
            FontVariant::Cid(CidDescendant::TrueType { source, .. })
            | FontVariant::Cid(CidDescendant::Cff(source)) => source.as_ref(),
            FontVariant::Type3(_) | FontVariant::Unsupported => {
                inner.unsupported.insert(font.id);
                return Err(RenderError::UnsupportedFont);
            }
        };
        let glyph = match &font.variant {
            FontVariant::Cid(CidDescendant::TrueType { cid_to_gid, .. }) => {
                u32::from(cid_to_gid.to_gid(code))
            }
            _ => code,
        };
        let Ok(glyph) = u16::try_from(glyph) else {
            inner.paths.insert((font.id, code), None);
            return Err(RenderError::GlyphResolution(code));
        };

        let mut sink = SkiaPathSink::new();
        if let Err(err) = source.outline(glyph, &mut sink) {
            warn!("glyph {} outline failed: {}", code, err);
            inner.paths.insert((font.id, code), None);
            return Err(RenderError::GlyphResolution(code));
        }
        let path = sink.into_inner().finish();
        inner.paths.insert((font.id, code), path.clone());
        Ok(path)
    }
}
