//! Font model at the boundary to font-program parsing: a resolved font
//! exposes glyph outlines through [`GlyphSource`], or operation lists for
//! procedural glyphs. How outlines are decoded from the font program is
//! the document layer's business.

use crate::graphics::{trans::GlyphToTextSpace, Operation, Point};
use ahash::HashMap;
use anyhow::Result as AnyResult;
use log::warn;
use std::{fmt::Debug, rc::Rc};

pub trait PathSink {
    fn move_to(&mut self, to: Point);
    fn line_to(&mut self, to: Point);
    fn quad_to(&mut self, ctrl: Point, to: Point);
    fn cubic_to(&mut self, ctrl1: Point, ctrl2: Point, to: Point);
    fn close(&mut self);
}

/// Outline provider for one font program. The glyph key is a char code
/// for simple fonts, a glyph id or cid for composite fonts, decided by
/// the [`FontVariant`] holding the source.
pub trait GlyphSource: Debug {
    /// Write the outline of `glyph` into `sink`, in glyph space.
    /// An absent glyph writes nothing.
    fn outline(&self, glyph: u16, sink: &mut dyn PathSink) -> AnyResult<()>;
}

/// Identity of a font across operations, assigned by the document layer.
/// Outline resolution is cached under this key for one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontId(pub u64);

#[derive(Debug)]
pub struct Font {
    pub id: FontId,
    /// Font matrix, glyph space to text space.
    pub glyph_to_text: GlyphToTextSpace,
    pub variant: FontVariant,
}

#[derive(Debug)]
pub enum FontVariant {
    /// Simple TrueType font, keyed by char code.
    TrueType(Box<dyn GlyphSource>),
    Type1(Box<dyn GlyphSource>),
    CffSimple(Box<dyn GlyphSource>),
    Cid(CidDescendant),
    /// Procedural glyphs, no outlines.
    Type3(Type3Glyphs),
    /// Recognized but unrenderable font program.
    Unsupported,
}

/// Descendant of a composite font, selects how a cid finds its outline.
#[derive(Debug)]
pub enum CidDescendant {
    /// Outline keyed by glyph id, cid mapped through `cid_to_gid`.
    TrueType {
        source: Box<dyn GlyphSource>,
        cid_to_gid: CidToGidMap,
    },
    /// Cid-keyed program, outline keyed by cid directly.
    Cff(Box<dyn GlyphSource>),
}

#[derive(Debug, Clone, Default)]
pub enum CidToGidMap {
    #[default]
    Identity,
    /// Big-endian u16 glyph id per cid.
    Explicit(Rc<[u8]>),
}

impl CidToGidMap {
    /// Out of range cids map to glyph 0.
    pub fn to_gid(&self, cid: u32) -> u16 {
        match self {
            Self::Identity => cid.try_into().unwrap_or_else(|_| {
                warn!("cid {} exceeds glyph id range", cid);
                0
            }),
            Self::Explicit(map) => {
                let i = cid as usize * 2;
                map.get(i..i + 2).map_or_else(
                    || {
                        warn!("cid {} not in cid to gid map", cid);
                        0
                    },
                    |b| u16::from_be_bytes([b[0], b[1]]),
                )
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Type3Glyphs {
    procs: HashMap<u32, Rc<[Operation]>>,
}

impl Type3Glyphs {
    pub fn new(procs: HashMap<u32, Rc<[Operation]>>) -> Self {
        Self { procs }
    }

    pub fn proc(&self, code: u32) -> Option<&Rc<[Operation]>> {
        self.procs.get(&code)
    }
}
