/// Errors raised while executing content operations. Each carries its own
/// recovery scope: the smallest unit that can be skipped while the rest of
/// the page keeps rendering.
#[derive(Clone, PartialEq, Debug, thiserror::Error)]
pub enum RenderError {
    /// Restore past the bottom of the sub-stream's state scope. Aborts
    /// the current sub-stream.
    #[error("graphics state stack underflow")]
    StateUnderflow,
    /// No glyph source for the font. The glyph is skipped.
    #[error("font cannot supply glyph outlines")]
    UnsupportedFont,
    /// Outline lookup failed for one glyph. The glyph is skipped.
    #[error("glyph {0} failed to resolve")]
    GlyphResolution(u32),
    /// Soft mask subtype unknown. The paint it applies to is skipped.
    #[error("invalid soft mask subtype")]
    InvalidSoftMask,
}
