//! Raster image model. Color images arrive decoded to RGBA, stencils keep
//! the packed 1-bit rows they are defined with.

use anyhow::{ensure, Result as AnyResult};
use image::RgbaImage;

#[derive(Debug, Clone)]
pub struct Image {
    pub kind: ImageKind,
    /// Smooth scaling requested by the source.
    pub interpolate: bool,
}

impl Image {
    pub fn width(&self) -> u32 {
        match &self.kind {
            ImageKind::Rgba(img) => img.width(),
            ImageKind::Stencil(s) => s.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match &self.kind {
            ImageKind::Rgba(img) => img.height(),
            ImageKind::Stencil(s) => s.height(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ImageKind {
    Rgba(RgbaImage),
    /// 1-bit shape mask, contributes shape only, painted with the
    /// current fill paint.
    Stencil(Stencil),
}

#[derive(Debug, Clone)]
pub struct Stencil {
    width: u32,
    height: u32,
    invert: bool,
    rows: Vec<u8>,
}

impl Stencil {
    /// `rows` packs samples msb first, each row starting on a byte
    /// boundary.
    pub fn new(width: u32, height: u32, invert: bool, rows: Vec<u8>) -> AnyResult<Self> {
        let stride = (width as usize).div_ceil(8);
        ensure!(
            rows.len() >= stride * height as usize,
            "stencil rows too short: {} < {}",
            rows.len(),
            stride * height as usize
        );
        Ok(Self {
            width,
            height,
            invert,
            rows,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// A zero sample marks the pixel, `invert` reverses that.
    pub fn marked(&self, x: u32, y: u32) -> bool {
        debug_assert!(x < self.width && y < self.height);
        let stride = (self.width as usize).div_ceil(8);
        let byte = self.rows[y as usize * stride + x as usize / 8];
        let bit = byte & (0x80 >> (x % 8)) != 0;
        bit == self.invert
    }
}

#[cfg(test)]
mod tests;
