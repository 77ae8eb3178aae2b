//! Seams to the document parser and writer.
//!
//! Page indices are 1-based on both sides.

use thiserror::Error;

use crate::{GlyphRecord, PageSize, Point, Rect, Result, Rgb};

pub trait GlyphParser: Send + Sync {
    type Document: ParsedDocument;

    /// Fails with [`crate::Error::ParseFailed`] when the bytes are not a readable document.
    fn open(&self, bytes: &[u8]) -> Result<Self::Document>;
}

pub trait ParsedDocument {
    fn page_count(&self) -> u32;

    fn page_size(&self, page_index: u32) -> Result<PageSize>;

    /// Glyph runs of one page in content order. May fail for a single page
    /// without affecting the others.
    fn page_glyphs(&self, page_index: u32) -> Result<Vec<GlyphRecord>>;
}

pub trait DocumentWriter {
    type Document: WritableDocument;

    fn open(&self, bytes: &[u8]) -> Result<Self::Document>;
}

/// Handle to a font embedded in a [`WritableDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FontHandle(pub usize);

/// The font encoder refused a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DrawRejected(pub String);

pub trait WritableDocument {
    fn page_sizes(&self) -> Vec<PageSize>;

    fn page_count(&self) -> u32 {
        u32::try_from(self.page_sizes().len()).unwrap_or(u32::MAX)
    }

    /// Embeds the single fixed font used for every redrawn run.
    fn embed_font(&mut self) -> Result<FontHandle>;

    fn fill_rect(&mut self, page_index: u32, rect: Rect, color: Rgb) -> Result<()>;

    /// A rejected string leaves the page unchanged.
    fn draw_text(
        &mut self,
        page_index: u32,
        text: &str,
        origin: Point,
        size: f64,
        font: FontHandle,
        color: Rgb,
    ) -> std::result::Result<(), DrawRejected>;

    fn save(self) -> Result<Vec<u8>>;
}
