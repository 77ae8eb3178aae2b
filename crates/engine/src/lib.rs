//! PDF collaborators: [`PdfParser`] reads positioned glyph runs with the
//! `pdf` crate, [`PdfWriter`] overlays replacement text with `lopdf`.

mod parser;
mod winansi;
mod writer;

pub use parser::{PdfDocument, PdfParser};
pub use writer::{OverlayDocument, PdfWriter};
