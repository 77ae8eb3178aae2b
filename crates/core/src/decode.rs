//! Glyph transform decoding: parser records to [`TextRun`]s.

use crate::{GlyphRecord, LayoutConstants, RunId, TextRun, Transform};

/// Runs decoded from one page plus what was left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPage {
    pub runs: Vec<TextRun>,
    pub whitespace_records: usize,
    pub invalid_records: usize,
}

/// Scale of the transform's first basis vector.
///
/// Exact for uniform scale and rotation; skewed matrices are approximated.
pub fn font_size(transform: &Transform) -> f64 {
    transform.a.hypot(transform.b)
}

pub fn decode_page(
    page_index: u32,
    records: &[GlyphRecord],
    layout: &LayoutConstants,
) -> DecodedPage {
    let mut out = DecodedPage::default();
    for (sequence, record) in records.iter().enumerate() {
        if record.text.trim().is_empty() {
            out.whitespace_records += 1;
            continue;
        }
        match decode_record(page_index, sequence, record, layout) {
            Some(run) => out.runs.push(run),
            None => out.invalid_records += 1,
        }
    }
    out
}

/// `None` for whitespace-only text or a non-finite transform.
pub fn decode_record(
    page_index: u32,
    sequence: usize,
    record: &GlyphRecord,
    layout: &LayoutConstants,
) -> Option<TextRun> {
    if record.text.trim().is_empty() || !record.transform.is_finite() {
        return None;
    }

    let font_size = font_size(&record.transform);
    let width = record
        .advance_width
        .filter(|w| w.is_finite() && *w > 0.0)
        .unwrap_or(layout.default_run_width);

    Some(TextRun {
        id: RunId::new(page_index, sequence),
        text: record.text.clone(),
        origin_x: record.transform.e,
        origin_y: record.transform.f,
        width,
        height: font_size * layout.line_height,
        font_size,
        page_index,
    })
}
