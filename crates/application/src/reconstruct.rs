//! Page reconstruction: occlude every run's original footprint, redraw its
//! current text with the fixed font.

use overtype_core::normalize::normalize_report;
use overtype_core::{
    DocumentWriter, Error, Point, Result, Rgb, RunId, Settings, WritableDocument,
};
use tracing::{debug, info, warn};

use crate::RunStore;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconstructReport {
    pub runs_drawn: usize,
    /// Runs whose page is not in the document.
    pub runs_skipped: Vec<RunId>,
    /// Runs drawn as the placeholder after [`Error::DrawFailed`].
    pub placeholders: Vec<RunId>,
    /// Runs where even the placeholder was rejected.
    pub failed: Vec<RunId>,
    /// Characters replaced by `?` during normalization.
    pub substituted_chars: usize,
}

#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub bytes: Vec<u8>,
    pub report: ReconstructReport,
}

pub fn reconstruct<W: DocumentWriter>(
    writer: &W,
    source: &[u8],
    store: &RunStore,
    settings: &Settings,
) -> Result<Reconstruction> {
    let mut doc = writer.open(source)?;
    let page_count = doc.page_count();
    let font = doc.embed_font()?;
    let layout = &settings.layout;
    let mut report = ReconstructReport::default();

    let outside = |page_index: u32| page_index == 0 || page_index > page_count;
    for run in store.iter().filter(|run| outside(run.page_index)) {
        warn!(
            run = %run.id,
            page = run.page_index,
            page_count,
            "run outside document, skipped"
        );
        report.runs_skipped.push(run.id.clone());
    }

    for page_index in 1..=page_count.min(store.max_page()) {
        for run in store.all_for_page(page_index) {
            doc.fill_rect(page_index, layout.occlusion_rect(run), Rgb::WHITE)?;

            let normalized = normalize_report(&run.text);
            if normalized.replaced > 0 {
                debug!(
                    run = %run.id,
                    replaced = normalized.replaced,
                    "unsupported characters replaced"
                );
                report.substituted_chars += normalized.replaced;
            }

            let origin = Point {
                x: run.origin_x,
                y: run.origin_y,
            };
            let drawn = doc.draw_text(
                page_index,
                &normalized.text,
                origin,
                run.font_size,
                font,
                Rgb::BLACK,
            );
            let Err(rejected) = drawn else {
                report.runs_drawn += 1;
                continue;
            };

            let err = Error::DrawFailed {
                run: run.id.clone(),
                reason: rejected.to_string(),
            };
            warn!(run = %run.id, error = %err, "drawing placeholder");
            match doc.draw_text(
                page_index,
                &settings.placeholder_text,
                origin,
                run.font_size,
                font,
                Rgb::RED,
            ) {
                Ok(()) => report.placeholders.push(run.id.clone()),
                Err(rejected) => {
                    warn!(run = %run.id, error = %rejected, "placeholder rejected");
                    report.failed.push(run.id.clone());
                }
            }
        }
    }

    let bytes = doc.save()?;
    info!(
        drawn = report.runs_drawn,
        skipped = report.runs_skipped.len(),
        placeholders = report.placeholders.len(),
        bytes = bytes.len(),
        "reconstructed document"
    );
    Ok(Reconstruction { bytes, report })
}
