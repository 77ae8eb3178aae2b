use overtype_core::decode::decode_page;
use overtype_core::{Error, LayoutConstants, PageSize, ParsedDocument, TextRun};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionReport {
    pub page_count: u32,
    /// Indexed by `page_index - 1`.
    pub runs_per_page: Vec<usize>,
    /// Always [`Error::PageDecodeFailed`].
    pub failed_pages: Vec<Error>,
    pub whitespace_records: usize,
    pub invalid_records: usize,
}

impl ExtractionReport {
    pub fn total_runs(&self) -> usize {
        self.runs_per_page.iter().sum()
    }
}

/// Everything a load commits to the session.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub runs: Vec<TextRun>,
    pub page_sizes: Vec<Option<PageSize>>,
    pub report: ExtractionReport,
}

/// One decoder pass over every page. Page failures are recorded, not raised.
pub fn extract<D: ParsedDocument>(doc: &D, layout: &LayoutConstants) -> Extraction {
    let page_count = doc.page_count();
    let mut runs = Vec::new();
    // Grown per page; the count comes from the document and is not trusted.
    let mut page_sizes = Vec::new();
    let mut report = ExtractionReport {
        page_count,
        ..ExtractionReport::default()
    };

    for page_index in 1..=page_count {
        page_sizes.push(match doc.page_size(page_index) {
            Ok(size) => Some(size),
            Err(err) => {
                warn!(page = page_index, error = %err, "page size unavailable");
                None
            }
        });

        let records = match doc.page_glyphs(page_index) {
            Ok(records) => records,
            Err(err) => {
                let err = match err {
                    err @ Error::PageDecodeFailed { .. } => err,
                    other => Error::PageDecodeFailed {
                        page: page_index,
                        reason: other.to_string(),
                    },
                };
                warn!(page = page_index, error = %err, "page yields no runs");
                report.runs_per_page.push(0);
                report.failed_pages.push(err);
                continue;
            }
        };

        let decoded = decode_page(page_index, &records, layout);
        if decoded.invalid_records > 0 {
            warn!(
                page = page_index,
                dropped = decoded.invalid_records,
                "dropped glyph records with non-finite transforms"
            );
        }
        debug!(
            page = page_index,
            runs = decoded.runs.len(),
            whitespace = decoded.whitespace_records,
            "decoded page"
        );
        report.runs_per_page.push(decoded.runs.len());
        report.whitespace_records += decoded.whitespace_records;
        report.invalid_records += decoded.invalid_records;
        runs.extend(decoded.runs);
    }

    Extraction {
        runs,
        page_sizes,
        report,
    }
}
