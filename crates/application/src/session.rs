use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::JoinHandle;

use overtype_core::viewport::{ViewportPoint, map_doc_to_viewport};
use overtype_core::{
    DocumentWriter, Error, GlyphParser, PageCursor, PageSize, Result, RunId, Settings, TextRun,
    Zoom,
};
use tracing::{debug, info};

use crate::extract::{Extraction, ExtractionReport, extract};
use crate::reconstruct::{Reconstruction, reconstruct};
use crate::store::RunStore;

/// Generation a load captured when it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Bytes that parsed successfully, ready to be committed.
#[derive(Debug, Clone)]
pub struct PreparedLoad {
    bytes: Arc<[u8]>,
    extraction: Extraction,
}

impl PreparedLoad {
    pub fn report(&self) -> &ExtractionReport {
        &self.extraction.report
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(ExtractionReport),
    /// A newer load started first; this result was discarded.
    Superseded { generation: u64 },
}

#[derive(Debug, Clone)]
struct LoadedDocument {
    bytes: Arc<[u8]>,
    page_sizes: Vec<Option<PageSize>>,
    generation: u64,
}

#[derive(Debug, Default)]
struct SessionState {
    document: Option<LoadedDocument>,
    store: RunStore,
}

/// One editing session: the pristine document bytes and the run store built
/// from them.
#[derive(Debug)]
pub struct Session<P> {
    parser: P,
    settings: Settings,
    generation: AtomicU64,
    state: RwLock<SessionState>,
}

impl<P: GlyphParser> Session<P> {
    pub fn new(parser: P, settings: Settings) -> Self {
        Self {
            parser,
            settings,
            generation: AtomicU64::new(0),
            state: RwLock::new(SessionState::default()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Starts a load. Any load started earlier becomes stale.
    pub fn begin_load(&self) -> LoadTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, "load started");
        LoadTicket { generation }
    }

    /// Parses and extracts without touching session state.
    pub fn prepare(&self, bytes: impl Into<Arc<[u8]>>) -> Result<PreparedLoad> {
        let bytes: Arc<[u8]> = bytes.into();
        let size = bytes.len() as u64;
        if size > self.settings.max_document_bytes {
            return Err(Error::TooLarge {
                size,
                limit: self.settings.max_document_bytes,
            });
        }
        let doc = self.parser.open(&bytes)?;
        let extraction = extract(&doc, &self.settings.layout);
        Ok(PreparedLoad { bytes, extraction })
    }

    /// Replaces the store atomically if `ticket` is still the newest load.
    pub fn commit(&self, ticket: LoadTicket, prepared: PreparedLoad) -> LoadOutcome {
        let mut state = self.write_state();
        if self.generation.load(Ordering::SeqCst) != ticket.generation {
            info!(generation = ticket.generation, "stale load discarded");
            return LoadOutcome::Superseded {
                generation: ticket.generation,
            };
        }

        let PreparedLoad { bytes, extraction } = prepared;
        state.store.replace_all(extraction.runs);
        state.document = Some(LoadedDocument {
            bytes,
            page_sizes: extraction.page_sizes,
            generation: ticket.generation,
        });
        info!(
            generation = ticket.generation,
            pages = extraction.report.page_count,
            runs = state.store.len(),
            "document loaded"
        );
        LoadOutcome::Loaded(extraction.report)
    }

    /// On error the previously loaded document stays in place.
    pub fn load_document(&self, bytes: impl Into<Arc<[u8]>>) -> Result<LoadOutcome> {
        let ticket = self.begin_load();
        let prepared = self.prepare(bytes)?;
        Ok(self.commit(ticket, prepared))
    }

    /// Applies the edit if `id` exists. Unknown ids are ignored.
    pub fn set_run_text(&self, id: &RunId, text: impl Into<String>) -> bool {
        let updated = self.write_state().store.set_text(id, text);
        if !updated {
            debug!(run = %id, "edit for unknown run ignored");
        }
        updated
    }

    /// Rebuilds the document from the pristine bytes and the current runs.
    pub fn reconstruct<W: DocumentWriter>(&self, writer: &W) -> Result<Reconstruction> {
        let (bytes, store) = {
            let state = self.read_state();
            let document = state.document.as_ref().ok_or(Error::NoDocument)?;
            (document.bytes.clone(), state.store.clone())
        };
        reconstruct(writer, &bytes, &store, &self.settings)
    }

    pub fn run(&self, id: &RunId) -> Option<TextRun> {
        self.read_state().store.get(id).cloned()
    }

    pub fn runs(&self) -> Vec<TextRun> {
        self.read_state().store.to_vec()
    }

    pub fn runs_for_page(&self, page_index: u32) -> Vec<TextRun> {
        self.read_state()
            .store
            .all_for_page(page_index)
            .cloned()
            .collect()
    }

    pub fn is_loaded(&self) -> bool {
        self.read_state().document.is_some()
    }

    pub fn page_count(&self) -> u32 {
        self.read_state()
            .document
            .as_ref()
            .map(|doc| u32::try_from(doc.page_sizes.len()).unwrap_or(u32::MAX))
            .unwrap_or(0)
    }

    /// Cursor over the committed document's pages, on the first page.
    pub fn page_cursor(&self) -> PageCursor {
        PageCursor::new(self.page_count())
    }

    pub fn page_size(&self, page_index: u32) -> Option<PageSize> {
        let state = self.read_state();
        let doc = state.document.as_ref()?;
        let pos = usize::try_from(page_index.checked_sub(1)?).ok()?;
        doc.page_sizes.get(pos).copied().flatten()
    }

    /// Generation of the committed document, if any.
    pub fn loaded_generation(&self) -> Option<u64> {
        self.read_state().document.as_ref().map(|doc| doc.generation)
    }

    /// Topmost run on `page_index` under a viewport point.
    pub fn run_at(
        &self,
        page_index: u32,
        point: ViewportPoint,
        zoom: Zoom,
        page_height: f64,
    ) -> Option<TextRun> {
        let state = self.read_state();
        state
            .store
            .all_for_page(page_index)
            .filter(|run| map_doc_to_viewport(run, zoom, page_height).contains(point))
            .last()
            .cloned()
    }

    /// Drops the document and invalidates pending loads.
    pub fn close(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut state = self.write_state();
        *state = SessionState::default();
        debug!("session closed");
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P: GlyphParser + 'static> Session<P> {
    /// Loads on a worker thread. The ticket is taken before this returns, so
    /// call order decides which load wins.
    pub fn spawn_load(self: &Arc<Self>, bytes: Vec<u8>) -> JoinHandle<Result<LoadOutcome>> {
        let ticket = self.begin_load();
        let session = Arc::clone(self);
        std::thread::spawn(move || {
            let prepared = session.prepare(bytes)?;
            Ok(session.commit(ticket, prepared))
        })
    }
}
