//! Editing session orchestration for Overtype.
//!
//! A [`Session`] owns the pristine document bytes and the [`RunStore`]
//! extracted from them. Edits only change run text; [`Session::reconstruct`]
//! always starts again from the pristine bytes.

pub mod extract;
pub mod reconstruct;
pub mod session;
pub mod store;

pub use extract::{Extraction, ExtractionReport};
pub use reconstruct::{ReconstructReport, Reconstruction};
pub use session::{LoadOutcome, LoadTicket, PreparedLoad, Session};
pub use store::{PageRuns, RunStore};
