//! Error taxonomy shared by every Overtype crate.
//!
//! `ParseFailed`, `TooLarge`, `NoDocument` and `ReconstructFailed` are fatal
//! for the operation that raised them. `PageDecodeFailed` and `DrawFailed`
//! are recovered where they occur and only surface in reports and logs.

use thiserror::Error;

use crate::RunId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("failed to parse document: {reason}")]
    ParseFailed { reason: String },

    #[error("document is {size} bytes, limit is {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("failed to decode page {page}: {reason}")]
    PageDecodeFailed { page: u32, reason: String },

    #[error("failed to draw run {run}: {reason}")]
    DrawFailed { run: RunId, reason: String },

    #[error("failed to reconstruct document: {reason}")]
    ReconstructFailed { reason: String },

    #[error("no document loaded")]
    NoDocument,
}

impl Error {
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::ParseFailed {
            reason: reason.into(),
        }
    }

    pub fn reconstruct(reason: impl Into<String>) -> Self {
        Self::ReconstructFailed {
            reason: reason.into(),
        }
    }

    /// Whether the failure aborts the whole operation.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::PageDecodeFailed { .. } | Error::DrawFailed { .. }
        )
    }
}
