use crate::store::StoreError;
use thiserror::Error;

/// Errors the JSON-Patch primitive (C3) can raise while applying a patch.
///
/// Mirrors the shape of the `json-patch` crate's own error type (see
/// `examples/other_examples/a5fce4c7_idubrov-json-patch__src-lib.rs.rs`),
/// which this crate's `json_patch` module takes as a style reference.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchApplicationError {
    #[error("invalid JSON pointer: {0}")]
    InvalidPointer(String),

    #[error("'test' operation failed at {path}")]
    TestFailed { path: String },
}

/// Errors surfaced across the synchronizer/store/engine boundary.
///
/// Only the structural failures spec.md §7 calls out as "surfaced to
/// caller" get a variant here: stale edits, version mismatches and
/// backup mismatches are recovered locally inside `ClientSyncEngine::patch`
/// and never reach this type (they are logged via `tracing` instead).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error("failed to apply patch to document {document_id}: {source}")]
    PatchFailed {
        document_id: String,
        #[source]
        source: PatchApplicationError,
    },

    #[error("no callback registered for document {document_id}")]
    MissingCallback { document_id: String },

    #[error("data store error: {0}")]
    Store(#[from] StoreError),
}
