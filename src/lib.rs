//! Client-side Differential Synchronization core: shadow/backup
//! versioning, an edit queue, a JSON-Patch diff/apply primitive, and the
//! patch-application state machine tying them together.

pub mod document;
pub mod edit;
pub mod engine;
pub mod error;
pub mod json_patch;
pub mod store;
pub mod synchronizer;
pub mod text_diff;

pub use document::{BackupShadowDocument, ClientDocument, ShadowDocument};
pub use edit::{Edit, PatchMessage, SEED_CLIENT_VERSION};
pub use engine::ClientSyncEngine;
pub use error::{PatchApplicationError, SyncError};
pub use store::{DataStore, InMemoryStore, SqliteStore, StoreError};
pub use synchronizer::{JsonSynchronizer, Synchronizer, TextSynchronizer};
