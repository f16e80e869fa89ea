use serde::{Deserialize, Serialize};

/// The working copy of a document as the application sees it.
///
/// One `ClientDocument` exists per `(id, client_id)` pair; "mutation" in
/// this crate always means replacing the stored record with a new one,
/// never editing in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDocument<T> {
    pub id: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub content: T,
}

impl<T> ClientDocument<T> {
    pub fn new(id: impl Into<String>, client_id: impl Into<String>, content: T) -> Self {
        Self {
            id: id.into(),
            client_id: client_id.into(),
            content,
        }
    }

    /// Returns a copy of this document with new content, keeping id/client_id.
    pub fn with_content(&self, content: T) -> Self
    where
        T: Clone,
    {
        Self {
            id: self.id.clone(),
            client_id: self.client_id.clone(),
            content,
        }
    }
}

/// The last agreed state between this client and its peer, plus the two
/// monotonic version counters DS uses to detect staleness and divergence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowDocument<T> {
    #[serde(rename = "clientVersion")]
    pub client_version: i64,
    #[serde(rename = "serverVersion")]
    pub server_version: i64,
    #[serde(rename = "clientDocument")]
    pub client_document: ClientDocument<T>,
}

impl<T> ShadowDocument<T> {
    /// A freshly created shadow, at version (0, 0), mirroring `doc`.
    pub fn fresh(doc: ClientDocument<T>) -> Self {
        Self {
            client_version: 0,
            server_version: 0,
            client_document: doc,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.client_document.id
    }

    pub fn client_id(&self) -> &str {
        &self.client_document.client_id
    }
}

/// A snapshot of a shadow taken at the last known-good synchronization
/// point, kept so the engine can recover from a lost patch message
/// without losing the whole conversation (see `ClientSyncEngine::patch`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupShadowDocument<T> {
    pub version: i64,
    #[serde(rename = "shadowDocument")]
    pub shadow_document: ShadowDocument<T>,
}

impl<T> BackupShadowDocument<T> {
    /// A backup taken immediately, mirroring `shadow`'s current client version.
    pub fn snapshot(shadow: ShadowDocument<T>) -> Self {
        Self {
            version: shadow.client_version,
            shadow_document: shadow,
        }
    }

    pub fn document_id(&self) -> &str {
        self.shadow_document.document_id()
    }

    pub fn client_id(&self) -> &str {
        self.shadow_document.client_id()
    }
}
