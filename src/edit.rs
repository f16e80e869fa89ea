use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An ordered list of diffs stamped with the shadow versions that were
/// current when the diff was computed. An edit may be resent any number
/// of times until the peer's `serverVersion` acknowledges it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edit<D> {
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(rename = "documentId")]
    pub document_id: String,
    #[serde(rename = "clientVersion")]
    pub client_version: i64,
    #[serde(rename = "serverVersion")]
    pub server_version: i64,
    pub checksum: String,
    pub diffs: Vec<D>,
}

/// Marker value of `client_version` that re-anchors the conversation: the
/// receiving side adopts the patched state and resets its own client
/// version to 0 (see `ClientSyncEngine::patch`).
pub const SEED_CLIENT_VERSION: i64 = -1;

impl<D: Serialize> Edit<D> {
    pub fn new(
        client_id: impl Into<String>,
        document_id: impl Into<String>,
        client_version: i64,
        server_version: i64,
        diffs: Vec<D>,
    ) -> Self {
        let checksum = checksum_of(&diffs);
        Self {
            client_id: client_id.into(),
            document_id: document_id.into(),
            client_version,
            server_version,
            checksum,
            diffs,
        }
    }

    pub fn is_seed(&self) -> bool {
        self.client_version == SEED_CLIENT_VERSION
    }
}

/// SHA-256 hex digest of the serialized diff list.
///
/// This is a content fingerprint for wire/debugging purposes only; it is
/// never consulted to accept or reject an edit.
pub fn checksum_of<D: Serialize>(diffs: &[D]) -> String {
    let bytes = serde_json::to_vec(diffs).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

/// The wire envelope carrying a batch of edits for one `(document, client)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchMessage<D> {
    #[serde(rename = "msgType")]
    pub msg_type: String,
    pub id: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub edits: Vec<Edit<D>>,
}

impl<D> PatchMessage<D> {
    pub fn new(document_id: impl Into<String>, client_id: impl Into<String>, edits: Vec<Edit<D>>) -> Self {
        Self {
            msg_type: "patch".to_string(),
            id: document_id.into(),
            client_id: client_id.into(),
            edits,
        }
    }
}
