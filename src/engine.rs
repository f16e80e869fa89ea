//! The client sync engine (C5): drives the DS protocol end to end,
//! `add`/`diff`/`patch`, version bookkeeping, the backup-restore and seed
//! paths, and callback dispatch.

use crate::document::{BackupShadowDocument, ClientDocument, ShadowDocument};
use crate::edit::{Edit, PatchMessage, SEED_CLIENT_VERSION};
use crate::error::SyncError;
use crate::store::DataStore;
use crate::synchronizer::Synchronizer;
use std::collections::HashMap;
use tracing::{debug, warn};

type Callback<T> = Box<dyn FnMut(ClientDocument<T>) + Send>;

/// Drives `add`/`diff`/`patch` for one synchronizer strategy against one
/// data store. Not internally synchronized (spec.md §5): callers must
/// serialize operations per `(documentId, clientId)` themselves.
pub struct ClientSyncEngine<S: Synchronizer, St: DataStore<S::Content, S::Diff>> {
    synchronizer: S,
    store: St,
    callbacks: HashMap<String, Callback<S::Content>>,
}

impl<S, St> ClientSyncEngine<S, St>
where
    S: Synchronizer,
    St: DataStore<S::Content, S::Diff>,
{
    pub fn new(synchronizer: S, store: St) -> Self {
        Self {
            synchronizer,
            store,
            callbacks: HashMap::new(),
        }
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    /// Registers `doc`, creating shadow and backup at `(0,0)` and
    /// installing `callback` for future `patch` invocations on this id.
    pub fn add(
        &mut self,
        doc: ClientDocument<S::Content>,
        callback: impl FnMut(ClientDocument<S::Content>) + Send + 'static,
    ) -> Result<(), SyncError>
    where
        S::Content: Clone,
    {
        self.store.save_client_document(&doc)?;
        let shadow = ShadowDocument::fresh(doc);
        self.store.save_shadow(&shadow)?;
        let backup = BackupShadowDocument::snapshot(shadow);
        self.store.save_backup(&backup)?;
        self.callbacks
            .insert(backup.document_id().to_string(), Box::new(callback));
        Ok(())
    }

    /// Computes an outbound edit against `doc`'s shadow, appends it to
    /// the pending-edit queue, advances the shadow's client version, and
    /// returns a patch message carrying the *entire* queue (spec's
    /// retransmission discipline, P5). Returns `None` if `doc` was never
    /// `add`ed.
    pub fn diff(
        &mut self,
        doc: &ClientDocument<S::Content>,
    ) -> Result<Option<PatchMessage<S::Diff>>, SyncError>
    where
        S::Content: Clone,
    {
        let Some(shadow) = self.store.get_shadow(&doc.id, &doc.client_id)? else {
            return Ok(None);
        };

        let edit = self.synchronizer.server_diff(doc, &shadow);
        self.store.save_edit(&edit)?;

        let patched = self.synchronizer.patch_shadow(&edit, &shadow).map_err(|e| {
            SyncError::PatchFailed {
                document_id: doc.id.clone(),
                source: e,
            }
        })?;
        let advanced = ShadowDocument {
            client_version: shadow.client_version + 1,
            server_version: patched.server_version,
            client_document: patched.client_document,
        };
        self.store.save_shadow(&advanced)?;

        let edits = self.store.get_edits(&doc.id, &doc.client_id)?;
        Ok(Some(self.synchronizer.create_patch_message(
            &doc.id,
            &doc.client_id,
            edits,
        )))
    }

    /// Applies every edit in `message` to the shadow for its
    /// `(documentId, clientId)`, following the version-gated dispatch
    /// table of spec.md §4.5. Reconciles the working document and fires
    /// the registered callback exactly once if the shadow advanced.
    pub fn patch(&mut self, message: &PatchMessage<S::Diff>) -> Result<(), SyncError>
    where
        S::Content: Clone,
    {
        let document_id = &message.id;
        let client_id = &message.client_id;

        let Some(mut shadow) = self.store.get_shadow(document_id, client_id)? else {
            debug!("patch for {}/{}: no shadow, skipping", document_id, client_id);
            return Ok(());
        };

        let mut advanced_once = false;

        for edit in &message.edits {
            if edit.server_version < shadow.server_version {
                debug!("stale edit for {}/{}, discarding", document_id, client_id);
                self.store.remove_edit(edit)?;
                continue;
            }

            if edit.is_seed() {
                let patched = self
                    .synchronizer
                    .patch_shadow(edit, &shadow)
                    .map_err(|e| SyncError::PatchFailed {
                        document_id: document_id.clone(),
                        source: e,
                    })?;
                self.store.remove_edit(edit)?;
                shadow = ShadowDocument {
                    client_version: 0,
                    server_version: patched.server_version,
                    client_document: patched.client_document,
                };
                self.store.save_shadow(&shadow)?;
                advanced_once = true;
                continue;
            }

            if edit.client_version < shadow.client_version {
                let Some(backup) = self.store.get_backup(document_id, client_id)? else {
                    warn!(
                        "divergence for {}/{} with no backup, skipping edit",
                        document_id, client_id
                    );
                    continue;
                };
                if backup.version != edit.client_version {
                    warn!(
                        "backup version mismatch for {}/{}, skipping edit",
                        document_id, client_id
                    );
                    continue;
                }

                let restored_base = ShadowDocument {
                    client_version: shadow.client_version,
                    server_version: shadow.server_version,
                    client_document: backup.shadow_document.client_document.clone(),
                };
                let patched = self
                    .synchronizer
                    .patch_shadow(edit, &restored_base)
                    .map_err(|e| SyncError::PatchFailed {
                        document_id: document_id.clone(),
                        source: e,
                    })?;
                self.store.remove_edits(document_id, client_id)?;
                shadow = patched;
                self.store.save_shadow(&shadow)?;
                advanced_once = true;
                continue;
            }

            if edit.server_version == shadow.server_version
                && edit.client_version == shadow.client_version
            {
                let patched = self
                    .synchronizer
                    .patch_shadow(edit, &shadow)
                    .map_err(|e| SyncError::PatchFailed {
                        document_id: document_id.clone(),
                        source: e,
                    })?;
                self.store.remove_edit(edit)?;
                shadow = ShadowDocument {
                    client_version: patched.client_version,
                    server_version: shadow.server_version + 1,
                    client_document: patched.client_document,
                };
                self.store.save_shadow(&shadow)?;
                advanced_once = true;
                continue;
            }

            warn!(
                "edit for {}/{} matches no dispatch case, skipping",
                document_id, client_id
            );
        }

        if !advanced_once {
            return Ok(());
        }

        let Some(current_doc) = self.store.get_client_document(document_id, client_id)? else {
            return Ok(());
        };

        let reconcile_edit = self.synchronizer.client_diff(&current_doc, &shadow);
        let updated_doc = self
            .synchronizer
            .patch_document(&reconcile_edit, &current_doc)
            .map_err(|e| SyncError::PatchFailed {
                document_id: document_id.clone(),
                source: e,
            })?;
        self.store.save_client_document(&updated_doc)?;

        let backup = BackupShadowDocument::snapshot(shadow);
        self.store.save_backup(&backup)?;

        match self.callbacks.get_mut(document_id) {
            Some(callback) => {
                callback(updated_doc);
                Ok(())
            }
            None => Err(SyncError::MissingCallback {
                document_id: document_id.clone(),
            }),
        }
    }

    /// Produces the initial `{"msgType":"add",...}` handshake message as
    /// a JSON value; serialize with `serde_json::to_string` for the wire
    /// form spec.md §6 documents.
    pub fn document_to_json(&self, doc: &ClientDocument<S::Content>) -> serde_json::Value {
        serde_json::json!({
            "msgType": "add",
            "id": doc.id,
            "clientId": doc.client_id,
            "content": self.synchronizer.content_to_json(&doc.content),
        })
    }
}
