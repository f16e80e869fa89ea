//! The synchronizer strategy (C4): wraps a diff/patch primitive and turns
//! document pairs into edits, applies edits to documents and shadows, and
//! (de)serializes patch messages.
//!
//! `Synchronizer` is generic over its content and diff types via
//! associated types rather than runtime dispatch (spec.md §9), so a
//! `ClientSyncEngine<S>` is statically tied to one matching pair of edit
//! and patch-message shapes, so mixing a `JsonSynchronizer`'s edits into a
//! `TextSynchronizer`'s engine is a compile error, not a runtime one.

use crate::document::ClientDocument;
use crate::edit::{Edit, PatchMessage};
use crate::error::PatchApplicationError;
use crate::json_patch;
use crate::text_diff::{self, TextOp};
use crate::ShadowDocument;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Strategy wrapping a diff/patch primitive for one content type.
pub trait Synchronizer {
    /// The document content type this synchronizer diffs/patches.
    type Content: Clone + PartialEq + Serialize + DeserializeOwned;
    /// The per-edit diff operation type.
    type Diff: Clone + PartialEq + Serialize + DeserializeOwned;

    /// Diffs `doc.content` into `shadow.content` (client → shadow
    /// direction), stamped with the shadow's current versions. Used by
    /// the engine to reconcile the working document after an inbound
    /// `patch` advances the shadow.
    fn client_diff(
        &self,
        doc: &ClientDocument<Self::Content>,
        shadow: &ShadowDocument<Self::Content>,
    ) -> Edit<Self::Diff>;

    /// Diffs `shadow.content` into `doc.content` (shadow → server
    /// direction), stamped with the shadow's current versions. Used by
    /// the engine to build outbound edits in `diff`.
    ///
    /// This direction must never be swapped with `client_diff`, doing
    /// so silently corrupts convergence (spec.md §9).
    fn server_diff(
        &self,
        doc: &ClientDocument<Self::Content>,
        shadow: &ShadowDocument<Self::Content>,
    ) -> Edit<Self::Diff>;

    /// Applies `edit`'s diffs to `shadow`'s content, advancing the shadow
    /// to `(edit.client_version, shadow.server_version)`.
    fn patch_shadow(
        &self,
        edit: &Edit<Self::Diff>,
        shadow: &ShadowDocument<Self::Content>,
    ) -> Result<ShadowDocument<Self::Content>, PatchApplicationError>;

    /// Applies `edit`'s diffs to `doc`'s content, preserving `id`/`client_id`.
    fn patch_document(
        &self,
        edit: &Edit<Self::Diff>,
        doc: &ClientDocument<Self::Content>,
    ) -> Result<ClientDocument<Self::Content>, PatchApplicationError>;

    /// Parses a patch-message wire string; `None` on malformed input
    /// (spec.md's `MalformedPatchMessage`).
    fn patch_message_from_json(&self, raw: &str) -> Option<PatchMessage<Self::Diff>>;

    fn create_patch_message(
        &self,
        document_id: &str,
        client_id: &str,
        edits: Vec<Edit<Self::Diff>>,
    ) -> PatchMessage<Self::Diff> {
        PatchMessage::new(document_id, client_id, edits)
    }

    /// Renders `content` as the JSON value embedded under `"content"` in
    /// the initial add-message (spec.md §6). A value-based equivalent of
    /// spec.md's buffer-appending `addContent`: there is no mutable
    /// string buffer to append into here, so this returns the `Value`
    /// directly and the engine embeds it.
    fn content_to_json(&self, content: &Self::Content) -> Value;
}

/// The in-scope, fully-specified synchronizer: diffs/patches
/// `serde_json::Value` documents using the RFC 6902 primitive in
/// `json_patch`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSynchronizer;

impl Synchronizer for JsonSynchronizer {
    type Content = Value;
    type Diff = json_patch::Op;

    fn client_diff(
        &self,
        doc: &ClientDocument<Value>,
        shadow: &ShadowDocument<Value>,
    ) -> Edit<json_patch::Op> {
        let diffs = json_patch::diff(&doc.content, &shadow.client_document.content);
        Edit::new(
            doc.client_id.clone(),
            doc.id.clone(),
            shadow.client_version,
            shadow.server_version,
            diffs,
        )
    }

    fn server_diff(
        &self,
        doc: &ClientDocument<Value>,
        shadow: &ShadowDocument<Value>,
    ) -> Edit<json_patch::Op> {
        let diffs = json_patch::diff(&shadow.client_document.content, &doc.content);
        Edit::new(
            doc.client_id.clone(),
            doc.id.clone(),
            shadow.client_version,
            shadow.server_version,
            diffs,
        )
    }

    fn patch_shadow(
        &self,
        edit: &Edit<json_patch::Op>,
        shadow: &ShadowDocument<Value>,
    ) -> Result<ShadowDocument<Value>, PatchApplicationError> {
        let mut content = shadow.client_document.content.clone();
        json_patch::apply(&mut content, &edit.diffs)?;
        Ok(ShadowDocument {
            client_version: edit.client_version,
            server_version: shadow.server_version,
            client_document: shadow.client_document.with_content(content),
        })
    }

    fn patch_document(
        &self,
        edit: &Edit<json_patch::Op>,
        doc: &ClientDocument<Value>,
    ) -> Result<ClientDocument<Value>, PatchApplicationError> {
        let mut content = doc.content.clone();
        json_patch::apply(&mut content, &edit.diffs)?;
        Ok(doc.with_content(content))
    }

    fn patch_message_from_json(&self, raw: &str) -> Option<PatchMessage<json_patch::Op>> {
        serde_json::from_str(raw).ok()
    }

    fn content_to_json(&self, content: &Value) -> Value {
        content.clone()
    }
}

/// A second, concrete instance of the `Synchronizer` contract over plain
/// text, backed by `text_diff`. Out of product scope per spec.md §1 (the
/// text synchronizer is named there as an external, structurally
/// identical alternate strategy) but kept as a conformance witness for
/// the generic engine design, matching the wire shape spec.md §6
/// documents for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSynchronizer;

impl Synchronizer for TextSynchronizer {
    type Content = String;
    type Diff = TextOp;

    fn client_diff(
        &self,
        doc: &ClientDocument<String>,
        shadow: &ShadowDocument<String>,
    ) -> Edit<TextOp> {
        let diffs = text_diff::diff(&doc.content, &shadow.client_document.content);
        Edit::new(
            doc.client_id.clone(),
            doc.id.clone(),
            shadow.client_version,
            shadow.server_version,
            diffs,
        )
    }

    fn server_diff(
        &self,
        doc: &ClientDocument<String>,
        shadow: &ShadowDocument<String>,
    ) -> Edit<TextOp> {
        let diffs = text_diff::diff(&shadow.client_document.content, &doc.content);
        Edit::new(
            doc.client_id.clone(),
            doc.id.clone(),
            shadow.client_version,
            shadow.server_version,
            diffs,
        )
    }

    fn patch_shadow(
        &self,
        edit: &Edit<TextOp>,
        shadow: &ShadowDocument<String>,
    ) -> Result<ShadowDocument<String>, PatchApplicationError> {
        let content = if edit.diffs.is_empty() {
            shadow.client_document.content.clone()
        } else {
            text_diff::apply(&shadow.client_document.content, &edit.diffs)
        };
        Ok(ShadowDocument {
            client_version: edit.client_version,
            server_version: shadow.server_version,
            client_document: shadow.client_document.with_content(content),
        })
    }

    fn patch_document(
        &self,
        edit: &Edit<TextOp>,
        doc: &ClientDocument<String>,
    ) -> Result<ClientDocument<String>, PatchApplicationError> {
        let content = if edit.diffs.is_empty() {
            doc.content.clone()
        } else {
            text_diff::apply(&doc.content, &edit.diffs)
        };
        Ok(doc.with_content(content))
    }

    fn patch_message_from_json(&self, raw: &str) -> Option<PatchMessage<TextOp>> {
        serde_json::from_str(raw).ok()
    }

    fn content_to_json(&self, content: &String) -> Value {
        Value::String(content.clone())
    }
}
