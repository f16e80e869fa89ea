//! Black-box end-to-end scenarios driven entirely through the public
//! crate API (two independent engines exchanging wire-serialized patch
//! messages), complementing the per-module unit tests.

use ds_sync_core::{ClientDocument, ClientSyncEngine, Edit, InMemoryStore, JsonSynchronizer, PatchMessage};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn json_engine() -> ClientSyncEngine<JsonSynchronizer, InMemoryStore<serde_json::Value, ds_sync_core::json_patch::Op>> {
    ClientSyncEngine::new(JsonSynchronizer, InMemoryStore::new())
}

#[test]
fn two_engines_converge_across_a_wire_round_trip() {
    let mut client = json_engine();
    let mut server = json_engine();

    let doc = ClientDocument::new("doc-1", "client-1", json!({"title": "draft"}));
    client.add(doc.clone(), |_| {}).unwrap();
    server.add(doc, |_| {}).unwrap();

    // Client edits locally, produces a patch message, serializes it to
    // the wire and the server parses it back before applying.
    let edited = ClientDocument::new("doc-1", "client-1", json!({"title": "final"}));
    let message = client.diff(&edited).unwrap().unwrap();
    let wire = serde_json::to_string(&message).unwrap();

    let parsed: PatchMessage<ds_sync_core::json_patch::Op> = serde_json::from_str(&wire).unwrap();
    server.patch(&parsed).unwrap();

    let server_doc = server
        .store()
        .get_client_document("doc-1", "client-1")
        .unwrap()
        .unwrap();
    assert_eq!(server_doc.content, json!({"title": "final"}));
}

#[test]
fn per_document_callbacks_do_not_cross_contaminate_in_one_engine() {
    let mut engine = json_engine();

    let seen_a = Arc::new(Mutex::new(Vec::new()));
    let seen_b = Arc::new(Mutex::new(Vec::new()));
    let (seen_a_clone, seen_b_clone) = (seen_a.clone(), seen_b.clone());

    engine
        .add(
            ClientDocument::new("doc-a", "client-1", json!({"v": 1})),
            move |d| seen_a_clone.lock().unwrap().push(d.content),
        )
        .unwrap();
    engine
        .add(
            ClientDocument::new("doc-b", "client-1", json!({"v": 1})),
            move |d| seen_b_clone.lock().unwrap().push(d.content),
        )
        .unwrap();

    let edit_a = Edit::new("client-1", "doc-a", 0, 0, vec![ds_sync_core::json_patch::Op::replace("/v", json!(2))]);
    engine
        .patch(&PatchMessage::new("doc-a", "client-1", vec![edit_a]))
        .unwrap();

    assert_eq!(seen_a.lock().unwrap().as_slice(), &[json!({"v": 2})]);
    assert!(seen_b.lock().unwrap().is_empty(), "doc-b's callback must not fire for a doc-a patch");
}

#[test]
fn scenario_patch_then_callback_from_spec_section_8() {
    let mut engine = json_engine();
    let doc = ClientDocument::new("doc-1", "client-1", json!({"name": "fletch"}));
    let seen = Arc::new(Mutex::new(None));
    let seen_clone = seen.clone();
    engine
        .add(doc, move |d| {
            *seen_clone.lock().unwrap() = Some(d);
        })
        .unwrap();

    let edit = Edit::new(
        "client-1",
        "doc-1",
        0,
        0,
        vec![
            ds_sync_core::json_patch::Op::replace("/name", json!("Fletch")),
            ds_sync_core::json_patch::Op::add("/firstname", json!("Robert")),
        ],
    );
    engine
        .patch(&PatchMessage::new("doc-1", "client-1", vec![edit]))
        .unwrap();

    let shadow = engine.store().get_shadow("doc-1", "client-1").unwrap().unwrap();
    assert_eq!((shadow.client_version, shadow.server_version), (0, 1));

    let backup = engine.store().get_backup("doc-1", "client-1").unwrap().unwrap();
    assert_eq!(backup.version, shadow.client_version);
    assert_eq!(backup.shadow_document, shadow);

    let observed = seen.lock().unwrap().take().unwrap();
    assert_eq!(observed.content, json!({"name": "Fletch", "firstname": "Robert"}));
}

#[test]
fn out_of_order_edits_in_one_message_do_not_skip_later_valid_edits() {
    let mut engine = json_engine();
    let doc = ClientDocument::new("doc-1", "client-1", json!({"a": 1}));
    engine.add(doc, |_| {}).unwrap();

    // A stale edit (already-applied server version) followed by a valid
    // one in the same message: the stale edit must not prevent the
    // valid edit later in the list from being applied.
    let stale = Edit::new("client-1", "doc-1", 0, -1, vec![ds_sync_core::json_patch::Op::replace("/a", json!(99))]);
    let valid = Edit::new("client-1", "doc-1", 0, 0, vec![ds_sync_core::json_patch::Op::replace("/a", json!(2))]);
    engine
        .patch(&PatchMessage::new("doc-1", "client-1", vec![stale, valid]))
        .unwrap();

    let server_doc = engine
        .store()
        .get_client_document("doc-1", "client-1")
        .unwrap()
        .unwrap();
    assert_eq!(server_doc.content, json!({"a": 2}));
}

#[test]
fn missing_shadow_on_diff_and_patch_is_a_silent_noop() {
    let mut engine = json_engine();
    let doc = ClientDocument::new("never-added", "client-1", json!({}));
    assert!(engine.diff(&doc).unwrap().is_none());

    let message = PatchMessage::new("never-added", "client-1", vec![]);
    assert!(engine.patch(&message).is_ok());
}
