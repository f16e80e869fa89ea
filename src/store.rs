//! The data store contract (C2) and two implementations: an in-memory
//! store for tests/embedding and a SQLite-backed store generalizing the
//! teacher crate's `persistence.rs` (a single `documents` table) to the
//! four tables the contract needs.

use crate::document::{BackupShadowDocument, ClientDocument, ShadowDocument};
use crate::edit::Edit;
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to (de)serialize stored content: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Keyed persistence for documents, shadows, backups and the pending-edit
/// queue. All operations are synchronous (spec.md §4.2).
///
/// The teacher's distinction in `patch`'s error table (spec.md §7)
/// between "not found" and "store failure" motivates the `Result`
/// return here even though spec.md's own contract table lists no errors
/// for any store operation: that table describes an *in-memory*
/// reference implementation's error surface, and a real backing store
/// can fail (disk I/O, serialization). `InMemoryStore` below always
/// returns `Ok`, matching spec.md's contract exactly; `SqliteStore` is
/// the implementation for which the `Result` actually earns its keep.
pub trait DataStore<T, D> {
    fn save_client_document(&mut self, doc: &ClientDocument<T>) -> Result<(), StoreError>;
    fn get_client_document(
        &self,
        document_id: &str,
        client_id: &str,
    ) -> Result<Option<ClientDocument<T>>, StoreError>;

    fn save_shadow(&mut self, shadow: &ShadowDocument<T>) -> Result<(), StoreError>;
    fn get_shadow(
        &self,
        document_id: &str,
        client_id: &str,
    ) -> Result<Option<ShadowDocument<T>>, StoreError>;

    fn save_backup(&mut self, backup: &BackupShadowDocument<T>) -> Result<(), StoreError>;
    fn get_backup(
        &self,
        document_id: &str,
        client_id: &str,
    ) -> Result<Option<BackupShadowDocument<T>>, StoreError>;

    /// Appends `edit` to the pending-edit queue for `(edit.document_id, edit.client_id)`.
    fn save_edit(&mut self, edit: &Edit<D>) -> Result<(), StoreError>;
    /// The ordered pending-edit queue for `(document_id, client_id)`; an
    /// empty vector if the queue was never created or has been drained.
    fn get_edits(&self, document_id: &str, client_id: &str) -> Result<Vec<Edit<D>>, StoreError>;
    /// Removes the first queue element equal to `edit`; silent no-op if absent.
    fn remove_edit(&mut self, edit: &Edit<D>) -> Result<(), StoreError>;
    /// Empties the queue for `(document_id, client_id)`.
    fn remove_edits(&mut self, document_id: &str, client_id: &str) -> Result<(), StoreError>;
}

type Key = (String, String);

fn key_of(document_id: &str, client_id: &str) -> Key {
    (document_id.to_string(), client_id.to_string())
}

/// A `HashMap`-backed store. Suffices for tests and for embedding the
/// engine in a process that doesn't need cross-restart persistence.
#[derive(Debug, Default)]
pub struct InMemoryStore<T, D> {
    documents: HashMap<Key, ClientDocument<T>>,
    shadows: HashMap<Key, ShadowDocument<T>>,
    backups: HashMap<Key, BackupShadowDocument<T>>,
    edits: HashMap<Key, Vec<Edit<D>>>,
}

impl<T, D> InMemoryStore<T, D> {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
            shadows: HashMap::new(),
            backups: HashMap::new(),
            edits: HashMap::new(),
        }
    }
}

impl<T: Clone, D: Clone + PartialEq> DataStore<T, D> for InMemoryStore<T, D> {
    fn save_client_document(&mut self, doc: &ClientDocument<T>) -> Result<(), StoreError> {
        self.documents
            .insert(key_of(&doc.id, &doc.client_id), doc.clone());
        Ok(())
    }

    fn get_client_document(
        &self,
        document_id: &str,
        client_id: &str,
    ) -> Result<Option<ClientDocument<T>>, StoreError> {
        Ok(self
            .documents
            .get(&key_of(document_id, client_id))
            .cloned())
    }

    fn save_shadow(&mut self, shadow: &ShadowDocument<T>) -> Result<(), StoreError> {
        let key = key_of(shadow.document_id(), shadow.client_id());
        self.shadows.insert(key, shadow.clone());
        Ok(())
    }

    fn get_shadow(
        &self,
        document_id: &str,
        client_id: &str,
    ) -> Result<Option<ShadowDocument<T>>, StoreError> {
        Ok(self.shadows.get(&key_of(document_id, client_id)).cloned())
    }

    fn save_backup(&mut self, backup: &BackupShadowDocument<T>) -> Result<(), StoreError> {
        let key = key_of(backup.document_id(), backup.client_id());
        self.backups.insert(key, backup.clone());
        Ok(())
    }

    fn get_backup(
        &self,
        document_id: &str,
        client_id: &str,
    ) -> Result<Option<BackupShadowDocument<T>>, StoreError> {
        Ok(self.backups.get(&key_of(document_id, client_id)).cloned())
    }

    fn save_edit(&mut self, edit: &Edit<D>) -> Result<(), StoreError> {
        let key = key_of(&edit.document_id, &edit.client_id);
        self.edits.entry(key).or_default().push(edit.clone());
        Ok(())
    }

    fn get_edits(&self, document_id: &str, client_id: &str) -> Result<Vec<Edit<D>>, StoreError> {
        Ok(self
            .edits
            .get(&key_of(document_id, client_id))
            .cloned()
            .unwrap_or_default())
    }

    fn remove_edit(&mut self, edit: &Edit<D>) -> Result<(), StoreError> {
        let key = key_of(&edit.document_id, &edit.client_id);
        if let Some(queue) = self.edits.get_mut(&key) {
            if let Some(pos) = queue.iter().position(|e| e == edit) {
                queue.remove(pos);
            }
        }
        Ok(())
    }

    fn remove_edits(&mut self, document_id: &str, client_id: &str) -> Result<(), StoreError> {
        self.edits.remove(&key_of(document_id, client_id));
        Ok(())
    }
}

/// A SQLite-backed store, generalizing the teacher crate's `DocumentDB`
/// (originally one `documents` table) to the four tables C2 requires.
/// Content and diffs are stored as serialized JSON text columns so the
/// store stays generic over `T`/`D`.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS client_documents (
                document_id TEXT NOT NULL,
                client_id   TEXT NOT NULL,
                content     TEXT NOT NULL,
                PRIMARY KEY (document_id, client_id)
            );
            CREATE TABLE IF NOT EXISTS shadows (
                document_id    TEXT NOT NULL,
                client_id      TEXT NOT NULL,
                client_version INTEGER NOT NULL,
                server_version INTEGER NOT NULL,
                content        TEXT NOT NULL,
                PRIMARY KEY (document_id, client_id)
            );
            CREATE TABLE IF NOT EXISTS backups (
                document_id    TEXT NOT NULL,
                client_id      TEXT NOT NULL,
                version        INTEGER NOT NULL,
                client_version INTEGER NOT NULL,
                server_version INTEGER NOT NULL,
                content        TEXT NOT NULL,
                PRIMARY KEY (document_id, client_id)
            );
            CREATE TABLE IF NOT EXISTS pending_edits (
                seq            INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id    TEXT NOT NULL,
                client_id      TEXT NOT NULL,
                client_version INTEGER NOT NULL,
                server_version INTEGER NOT NULL,
                checksum       TEXT NOT NULL,
                diffs          TEXT NOT NULL
            );",
        )?;
        Ok(())
    }
}

impl<T, D> DataStore<T, D> for SqliteStore
where
    T: Serialize + DeserializeOwned,
    D: Serialize + DeserializeOwned + PartialEq,
{
    fn save_client_document(&mut self, doc: &ClientDocument<T>) -> Result<(), StoreError> {
        let content = serde_json::to_string(&doc.content)?;
        self.conn.execute(
            "INSERT INTO client_documents (document_id, client_id, content)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(document_id, client_id) DO UPDATE SET content = excluded.content",
            params![doc.id, doc.client_id, content],
        )?;
        Ok(())
    }

    fn get_client_document(
        &self,
        document_id: &str,
        client_id: &str,
    ) -> Result<Option<ClientDocument<T>>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT content FROM client_documents WHERE document_id = ?1 AND client_id = ?2",
        )?;
        let mut rows = stmt.query(params![document_id, client_id])?;
        match rows.next()? {
            Some(row) => {
                let content: String = row.get(0)?;
                let content: T = serde_json::from_str(&content)?;
                Ok(Some(ClientDocument::new(document_id, client_id, content)))
            }
            None => Ok(None),
        }
    }

    fn save_shadow(&mut self, shadow: &ShadowDocument<T>) -> Result<(), StoreError> {
        let content = serde_json::to_string(&shadow.client_document.content)?;
        self.conn.execute(
            "INSERT INTO shadows (document_id, client_id, client_version, server_version, content)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(document_id, client_id) DO UPDATE SET
                client_version = excluded.client_version,
                server_version = excluded.server_version,
                content = excluded.content",
            params![
                shadow.document_id(),
                shadow.client_id(),
                shadow.client_version,
                shadow.server_version,
                content
            ],
        )?;
        Ok(())
    }

    fn get_shadow(
        &self,
        document_id: &str,
        client_id: &str,
    ) -> Result<Option<ShadowDocument<T>>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT client_version, server_version, content FROM shadows
             WHERE document_id = ?1 AND client_id = ?2",
        )?;
        let mut rows = stmt.query(params![document_id, client_id])?;
        match rows.next()? {
            Some(row) => {
                let client_version: i64 = row.get(0)?;
                let server_version: i64 = row.get(1)?;
                let content: String = row.get(2)?;
                let content: T = serde_json::from_str(&content)?;
                Ok(Some(ShadowDocument {
                    client_version,
                    server_version,
                    client_document: ClientDocument::new(document_id, client_id, content),
                }))
            }
            None => Ok(None),
        }
    }

    fn save_backup(&mut self, backup: &BackupShadowDocument<T>) -> Result<(), StoreError> {
        let content = serde_json::to_string(&backup.shadow_document.client_document.content)?;
        self.conn.execute(
            "INSERT INTO backups
                (document_id, client_id, version, client_version, server_version, content)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(document_id, client_id) DO UPDATE SET
                version = excluded.version,
                client_version = excluded.client_version,
                server_version = excluded.server_version,
                content = excluded.content",
            params![
                backup.document_id(),
                backup.client_id(),
                backup.version,
                backup.shadow_document.client_version,
                backup.shadow_document.server_version,
                content
            ],
        )?;
        Ok(())
    }

    fn get_backup(
        &self,
        document_id: &str,
        client_id: &str,
    ) -> Result<Option<BackupShadowDocument<T>>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT version, client_version, server_version, content FROM backups
             WHERE document_id = ?1 AND client_id = ?2",
        )?;
        let mut rows = stmt.query(params![document_id, client_id])?;
        match rows.next()? {
            Some(row) => {
                let version: i64 = row.get(0)?;
                let client_version: i64 = row.get(1)?;
                let server_version: i64 = row.get(2)?;
                let content: String = row.get(3)?;
                let content: T = serde_json::from_str(&content)?;
                Ok(Some(BackupShadowDocument {
                    version,
                    shadow_document: ShadowDocument {
                        client_version,
                        server_version,
                        client_document: ClientDocument::new(document_id, client_id, content),
                    },
                }))
            }
            None => Ok(None),
        }
    }

    fn save_edit(&mut self, edit: &Edit<D>) -> Result<(), StoreError> {
        let diffs = serde_json::to_string(&edit.diffs)?;
        self.conn.execute(
            "INSERT INTO pending_edits
                (document_id, client_id, client_version, server_version, checksum, diffs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                edit.document_id,
                edit.client_id,
                edit.client_version,
                edit.server_version,
                edit.checksum,
                diffs
            ],
        )?;
        Ok(())
    }

    fn get_edits(&self, document_id: &str, client_id: &str) -> Result<Vec<Edit<D>>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT client_version, server_version, checksum, diffs FROM pending_edits
             WHERE document_id = ?1 AND client_id = ?2 ORDER BY seq ASC",
        )?;
        let mut rows = stmt.query(params![document_id, client_id])?;
        let mut edits = Vec::new();
        while let Some(row) = rows.next()? {
            let client_version: i64 = row.get(0)?;
            let server_version: i64 = row.get(1)?;
            let checksum: String = row.get(2)?;
            let diffs: String = row.get(3)?;
            let diffs: Vec<D> = serde_json::from_str(&diffs)?;
            edits.push(Edit {
                client_id: client_id.to_string(),
                document_id: document_id.to_string(),
                client_version,
                server_version,
                checksum,
                diffs,
            });
        }
        Ok(edits)
    }

    fn remove_edit(&mut self, edit: &Edit<D>) -> Result<(), StoreError> {
        let existing = <Self as DataStore<T, D>>::get_edits(self, &edit.document_id, &edit.client_id)?;
        let Some(pos) = existing.iter().position(|e| e == edit) else {
            return Ok(());
        };
        self.conn.execute(
            "DELETE FROM pending_edits WHERE seq = (
                SELECT seq FROM pending_edits
                WHERE document_id = ?1 AND client_id = ?2
                ORDER BY seq ASC LIMIT 1 OFFSET ?3
            )",
            params![edit.document_id, edit.client_id, pos as i64],
        )?;
        Ok(())
    }

    fn remove_edits(&mut self, document_id: &str, client_id: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM pending_edits WHERE document_id = ?1 AND client_id = ?2",
            params![document_id, client_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_round_trips_client_document() {
        let mut store: InMemoryStore<String, i32> = InMemoryStore::new();
        let doc = ClientDocument::new("doc-1", "client-1", "hello".to_string());
        store.save_client_document(&doc).unwrap();
        let loaded = store.get_client_document("doc-1", "client-1").unwrap();
        assert_eq!(loaded, Some(doc));
    }

    #[test]
    fn in_memory_store_edit_queue_is_fifo_and_removable() {
        let mut store: InMemoryStore<String, i32> = InMemoryStore::new();
        let e1 = Edit::new("client-1", "doc-1", 0, 0, vec![1]);
        let e2 = Edit::new("client-1", "doc-1", 1, 0, vec![2]);
        store.save_edit(&e1).unwrap();
        store.save_edit(&e2).unwrap();
        assert_eq!(
            store.get_edits("doc-1", "client-1").unwrap(),
            vec![e1.clone(), e2.clone()]
        );
        store.remove_edit(&e1).unwrap();
        assert_eq!(store.get_edits("doc-1", "client-1").unwrap(), vec![e2]);
    }

    #[test]
    fn in_memory_store_remove_edits_empties_queue() {
        let mut store: InMemoryStore<String, i32> = InMemoryStore::new();
        store.save_edit(&Edit::new("c", "d", 0, 0, vec![1])).unwrap();
        store.remove_edits("d", "c").unwrap();
        assert!(store.get_edits("d", "c").unwrap().is_empty());
    }

    #[test]
    fn sqlite_store_round_trips_shadow_and_backup() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let shadow: ShadowDocument<String> =
            ShadowDocument::fresh(ClientDocument::new("doc-1", "client-1", "hi".to_string()));
        DataStore::<String, i32>::save_shadow(&mut store, &shadow).unwrap();
        let loaded: Option<ShadowDocument<String>> =
            DataStore::<String, i32>::get_shadow(&store, "doc-1", "client-1").unwrap();
        assert_eq!(loaded, Some(shadow.clone()));

        let backup = BackupShadowDocument::snapshot(shadow);
        DataStore::<String, i32>::save_backup(&mut store, &backup).unwrap();
        let loaded_backup: Option<BackupShadowDocument<String>> =
            DataStore::<String, i32>::get_backup(&store, "doc-1", "client-1").unwrap();
        assert_eq!(loaded_backup, Some(backup));
    }

    #[test]
    fn sqlite_store_edit_queue_round_trips_in_order() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let e1: Edit<i32> = Edit::new("client-1", "doc-1", 0, 0, vec![1]);
        let e2: Edit<i32> = Edit::new("client-1", "doc-1", 1, 0, vec![2]);
        DataStore::<i32, i32>::save_edit(&mut store, &e1).unwrap();
        DataStore::<i32, i32>::save_edit(&mut store, &e2).unwrap();
        let edits: Vec<Edit<i32>> =
            DataStore::<i32, i32>::get_edits(&store, "doc-1", "client-1").unwrap();
        assert_eq!(edits, vec![e1, e2]);
    }
}
