//! SQLite-backed record store.
//!
//! One table, `records(key TEXT PRIMARY KEY, value TEXT NOT NULL)`.
//! Batches run inside a single transaction so the atomicity contract of
//! [`RecordStore::apply_batch`] holds across process crashes.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension as _, params};
use tracing::debug;

use super::{BatchOp, PersistError, Record, RecordKey, RecordStore};

/// Durable record store over a single SQLite database file.
#[derive(Debug)]
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) the database at `path` and ensure the schema.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: &Path) -> Result<Self, PersistError> {
        let conn = Connection::open(path).map_err(backend)?;
        Self::with_connection(conn)
    }

    /// In-memory database; useful for tests that want the real SQL path.
    ///
    /// # Errors
    ///
    /// Returns an error when the database cannot be created.
    pub fn open_in_memory() -> Result<Self, PersistError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, PersistError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(backend)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn backend(err: rusqlite::Error) -> PersistError {
    PersistError::Backend(err.to_string())
}

impl RecordStore for SqliteRecordStore {
    fn get(&self, key: &RecordKey) -> Result<Option<serde_json::Value>, PersistError> {
        let conn = self.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM records WHERE key = ?1",
                params![key.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        match raw {
            None => Ok(None),
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| PersistError::Codec(key.to_string(), e)),
        }
    }

    fn put(&self, record: Record) -> Result<(), PersistError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO records (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![record.key.to_string(), record.value.to_string()],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn delete(&self, key: &RecordKey) -> Result<(), PersistError> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM records WHERE key = ?1",
            params![key.to_string()],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn apply_batch(&self, ops: &[BatchOp]) -> Result<(), PersistError> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(backend)?;
        for op in ops {
            match op {
                BatchOp::Put(record) => {
                    tx.execute(
                        "INSERT INTO records (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                        params![record.key.to_string(), record.value.to_string()],
                    )
                    .map_err(backend)?;
                }
                BatchOp::Delete(key) => {
                    tx.execute(
                        "DELETE FROM records WHERE key = ?1",
                        params![key.to_string()],
                    )
                    .map_err(backend)?;
                }
            }
        }
        tx.commit().map_err(backend)?;
        debug!(ops = ops.len(), "committed record batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteRecordStore;
    use crate::persist::{BatchOp, Record, RecordKey, RecordKind, RecordStore};

    fn key(id: &str) -> RecordKey {
        RecordKey::new(RecordKind::Proposal, id)
    }

    #[test]
    fn roundtrip_through_sql() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        store
            .put(Record {
                key: key("p-1"),
                value: serde_json::json!({"status": "open"}),
            })
            .unwrap();
        let got = store.get(&key("p-1")).unwrap().unwrap();
        assert_eq!(got["status"], "open");

        store.delete(&key("p-1")).unwrap();
        assert!(store.get(&key("p-1")).unwrap().is_none());
    }

    #[test]
    fn batch_is_transactional() {
        let store = SqliteRecordStore::open_in_memory().unwrap();
        store
            .apply_batch(&[
                BatchOp::Put(Record {
                    key: key("a"),
                    value: serde_json::json!(1),
                }),
                BatchOp::Put(Record {
                    key: key("b"),
                    value: serde_json::json!(2),
                }),
            ])
            .unwrap();
        assert!(store.get(&key("a")).unwrap().is_some());
        assert!(store.get(&key("b")).unwrap().is_some());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        {
            let store = SqliteRecordStore::open(&path).unwrap();
            store
                .put(Record {
                    key: key("durable"),
                    value: serde_json::json!(true),
                })
                .unwrap();
        }
        let store = SqliteRecordStore::open(&path).unwrap();
        assert_eq!(
            store.get(&key("durable")).unwrap().unwrap(),
            serde_json::json!(true)
        );
    }
}
