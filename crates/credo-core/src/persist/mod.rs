//! The abstract persistence contract.
//!
//! The store core is specified against a keyed-record store supporting
//! get/put/delete plus an atomic multi-record batch write. Record format is
//! JSON values keyed by `<kind>/<id>`; the workspace is implicit (one store
//! instance, one workspace, one record namespace).
//!
//! Two implementations ship here: [`MemoryRecordStore`] (default, tests)
//! and the SQLite adapter in [`sqlite`].

pub mod sqlite;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Keys and records
// ---------------------------------------------------------------------------

/// What a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Node,
    Proposal,
    Review,
    /// Store-level metadata (head revision, counters).
    Meta,
}

impl RecordKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Proposal => "proposal",
            Self::Review => "review",
            Self::Meta => "meta",
        }
    }
}

/// A record key: kind plus id, rendered `<kind>/<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub kind: RecordKind,
    pub id: String,
}

impl RecordKey {
    #[must_use]
    pub fn new(kind: RecordKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.id)
    }
}

/// A keyed JSON record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: RecordKey,
    pub value: serde_json::Value,
}

/// One entry of an atomic batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    Put(Record),
    Delete(RecordKey),
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure talking to the record store.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("record backend failure: {0}")]
    Backend(String),
    #[error("record {0} is not valid JSON: {1}")]
    Codec(String, #[source] serde_json::Error),
}

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Keyed-record persistence contract.
///
/// `apply_batch` must be atomic: either every operation in the batch is
/// durable or none is. Implementations should fail fast — the orchestrator
/// calls them outside its apply critical section and treats an error as
/// fatal to the call, never as something to retry while holding state.
pub trait RecordStore: Send + Sync {
    /// Fetch a record by key.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure; a missing key is `Ok(None)`.
    fn get(&self, key: &RecordKey) -> Result<Option<serde_json::Value>, PersistError>;

    /// Write one record.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    fn put(&self, record: Record) -> Result<(), PersistError>;

    /// Remove one record. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure.
    fn delete(&self, key: &RecordKey) -> Result<(), PersistError>;

    /// Atomically apply a batch of puts and deletes.
    ///
    /// # Errors
    ///
    /// Returns an error on backend failure; on error nothing from the
    /// batch may be visible.
    fn apply_batch(&self, ops: &[BatchOp]) -> Result<(), PersistError>;
}

// ---------------------------------------------------------------------------
// MemoryRecordStore
// ---------------------------------------------------------------------------

/// In-memory record store: the default backend and the test double.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, serde_json::Value>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, key: &RecordKey) -> Result<Option<serde_json::Value>, PersistError> {
        Ok(self.lock().get(&key.to_string()).cloned())
    }

    fn put(&self, record: Record) -> Result<(), PersistError> {
        self.lock().insert(record.key.to_string(), record.value);
        Ok(())
    }

    fn delete(&self, key: &RecordKey) -> Result<(), PersistError> {
        self.lock().remove(&key.to_string());
        Ok(())
    }

    fn apply_batch(&self, ops: &[BatchOp]) -> Result<(), PersistError> {
        // Single map mutation under one lock: trivially atomic.
        let mut records = self.lock();
        for op in ops {
            match op {
                BatchOp::Put(record) => {
                    records.insert(record.key.to_string(), record.value.clone());
                }
                BatchOp::Delete(key) => {
                    records.remove(&key.to_string());
                }
            }
        }
        Ok(())
    }
}
