//! Key-value blob persistence.
//!
//! The engine persists three opaque JSON blobs (`settings`, `schedules` and
//! `occurrence_log`). Each is wrapped in a versioned envelope so a future
//! format change can be detected instead of misread.
//!
//! Provides:
//! - [`BlobStore`]: the capability the engine is constructed with
//! - [`SqliteBlobStore`]: a `kv` table in `<data dir>/carebell.db`
//! - [`MemoryBlobStore`]: a process-local map for tests and embedding

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

use super::data_dir;

pub const SETTINGS_KEY: &str = "settings";
pub const SCHEDULES_KEY: &str = "schedules";
pub const OCCURRENCE_LOG_KEY: &str = "occurrence_log";

/// Current envelope version.
pub const BLOB_VERSION: u32 = 1;

/// Load and save opaque blobs by key.
pub trait BlobStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn save(&self, key: &str, blob: &str) -> Result<(), PersistenceError>;
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    payload: T,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    payload: &'a T,
}

/// Decode an enveloped blob. `Ok(None)` when the key has never been saved.
pub fn load_versioned<T: DeserializeOwned>(
    store: &dyn BlobStore,
    key: &str,
) -> Result<Option<T>, PersistenceError> {
    let Some(blob) = store.load(key)? else {
        return Ok(None);
    };
    let value: serde_json::Value = serde_json::from_str(&blob)?;
    let version = value
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| PersistenceError::LoadFailed {
            key: key.to_string(),
            message: "missing envelope version".to_string(),
        })?;
    if version != BLOB_VERSION as u64 {
        return Err(PersistenceError::VersionMismatch {
            key: key.to_string(),
            found: u32::try_from(version).unwrap_or(u32::MAX),
            expected: BLOB_VERSION,
        });
    }
    let envelope: Envelope<T> = serde_json::from_value(value)?;
    Ok(Some(envelope.payload))
}

/// Like [`load_versioned`], but any failure is logged and replaced by
/// `T::default()`. Loading never fails the caller.
pub fn load_or_default<T: DeserializeOwned + Default>(store: &dyn BlobStore, key: &str) -> T {
    match load_versioned(store, key) {
        Ok(Some(value)) => value,
        Ok(None) => {
            tracing::debug!(key, "no stored blob, using defaults");
            T::default()
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "unreadable blob, using defaults");
            T::default()
        }
    }
}

pub fn save_versioned<T: Serialize>(
    store: &dyn BlobStore,
    key: &str,
    payload: &T,
) -> Result<(), PersistenceError> {
    let blob = serde_json::to_string(&EnvelopeRef {
        version: BLOB_VERSION,
        payload,
    })?;
    store.save(key, &blob)
}

/// SQLite-backed blob store.
///
/// Blobs live in a single `kv` table; the connection is serialized behind a
/// mutex so the store can be shared across threads.
pub struct SqliteBlobStore {
    conn: Mutex<Connection>,
}

impl SqliteBlobStore {
    /// Open the store at `<data dir>/carebell.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be resolved or the
    /// database cannot be opened or migrated.
    pub fn open() -> Result<Self, PersistenceError> {
        let dir = data_dir().map_err(|e| PersistenceError::OpenFailed {
            path: Path::new(".").to_path_buf(),
            message: e.to_string(),
        })?;
        Self::open_at(dir.join("carebell.db"))
    }

    /// Open the store at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| PersistenceError::OpenFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, PersistenceError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl BlobStore for SqliteBlobStore {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let conn = self.conn.lock().map_err(|_| PersistenceError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, blob: &str) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().map_err(|_| PersistenceError::Poisoned)?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, blob],
        )?;
        Ok(())
    }
}

/// In-process blob store.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a raw blob, bypassing the envelope.
    pub fn with_blob(self, key: &str, blob: &str) -> Self {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), blob.to_string());
        self
    }
}

impl BlobStore for MemoryBlobStore {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let blobs = self.blobs.lock().map_err(|_| PersistenceError::Poisoned)?;
        Ok(blobs.get(key).cloned())
    }

    fn save(&self, key: &str, blob: &str) -> Result<(), PersistenceError> {
        let mut blobs = self.blobs.lock().map_err(|_| PersistenceError::Poisoned)?;
        blobs.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

impl<S: BlobStore + ?Sized> BlobStore for std::sync::Arc<S> {
    fn load(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, blob: &str) -> Result<(), PersistenceError> {
        (**self).save(key, blob)
    }
}
