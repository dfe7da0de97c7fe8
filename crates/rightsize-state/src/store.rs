//! StateStore — redb-backed persistence for scaler records.
//!
//! Records are JSON-serialized into redb's `&[u8]` value column. Spec
//! writes (`put_scaler`) come from users; status writes (`update_status`,
//! `reset_status`) are read-modify-write inside one write transaction so
//! they never clobber a spec that changed underneath the loop.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use rightsize_core::{RecordStore, ScalerRecord, ScalerState, ScalerStatus};

use crate::error::{StateError, StateResult};
use crate::tables::SCALERS;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

fn encode(record: &ScalerRecord) -> StateResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| StateError::Codec {
        key: record.table_key(),
        reason: e.to_string(),
    })
}

fn decode(key: &str, bytes: &[u8]) -> StateResult<ScalerRecord> {
    serde_json::from_slice(bytes).map_err(|e| StateError::Codec {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Thread-safe scaler record store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "record store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory record store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SCALERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert a record, or replace the spec of an existing one.
    ///
    /// An existing record keeps its status: only the loop writes status.
    pub fn put_scaler(&self, record: &ScalerRecord) -> StateResult<ScalerRecord> {
        let key = record.table_key();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let stored;
        {
            let mut table = txn.open_table(SCALERS).map_err(map_err!(Table))?;
            let existing = match table.get(key.as_str()).map_err(map_err!(Storage))? {
                Some(guard) => Some(decode(&key, guard.value())?),
                None => None,
            };
            let mut next = record.clone();
            if let Some(existing) = existing {
                next.status = existing.status;
            }
            let value = encode(&next)?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Storage))?;
            stored = next;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "scaler stored");
        Ok(stored)
    }

    /// Get a record by `{namespace}/{name}` key.
    pub fn get_scaler(&self, key: &str) -> StateResult<Option<ScalerRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SCALERS).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Storage))? {
            Some(guard) => Ok(Some(decode(key, guard.value())?)),
            None => Ok(None),
        }
    }

    /// List all records in key order.
    pub fn list_scalers(&self) -> StateResult<Vec<ScalerRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SCALERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Storage))? {
            let (key, value) = entry.map_err(map_err!(Storage))?;
            results.push(decode(key.value(), value.value())?);
        }
        Ok(results)
    }

    /// Delete a record by key. Returns true if it existed.
    pub fn delete_scaler(&self, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(SCALERS).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Storage))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "scaler deleted");
        Ok(existed)
    }

    /// Overwrite the status of the stored record identified by `key`.
    ///
    /// Fails with `NotFound` if the record was deleted in the meantime.
    pub fn write_status(&self, key: &str, status: &ScalerStatus) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SCALERS).map_err(map_err!(Table))?;
            let mut stored = match table.get(key).map_err(map_err!(Storage))? {
                Some(guard) => decode(key, guard.value())?,
                None => return Err(StateError::NotFound(key.to_string())),
            };
            stored.status = status.clone();
            let value = encode(&stored)?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, state = ?status.state, concurrency = status.concurrency, "status written");
        Ok(())
    }

    /// Move a record back to `Pending` so the gate lets it adjust again.
    ///
    /// Concurrency and the last adjustment time are kept.
    pub fn reset_status(&self, key: &str) -> StateResult<ScalerRecord> {
        let mut record = self
            .get_scaler(key)?
            .ok_or_else(|| StateError::NotFound(key.to_string()))?;
        record.status.state = Some(ScalerState::Pending);
        self.write_status(key, &record.status)?;
        Ok(record)
    }
}

impl StateStore {
    /// Run a store operation on the blocking pool so callers can bound it.
    async fn off_runtime<T, F>(&self, op: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(StateStore) -> StateResult<T> + Send + 'static,
    {
        let store = self.clone();
        Ok(tokio::task::spawn_blocking(move || op(store)).await??)
    }
}

#[async_trait]
impl RecordStore for StateStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<ScalerRecord>> {
        let key = key.to_string();
        self.off_runtime(move |store| store.get_scaler(&key)).await
    }

    async fn update_status(&self, record: &ScalerRecord) -> anyhow::Result<()> {
        let key = record.table_key();
        let status = record.status.clone();
        self.off_runtime(move |store| store.write_status(&key, &status))
            .await
    }

    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        self.off_runtime(|store| {
            Ok(store.list_scalers()?.iter().map(ScalerRecord::table_key).collect())
        })
        .await
    }
}
