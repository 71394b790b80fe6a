//! Storage areas: string key/value engines backed by redb.
//!
//! A [`StorageArea`] is the raw engine contract: text in, text out. JSON
//! encoding lives one layer up in the storage adapter. [`RedbArea`] backs
//! the durable engine with an on-disk database and the ephemeral engine
//! with an in-memory one.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::tables::RECORDS;

/// Convert any `Display` error into a `StorageError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StorageError::$variant(e.to_string())
    };
}

/// Raw key/value engine contract.
pub trait StorageArea: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a record. Returns true if it existed.
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// All keys currently stored, in key order.
    fn keys(&self) -> StorageResult<Vec<String>>;
}

/// Storage area backed by redb.
#[derive(Clone)]
pub struct RedbArea {
    db: Arc<Database>,
}

impl RedbArea {
    /// Open (or create) an on-disk area at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let area = Self { db: Arc::new(db) };
        area.ensure_tables()?;
        debug!(?path, "storage area opened");
        Ok(area)
    }

    /// Create an in-memory area. Its contents die with the last clone.
    pub fn open_in_memory() -> StorageResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let area = Self { db: Arc::new(db) };
        area.ensure_tables()?;
        debug!("in-memory storage area opened");
        Ok(area)
    }

    fn ensure_tables(&self) -> StorageResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(RECORDS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

impl StorageArea for RedbArea {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
        let value = table
            .get(key)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_string());
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
            table.insert(key, value).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "record stored");
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "record removed");
        Ok(existed)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RECORDS).map_err(map_err!(Table))?;
        let mut keys = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}
