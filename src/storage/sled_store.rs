//! On-disk key-value medium backed by an embedded `sled` database

use super::KeyValueStore;
use crate::error::{ChatResult, ChatlineError};
use sled::Db;
use std::path::{Path, PathBuf};

/// Key-value medium persisted in a `sled` database directory
///
/// Every write is flushed before returning, so a completed `set` survives a
/// process restart.
pub struct SledStore {
    db: Db,
    path: PathBuf,
}

impl SledStore {
    /// Open or create a store at the given directory
    ///
    /// # Errors
    ///
    /// Returns `ChatlineError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```
    /// use chatline::storage::{KeyValueStore, SledStore};
    ///
    /// # fn main() -> chatline::error::ChatResult<()> {
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = SledStore::open(dir.path().join("kv"))?;
    /// store.set("greeting", "hello")?;
    /// assert_eq!(store.get("greeting")?.as_deref(), Some("hello"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn open(path: impl AsRef<Path>) -> ChatResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ChatlineError::Storage(format!("Failed to create data directory: {}", e))
            })?;
        }

        let db = sled::open(&path)
            .map_err(|e| ChatlineError::Storage(format!("Failed to open database: {}", e)))?;
        tracing::debug!("Opened sled store at {}", path.display());
        Ok(Self { db, path })
    }

    /// Directory of the underlying database
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> ChatResult<()> {
        self.db
            .flush()
            .map_err(|e| ChatlineError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> ChatResult<Option<String>> {
        match self
            .db
            .get(key.as_bytes())
            .map_err(|e| ChatlineError::Storage(format!("Get failed: {}", e)))?
        {
            Some(bytes) => {
                let value = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    ChatlineError::Storage(format!("Stored value is not UTF-8: {}", e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> ChatResult<()> {
        self.db
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| ChatlineError::Storage(format!("Insert failed: {}", e)))?;
        self.flush()
    }

    fn remove(&self, key: &str) -> ChatResult<()> {
        self.db
            .remove(key.as_bytes())
            .map_err(|e| ChatlineError::Storage(format!("Remove failed: {}", e)))?;
        self.flush()
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}
