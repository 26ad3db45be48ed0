//! Conversation persistence
//!
//! Persistence is split in two layers:
//!
//! - [`KeyValueStore`]: a synchronous string key/value medium. [`SledStore`]
//!   keeps it on disk, [`MemoryStore`] keeps it in memory.
//! - [`ConversationStore`]: reads and writes the whole
//!   [`ConversationIndex`] under a single key. There is no per-conversation
//!   write; every save replaces the full serialized index.

use crate::conversation::ConversationIndex;
use crate::error::{ChatResult, ChatlineError};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::Arc;

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Default key under which the conversation index is stored
pub const DEFAULT_INDEX_KEY: &str = "chatline.conversations";

/// Synchronous, always-available key-value medium
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> ChatResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> ChatResult<()>;

    /// Delete the value under `key`; deleting a missing key succeeds
    fn remove(&self, key: &str) -> ChatResult<()>;
}

/// Whole-index persistence of conversations
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use chatline::conversation::Message;
/// use chatline::storage::{ConversationStore, MemoryStore};
///
/// # fn main() -> chatline::error::ChatResult<()> {
/// let store = ConversationStore::new(Arc::new(MemoryStore::new()));
/// let mut index = store.load_all()?;
/// assert!(index.is_empty());
///
/// index.append_message("Chat 1 - 1/1/2024", Message::user("hello"));
/// store.save_all(&index)?;
/// assert_eq!(store.load_all()?.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConversationStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
}

impl ConversationStore {
    /// Create a store over the given medium using [`DEFAULT_INDEX_KEY`]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(kv, DEFAULT_INDEX_KEY)
    }

    /// Create a store over the given medium using a custom key
    pub fn with_key(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
        }
    }

    /// Open a store backed by a `sled` database at `path`
    ///
    /// # Errors
    ///
    /// Returns `ChatlineError::Storage` if the database cannot be opened
    pub fn open(path: impl Into<PathBuf>, key: impl Into<String>) -> ChatResult<Self> {
        let kv = SledStore::open(path.into())?;
        Ok(Self::with_key(Arc::new(kv), key))
    }

    /// Key the index is stored under
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the entire conversation index
    ///
    /// Returns an empty index when nothing has been persisted yet.
    ///
    /// # Errors
    ///
    /// Returns `ChatlineError::Storage` if the medium fails or the stored
    /// payload cannot be parsed. The caller decides how to fall back.
    pub fn load_all(&self) -> ChatResult<ConversationIndex> {
        let Some(raw) = self.kv.get(&self.key)? else {
            return Ok(ConversationIndex::new());
        };

        serde_json::from_str(&raw).map_err(|e| {
            ChatlineError::Storage(format!(
                "Stored conversation index under '{}' is corrupt: {}",
                self.key, e
            ))
        })
    }

    /// Persist the entire conversation index, replacing what was stored
    ///
    /// # Errors
    ///
    /// Returns `ChatlineError::Storage` if serialization or the write fails
    pub fn save_all(&self, index: &ConversationIndex) -> ChatResult<()> {
        let raw = serde_json::to_string(index)
            .map_err(|e| ChatlineError::Storage(format!("Serialization failed: {}", e)))?;
        self.kv.set(&self.key, &raw)?;
        tracing::debug!(
            "Saved conversation index: {} conversations, {} bytes",
            index.len(),
            raw.len()
        );
        Ok(())
    }

    /// Raw persisted payload, if any
    pub fn raw(&self) -> ChatResult<Option<String>> {
        self.kv.get(&self.key)
    }

    /// Delete the persisted index entirely
    pub fn clear(&self) -> ChatResult<()> {
        self.kv.remove(&self.key)
    }
}

impl std::fmt::Debug for ConversationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Default on-disk location of the conversation database
///
/// Honors `CHATLINE_STORAGE_PATH` when set; otherwise uses the platform data
/// directory, e.g. `~/.local/share/chatline/conversations` on Linux.
///
/// # Errors
///
/// Returns `ChatlineError::Storage` if no data directory can be determined
pub fn default_storage_path() -> ChatResult<PathBuf> {
    if let Ok(override_path) = std::env::var("CHATLINE_STORAGE_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let proj_dirs = ProjectDirs::from("com", "chatline", "chatline")
        .ok_or_else(|| ChatlineError::Storage("Could not determine data directory".into()))?;
    Ok(proj_dirs.data_dir().join("conversations"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Conversation, Message};
    use serial_test::serial;
    use std::env;

    fn memory_store() -> ConversationStore {
        ConversationStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_load_all_empty_when_nothing_persisted() {
        let store = memory_store();
        let index = store.load_all().expect("load failed");
        assert!(index.is_empty());
    }

    #[test]
    fn test_load_all_corrupt_payload_is_storage_error() {
        let kv = MemoryStore::with_entry(DEFAULT_INDEX_KEY, "{not json");
        let store = ConversationStore::new(Arc::new(kv));
        let result = store.load_all();
        assert!(matches!(result, Err(ChatlineError::Storage(_))));
    }

    #[test]
    fn test_load_all_wrong_shape_is_storage_error() {
        let kv = MemoryStore::with_entry(DEFAULT_INDEX_KEY, r#"[{"id":1}]"#);
        let store = ConversationStore::new(Arc::new(kv));
        assert!(matches!(store.load_all(), Err(ChatlineError::Storage(_))));
    }

    #[test]
    fn test_save_all_overwrites_whole_index() {
        let store = memory_store();

        let mut first = ConversationIndex::new();
        first.append_message("a", Message::user("one"));
        first.append_message("b", Message::user("two"));
        store.save_all(&first).unwrap();

        let mut second = ConversationIndex::new();
        second.insert(Conversation::new("c"));
        store.save_all(&second).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains("c"));
        assert!(!loaded.contains("a"));
    }

    #[test]
    fn test_save_load_round_trip_is_byte_identical() {
        let store = memory_store();

        let mut index = ConversationIndex::new();
        index.append_message("Chat 2 - 1/1/2024", Message::user("later"));
        index.append_message("Chat 1 - 1/1/2024", Message::user("earlier"));
        index.append_message("Chat 1 - 1/1/2024", Message::assistant("reply"));
        store.save_all(&index).unwrap();
        let before = store.raw().unwrap().expect("payload present");

        let loaded = store.load_all().unwrap();
        store.save_all(&loaded).unwrap();
        let after = store.raw().unwrap().expect("payload present");

        assert_eq!(before, after);
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_custom_key_is_used() {
        let kv = Arc::new(MemoryStore::new());
        let store = ConversationStore::with_key(kv.clone(), "custom");
        store.save_all(&ConversationIndex::new()).unwrap();

        assert!(kv.get("custom").unwrap().is_some());
        assert!(kv.get(DEFAULT_INDEX_KEY).unwrap().is_none());
        assert_eq!(store.key(), "custom");
    }

    #[test]
    fn test_clear_removes_payload() {
        let store = memory_store();
        store.save_all(&ConversationIndex::new()).unwrap();
        store.clear().unwrap();
        assert!(store.raw().unwrap().is_none());
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_open_sled_backed_store() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let store =
            ConversationStore::open(dir.path().join("conversations"), DEFAULT_INDEX_KEY).unwrap();

        let mut index = ConversationIndex::new();
        index.append_message("Chat 1 - 1/1/2024", Message::user("persisted"));
        store.save_all(&index).unwrap();

        assert_eq!(store.load_all().unwrap(), index);
    }

    #[test]
    #[serial]
    fn test_default_storage_path_respects_env_override() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let path = dir.path().join("custom-db");
        env::set_var("CHATLINE_STORAGE_PATH", path.to_string_lossy().to_string());

        let resolved = default_storage_path().expect("path resolution failed");
        assert_eq!(resolved, path);

        env::remove_var("CHATLINE_STORAGE_PATH");
    }
}
