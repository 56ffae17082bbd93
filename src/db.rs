// Standard library imports
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

// External crate imports
use tracing;

// Internal crate imports
use crate::domain::KeyValueStore;
use crate::errors::StoreError;

/// Key names used by the gallery. Per-meme records are derived from the meme id.
pub mod keys {
    pub const UPLOADED_MEMES: &str = "uploadedMemes";
    pub const USER_PROFILE: &str = "userProfile";
    pub const DARK_MODE: &str = "darkMode";

    pub const LIKES_PREFIX: &str = "likes-";
    pub const LIKED_PREFIX: &str = "liked-";
    pub const COMMENTS_PREFIX: &str = "comments-";

    /// Value of a `liked-<id>` marker. Only its presence matters.
    pub const LIKED_MARKER: &str = "true";

    pub fn likes(id: &str) -> String {
        format!("{LIKES_PREFIX}{id}")
    }

    pub fn liked(id: &str) -> String {
        format!("{LIKED_PREFIX}{id}")
    }

    pub fn comments(id: &str) -> String {
        format!("{COMMENTS_PREFIX}{id}")
    }
}

fn prefixed(entries: &BTreeMap<String, String>, prefix: &str) -> BTreeSet<String> {
    entries
        .range(prefix.to_string()..)
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, _)| key.clone())
        .collect()
}

/// In-process store. Clones share the same entries, like tabs sharing one origin.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> BTreeSet<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        prefixed(&entries, prefix)
    }
}

/// Store that survives restarts: one JSON object file shared by every handle on the path.
///
/// The file is the only copy of the data. Reads go to the file, and a write
/// re-reads it, changes the one key and writes it back through a sibling temp
/// file, so keys written by other handles or processes are kept. Writers on
/// different handles are not serialised against each other; as with any
/// origin store, the last write to a key wins.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens the store at `path`.
    ///
    /// A missing file reads as empty. A file that is not a JSON object of
    /// strings also reads as empty, with a warning; the next `set` overwrites it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        };
        let entries = store.load()?;
        tracing::debug!(path = %store.path.display(), keys = entries.len(), "Store: Opened file store");
        Ok(store)
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "Store: File is malformed, reading as empty");
                    Ok(BTreeMap::new())
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(StoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Reads for the query side, where a failure reads as empty.
    fn load_or_empty(&self) -> BTreeMap<String, String> {
        self.load().unwrap_or_else(|e| {
            tracing::error!(error = %e, "Store: Failed to read file");
            BTreeMap::new()
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(entries)?;

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".{}.tmp", std::process::id()));
        let tmp_path = self.path.with_file_name(tmp_name);

        std::fs::write(&tmp_path, raw).map_err(|source| StoreError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Re-reads the file, applies `change` and writes the result back.
    fn update<F>(&self, key: &str, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        change(&mut entries);
        self.persist(&entries).inspect_err(|e| {
            tracing::error!(key, error = %e, "Store: Failed to persist write");
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.load_or_empty().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(key, |entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(key, |entries| {
            entries.remove(key);
        })
    }

    fn keys_with_prefix(&self, prefix: &str) -> BTreeSet<String> {
        prefixed(&self.load_or_empty(), prefix)
    }
}
