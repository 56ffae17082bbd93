use crate::errors::{SourceError, StoreError, UploadError};
use crate::models::{ImageUpload, Meme};
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Synchronous string-keyed store shared by every handle opened on it.
///
/// A missing key is a normal outcome, never an error. There are no
/// transactions; concurrent writers race and the last `set` per key wins.
pub trait KeyValueStore: Send + Sync + 'static { // Send+Sync+'static required for Arc<dyn>
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value`, visible to every later `get` on the same store.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// All keys starting with `prefix`, in key order.
    fn keys_with_prefix(&self, prefix: &str) -> BTreeSet<String>;
}

/// Read-only catalog of memes published by an external API.
#[async_trait]
pub trait MemeSource: Send + Sync + 'static {
    /// Fetches at most one page of memes, in the order the API returned them.
    async fn fetch_catalog(&self) -> Result<Vec<Meme>, SourceError>;
}

/// External image host that turns bytes into a durable URL.
#[async_trait]
pub trait ImageHost: Send + Sync + 'static {
    async fn upload(&self, image: ImageUpload) -> Result<String, UploadError>;
}

/// Source of caption ideas for a fresh upload.
#[async_trait]
pub trait CaptionSource: Send + Sync + 'static {
    async fn suggest_caption(&self) -> Result<String, SourceError>;
}
