use crate::{
    db::keys,
    domain::{KeyValueStore, MemeSource},
    errors::RepoError,
    models::{LikeOutcome, Meme, Profile, Theme},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{self, info};

/// Client-side meme state: uploaded memes, like counters, liked flags and comments.
///
/// All state lives in the injected [`KeyValueStore`]; the repository itself
/// holds nothing but its two collaborators, so any number of instances can be
/// built over the same store.
#[derive(Clone)]
pub struct MemeRepository {
    store: Arc<dyn KeyValueStore>,
    source: Arc<dyn MemeSource>,
}

impl MemeRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, source: Arc<dyn MemeSource>) -> Self {
        info!("Initializing MemeRepository");
        Self { store, source }
    }

    /// Decodes the JSON stored under `key`. Absent, `null` and malformed values read as `None`.
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str::<Option<T>>(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(%key, error = %e, "Store: Ignoring malformed value");
                None
            }
        }
    }

    fn write_json<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), RepoError> {
        let raw = serde_json::to_string(value).map_err(|source| RepoError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, &raw)?;
        Ok(())
    }

    // --- Memes ---

    /// Raw records of the uploaded collection, undecodable ones included.
    fn uploaded_entries(&self) -> Vec<Value> {
        self.read_json(keys::UPLOADED_MEMES).unwrap_or_default()
    }

    /// Uploaded memes, most recent first.
    ///
    /// Records that do not decode are skipped one by one. When several records
    /// share an id the front-most one (the latest write) wins.
    pub fn load_uploaded(&self) -> Vec<Meme> {
        let memes = self
            .uploaded_entries()
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Meme>(entry) {
                Ok(meme) => Some(meme),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed uploaded meme");
                    None
                }
            })
            .collect();
        dedup_by_id(memes)
    }

    /// Uploaded memes followed by the remote catalog.
    ///
    /// A catalog failure is logged and leaves only the uploaded memes.
    pub async fn fetch_and_merge(&self) -> Vec<Meme> {
        let mut memes = self.load_uploaded();
        let uploaded_count = memes.len();

        match self.source.fetch_catalog().await {
            Ok(fetched) => {
                tracing::debug!(uploaded = uploaded_count, fetched = fetched.len(), "Merging uploaded and fetched memes");
                memes.extend(fetched);
            }
            Err(e) => {
                tracing::error!(error = %e, "Error fetching memes, showing uploaded memes only");
            }
        }
        memes
    }

    /// Prepends `meme` to the uploaded collection and stores the whole collection in one write.
    ///
    /// The caller assigns the id. An earlier record with the same id is replaced.
    pub fn add_meme(&self, meme: Meme) -> Result<(), RepoError> {
        if meme.id.trim().is_empty() {
            return Err(RepoError::EmptyId);
        }

        // Work on the raw records so entries this version cannot decode survive the rewrite.
        let mut entries = self.uploaded_entries();
        let before = entries.len();
        entries.retain(|entry| entry_id(entry).as_deref() != Some(meme.id.as_str()));
        if entries.len() != before {
            tracing::warn!(meme_id = %meme.id, "Replacing uploaded meme with the same id");
        }

        let record = serde_json::to_value(&meme).map_err(|source| RepoError::Encode {
            key: keys::UPLOADED_MEMES.to_string(),
            source,
        })?;
        entries.insert(0, record);
        self.write_json(keys::UPLOADED_MEMES, &entries)?;

        info!(meme_id = %meme.id, total = entries.len(), "Meme added to uploaded collection");
        Ok(())
    }

    // --- Likes ---

    pub fn has_liked(&self, id: &str) -> bool {
        self.store.get(&keys::liked(id)).is_some()
    }

    /// Ids this client has liked.
    pub fn liked_ids(&self) -> BTreeSet<String> {
        self.store
            .keys_with_prefix(keys::LIKED_PREFIX)
            .into_iter()
            .filter_map(|key| key.strip_prefix(keys::LIKED_PREFIX).map(str::to_string))
            .collect()
    }

    /// Stored like counter for `id`, or `fallback` when none is stored.
    pub fn likes(&self, id: &str, fallback: u64) -> u64 {
        let Some(raw) = self.store.get(&keys::likes(id)) else {
            return fallback;
        };
        match raw.trim().parse::<u64>() {
            Ok(likes) => likes,
            Err(e) => {
                tracing::warn!(meme_id = %id, value = %raw, error = %e, "Ignoring malformed like counter");
                fallback
            }
        }
    }

    /// Likes `id` once for this client; see [`MemeRepository::like_with_base`].
    pub fn like(&self, id: &str) -> Result<LikeOutcome, RepoError> {
        self.like_with_base(id, 0)
    }

    /// Likes `id` at most once for this client.
    ///
    /// The first call adds one to the stored counter (or to `base` when no
    /// counter is stored yet) and sets the liked flag. Later calls change
    /// nothing and report `already_liked`. The flag is never cleared.
    pub fn like_with_base(&self, id: &str, base: u64) -> Result<LikeOutcome, RepoError> {
        if self.has_liked(id) {
            tracing::debug!(meme_id = %id, "Meme already liked by this client");
            return Ok(LikeOutcome {
                likes: self.likes(id, base),
                already_liked: true,
            });
        }

        let counter_key = keys::likes(id);
        let previous = self.store.get(&counter_key);
        let likes = self.likes(id, base).saturating_add(1);
        self.store.set(&counter_key, &likes.to_string())?;

        if let Err(e) = self.store.set(&keys::liked(id), keys::LIKED_MARKER) {
            // Without the flag a retry would count again, so undo the increment.
            let restored = match &previous {
                Some(old) => self.store.set(&counter_key, old),
                None => self.store.remove(&counter_key),
            };
            if let Err(restore_err) = restored {
                tracing::error!(meme_id = %id, error = %restore_err, "Failed to restore like counter");
            }
            return Err(e.into());
        }

        info!(meme_id = %id, likes, "Meme liked");
        Ok(LikeOutcome {
            likes,
            already_liked: false,
        })
    }

    /// Memes from `all` this client liked, each carrying its stored counter.
    pub fn derived_liked_memes(&self, all: &[Meme]) -> Vec<Meme> {
        let liked = self.liked_ids();
        all.iter()
            .filter(|meme| liked.contains(&meme.id))
            .map(|meme| Meme {
                likes: self.likes(&meme.id, meme.likes),
                ..meme.clone()
            })
            .collect()
    }

    // --- Comments ---

    pub fn comments(&self, id: &str) -> Vec<String> {
        self.read_json(&keys::comments(id)).unwrap_or_default()
    }

    /// Appends `text` to the comments of `id` and returns the updated list.
    ///
    /// Blank text changes nothing and returns the current list.
    pub fn add_comment(&self, id: &str, text: &str) -> Result<Vec<String>, RepoError> {
        let mut comments = self.comments(id);
        if text.trim().is_empty() {
            tracing::debug!(meme_id = %id, "Ignoring blank comment");
            return Ok(comments);
        }

        comments.push(text.to_string());
        self.write_json(&keys::comments(id), &comments)?;

        tracing::debug!(meme_id = %id, count = comments.len(), "Comment added");
        Ok(comments)
    }

    // --- Profile & theme ---

    pub fn load_profile(&self) -> Profile {
        self.read_json(keys::USER_PROFILE).unwrap_or_default()
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<(), RepoError> {
        self.write_json(keys::USER_PROFILE, profile)?;
        info!(name = %profile.name, "Profile saved");
        Ok(())
    }

    pub fn load_theme(&self) -> Theme {
        Theme::from_stored(self.store.get(keys::DARK_MODE).as_deref())
    }

    pub fn save_theme(&self, theme: Theme) -> Result<(), RepoError> {
        self.store.set(keys::DARK_MODE, theme.as_stored())?;
        Ok(())
    }
}

fn entry_id(entry: &Value) -> Option<String> {
    match entry.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn dedup_by_id(memes: Vec<Meme>) -> Vec<Meme> {
    let mut seen = HashSet::new();
    memes
        .into_iter()
        .filter(|meme| seen.insert(meme.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::errors::{SourceError, StoreError};
    use async_trait::async_trait;

    struct FixedSource(Vec<Meme>);

    #[async_trait]
    impl MemeSource for FixedSource {
        async fn fetch_catalog(&self) -> Result<Vec<Meme>, SourceError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl MemeSource for FailingSource {
        async fn fetch_catalog(&self) -> Result<Vec<Meme>, SourceError> {
            Err(SourceError::Malformed("boom".to_string()))
        }
    }

    fn repo_with(store: &MemoryStore, source: impl MemeSource) -> MemeRepository {
        MemeRepository::new(Arc::new(store.clone()), Arc::new(source))
    }

    fn ids(memes: &[Meme]) -> Vec<&str> {
        memes.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn load_uploaded_is_empty_when_absent_or_malformed() {
        let store = MemoryStore::new();
        let repo = repo_with(&store, FailingSource);
        assert!(repo.load_uploaded().is_empty());

        store.set(keys::UPLOADED_MEMES, "not json").unwrap();
        assert!(repo.load_uploaded().is_empty());

        store.set(keys::UPLOADED_MEMES, "null").unwrap();
        assert!(repo.load_uploaded().is_empty());
    }

    #[test]
    fn add_meme_prepends_and_persists() {
        let store = MemoryStore::new();
        let repo = repo_with(&store, FailingSource);

        repo.add_meme(Meme::new("m0", "older")).unwrap();
        repo.add_meme(Meme::new("m1", "cap").with_url("http://x/y.png")).unwrap();

        let uploaded = repo.load_uploaded();
        assert_eq!(ids(&uploaded), vec!["m1", "m0"]);
        assert_eq!(uploaded[0].url.as_deref(), Some("http://x/y.png"));
        assert_eq!(uploaded[0].name, "cap");
    }

    #[test]
    fn add_meme_with_same_id_replaces_earlier_record() {
        let store = MemoryStore::new();
        let repo = repo_with(&store, FailingSource);

        repo.add_meme(Meme::new("1700000000000", "first")).unwrap();
        repo.add_meme(Meme::new("other", "other")).unwrap();
        repo.add_meme(Meme::new("1700000000000", "second")).unwrap();

        let uploaded = repo.load_uploaded();
        assert_eq!(ids(&uploaded), vec!["1700000000000", "other"]);
        assert_eq!(uploaded[0].name, "second");
    }

    #[test]
    fn add_meme_rejects_empty_id() {
        let store = MemoryStore::new();
        let repo = repo_with(&store, FailingSource);

        assert!(matches!(repo.add_meme(Meme::new("  ", "x")), Err(RepoError::EmptyId)));
        assert_eq!(store.get(keys::UPLOADED_MEMES), None);
    }

    #[test]
    fn load_uploaded_keeps_latest_duplicate() {
        let store = MemoryStore::new();
        store
            .set(
                keys::UPLOADED_MEMES,
                r#"[{"id":"a","name":"new"},{"id":"b"},{"id":"a","name":"old"}]"#,
            )
            .unwrap();
        let repo = repo_with(&store, FailingSource);

        let uploaded = repo.load_uploaded();
        assert_eq!(ids(&uploaded), vec!["a", "b"]);
        assert_eq!(uploaded[0].name, "new");
    }

    #[test]
    fn null_caption_does_not_hide_other_uploads() {
        let store = MemoryStore::new();
        store
            .set(keys::UPLOADED_MEMES, r#"[{"id":"1","name":"ok"},{"id":"2","name":null}]"#)
            .unwrap();
        let repo = repo_with(&store, FailingSource);

        let uploaded = repo.load_uploaded();
        assert_eq!(ids(&uploaded), vec!["1", "2"]);
        assert_eq!(uploaded[1].name, "");
    }

    #[test]
    fn add_meme_keeps_records_it_cannot_decode() {
        let store = MemoryStore::new();
        store
            .set(keys::UPLOADED_MEMES, r#"[{"id":"1","name":"ok"},{"name":"no id"},{"id":"3","likes":"lots"}]"#)
            .unwrap();
        let repo = repo_with(&store, FailingSource);
        assert_eq!(ids(&repo.load_uploaded()), vec!["1"]);

        repo.add_meme(Meme::new("new", "fresh")).unwrap();

        assert_eq!(ids(&repo.load_uploaded()), vec!["new", "1"]);
        let raw: Vec<Value> = serde_json::from_str(&store.get(keys::UPLOADED_MEMES).unwrap()).unwrap();
        assert_eq!(raw.len(), 4);
        assert_eq!(raw[2], serde_json::json!({"name": "no id"}));
        assert_eq!(raw[3], serde_json::json!({"id": "3", "likes": "lots"}));
    }

    #[test]
    fn add_meme_replaces_numeric_id_record() {
        let store = MemoryStore::new();
        store.set(keys::UPLOADED_MEMES, r#"[{"id":17,"name":"old"}]"#).unwrap();
        let repo = repo_with(&store, FailingSource);

        repo.add_meme(Meme::new("17", "new")).unwrap();

        let uploaded = repo.load_uploaded();
        assert_eq!(uploaded.len(), 1);
        assert_eq!(uploaded[0].name, "new");
    }

    #[tokio::test]
    async fn fetch_and_merge_puts_uploaded_first() {
        let store = MemoryStore::new();
        let repo = repo_with(&store, FixedSource(vec![Meme::new("a", "A"), Meme::new("b", "B")]));
        repo.add_meme(Meme::new("u1", "mine")).unwrap();

        let merged = repo.fetch_and_merge().await;
        assert_eq!(ids(&merged), vec!["u1", "a", "b"]);
    }

    #[tokio::test]
    async fn fetch_and_merge_degrades_to_uploaded_on_failure() {
        let store = MemoryStore::new();
        let repo = repo_with(&store, FailingSource);
        repo.add_meme(Meme::new("u1", "mine")).unwrap();
        repo.add_meme(Meme::new("u2", "mine too")).unwrap();

        let merged = repo.fetch_and_merge().await;
        assert_eq!(merged, repo.load_uploaded());
    }

    #[test]
    fn like_counts_once_per_client() {
        let store = MemoryStore::new();
        let repo = repo_with(&store, FailingSource);

        let first = repo.like("x").unwrap();
        assert_eq!(first, LikeOutcome { likes: 1, already_liked: false });

        for _ in 0..3 {
            let again = repo.like("x").unwrap();
            assert_eq!(again, LikeOutcome { likes: 1, already_liked: true });
        }
        assert_eq!(store.get("likes-x").as_deref(), Some("1"));
        assert_eq!(store.get("liked-x").as_deref(), Some("true"));
    }

    /// Store whose first write to a `liked-` key fails.
    struct FlagWriteFails {
        inner: MemoryStore,
        failed: std::sync::atomic::AtomicBool,
    }

    impl KeyValueStore for FlagWriteFails {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if key.starts_with(keys::LIKED_PREFIX) && !self.failed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Err(StoreError::Write {
                    path: "flag".into(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.inner.remove(key)
        }

        fn keys_with_prefix(&self, prefix: &str) -> BTreeSet<String> {
            self.inner.keys_with_prefix(prefix)
        }
    }

    #[test]
    fn failed_flag_write_undoes_the_increment() {
        let inner = MemoryStore::new();
        let flaky = FlagWriteFails {
            inner: inner.clone(),
            failed: std::sync::atomic::AtomicBool::new(false),
        };
        let repo = MemeRepository::new(Arc::new(flaky), Arc::new(FailingSource));

        assert!(repo.like("x").is_err());
        assert_eq!(inner.get("likes-x"), None);
        assert_eq!(inner.get("liked-x"), None);

        let retry = repo.like("x").unwrap();
        assert_eq!(retry, LikeOutcome { likes: 1, already_liked: false });
        assert_eq!(inner.get("likes-x").as_deref(), Some("1"));
    }

    #[test]
    fn failed_flag_write_restores_previous_counter() {
        let inner = MemoryStore::new();
        inner.set("likes-x", "6").unwrap();
        let flaky = FlagWriteFails {
            inner: inner.clone(),
            failed: std::sync::atomic::AtomicBool::new(false),
        };
        let repo = MemeRepository::new(Arc::new(flaky), Arc::new(FailingSource));

        assert!(repo.like("x").is_err());
        assert_eq!(inner.get("likes-x").as_deref(), Some("6"));

        assert_eq!(repo.like("x").unwrap().likes, 7);
        assert!(repo.like("x").unwrap().already_liked);
        assert_eq!(inner.get("likes-x").as_deref(), Some("7"));
    }

    #[test]
    fn like_uses_stored_counter_over_base() {
        let store = MemoryStore::new();
        store.set("likes-x", "41").unwrap();
        let repo = repo_with(&store, FailingSource);

        let outcome = repo.like_with_base("x", 3).unwrap();
        assert_eq!(outcome.likes, 42);
    }

    #[test]
    fn like_starts_from_base_without_counter() {
        let store = MemoryStore::new();
        let repo = repo_with(&store, FailingSource);

        let outcome = repo.like_with_base("x", 9).unwrap();
        assert_eq!(outcome.likes, 10);
        assert_eq!(repo.likes("x", 0), 10);
    }

    #[test]
    fn blank_comments_are_ignored() {
        let store = MemoryStore::new();
        let repo = repo_with(&store, FailingSource);
        repo.add_comment("x", "first").unwrap();

        assert_eq!(repo.add_comment("x", "").unwrap(), vec!["first"]);
        assert_eq!(repo.add_comment("x", "   ").unwrap(), vec!["first"]);
        assert_eq!(repo.comments("x"), vec!["first"]);

        let comments = repo.add_comment("x", "nice").unwrap();
        assert_eq!(comments.last().map(String::as_str), Some("nice"));
        assert_eq!(repo.comments("x"), vec!["first", "nice"]);
    }

    #[test]
    fn blank_comment_on_fresh_meme_writes_nothing() {
        let store = MemoryStore::new();
        let repo = repo_with(&store, FailingSource);

        assert!(repo.add_comment("x", "\t").unwrap().is_empty());
        assert_eq!(store.get("comments-x"), None);
    }

    #[test]
    fn liked_memes_overlay_stored_counters() {
        let store = MemoryStore::new();
        let repo = repo_with(&store, FailingSource);
        let all = vec![
            Meme::new("a", "A").with_likes(5),
            Meme::new("b", "B").with_likes(7),
            Meme::new("c", "C").with_likes(2),
        ];

        repo.like_with_base("a", 5).unwrap();
        store.set("liked-c", "true").unwrap();

        let liked = repo.derived_liked_memes(&all);
        assert_eq!(ids(&liked), vec!["a", "c"]);
        assert_eq!(liked[0].likes, 6);
        assert_eq!(liked[1].likes, 2);
    }

    #[test]
    fn profile_defaults_then_round_trips() {
        let store = MemoryStore::new();
        let repo = repo_with(&store, FailingSource);
        assert_eq!(repo.load_profile(), Profile::default());

        let profile = Profile {
            name: "sam".to_string(),
            bio: "memes only".to_string(),
            avatar: "https://img/a.png".to_string(),
        };
        repo.save_profile(&profile).unwrap();
        assert_eq!(repo.load_profile(), profile);

        store.set(keys::USER_PROFILE, "[1,2]").unwrap();
        assert_eq!(repo.load_profile(), Profile::default());
    }

    #[test]
    fn theme_round_trips() {
        let store = MemoryStore::new();
        let repo = repo_with(&store, FailingSource);
        assert_eq!(repo.load_theme(), Theme::Light);

        repo.save_theme(Theme::Dark).unwrap();
        assert_eq!(store.get("darkMode").as_deref(), Some("enabled"));
        assert_eq!(repo.load_theme(), Theme::Dark);

        repo.save_theme(Theme::Light).unwrap();
        assert_eq!(store.get("darkMode").as_deref(), Some("disabled"));
    }
}
