use serde::{Deserialize, Deserializer, Serialize};

/// Uploader label used when nobody claims a meme.
pub const ANONYMOUS_UPLOADER: &str = "Anonymous";

/// A meme as shown in the gallery, either fetched from the catalog or uploaded locally.
///
/// Optional fields are defaulted when the record is decoded, so read sites never
/// have to re-apply defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Meme {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Image location. `None` renders as "no image".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Caption, also used for search.
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default = "default_uploader", deserialize_with = "uploader_or_anonymous")]
    pub uploader: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: Vec<String>,
}

impl Meme {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: None,
            name: name.into(),
            uploader: default_uploader(),
            likes: 0,
            comments: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_likes(mut self, likes: u64) -> Self {
        self.likes = likes;
        self
    }
}

fn default_uploader() -> String {
    ANONYMOUS_UPLOADER.to_string()
}

/// Reads an explicit `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn uploader_or_anonymous<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_uploader))
}

/// Accepts ids written either as JSON strings or as JSON numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// Result of a like attempt.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LikeOutcome {
    pub likes: u64,
    pub already_liked: bool,
}

/// The single local user profile. Last write wins.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub bio: String,
    pub avatar: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: ANONYMOUS_UPLOADER.to_string(),
            bio: "Meme Lover 😎".to_string(),
            avatar: "/boy.png".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// Value written under the `darkMode` key.
    pub fn as_stored(self) -> &'static str {
        match self {
            Theme::Dark => "enabled",
            Theme::Light => "disabled",
        }
    }

    /// Anything other than `"enabled"` reads as light.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("enabled") => Theme::Dark,
            _ => Theme::Light,
        }
    }
}

/// Binary image handed to an image host.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
            content_type: None,
        }
    }
}

/// Everything the meme page shows for one meme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemeDetail {
    pub meme: Meme,
    pub likes: u64,
    pub comments: Vec<String>,
    pub has_liked: bool,
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorePage {
    pub memes: Vec<Meme>,
    pub page: usize,
    pub total_pages: usize,
    pub has_prev: bool,
    pub has_next: bool,
}
