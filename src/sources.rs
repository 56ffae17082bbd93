use crate::{
    domain::{CaptionSource, MemeSource},
    errors::SourceError,
    models::{null_as_default, string_or_number, Meme},
};
use anyhow::Context;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use tracing;

/// Most memes taken from one catalog response.
pub const CATALOG_LIMIT: usize = 10;

#[derive(Deserialize)]
struct CatalogResponse {
    data: CatalogData,
}

#[derive(Deserialize)]
struct CatalogData {
    memes: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct CatalogMeme {
    #[serde(deserialize_with = "string_or_number")]
    id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(default)]
    url: Option<String>,
}

impl From<CatalogMeme> for Meme {
    fn from(entry: CatalogMeme) -> Self {
        Meme {
            url: entry.url,
            ..Meme::new(entry.id, entry.name)
        }
    }
}

/// Parses a `{ data: { memes: [...] } }` body and keeps the first [`CATALOG_LIMIT`] entries.
///
/// Entries that do not decode are dropped on their own; the rest are kept.
pub fn parse_catalog(body: &str) -> Result<Vec<Meme>, SourceError> {
    let response: CatalogResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    Ok(response
        .data
        .memes
        .into_iter()
        .take(CATALOG_LIMIT)
        .filter_map(|entry| match serde_json::from_value::<CatalogMeme>(entry) {
            Ok(entry) => Some(Meme::from(entry)),
            Err(e) => {
                tracing::warn!(error = %e, "Catalog: Skipping malformed entry");
                None
            }
        })
        .collect())
}

async fn get_text(client: &reqwest::Client, url: &str) -> Result<String, SourceError> {
    client
        .get(url)
        .send()
        .await
        .context(format!("GET {url}: request failed"))
        .map_err(SourceError::Transport)?
        .error_for_status()
        .context(format!("GET {url}: non-2xx response"))
        .map_err(SourceError::Transport)?
        .text()
        .await
        .context(format!("GET {url}: failed to read body"))
        .map_err(SourceError::Transport)
}

/// Catalog backed by an Imgflip-style `get_memes` endpoint.
#[derive(Debug, Clone)]
pub struct ImgflipSource {
    client: reqwest::Client,
    url: String,
}

impl ImgflipSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl MemeSource for ImgflipSource {
    async fn fetch_catalog(&self) -> Result<Vec<Meme>, SourceError> {
        tracing::debug!(url = %self.url, "Catalog: Fetching memes");
        let body = get_text(&self.client, &self.url).await?;
        let memes = parse_catalog(&body)?;
        tracing::debug!(url = %self.url, count = memes.len(), "Catalog: Fetch successful");
        Ok(memes)
    }
}

#[derive(Deserialize)]
struct Template {
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
}

/// Shown when the template list is empty.
pub const NO_TEMPLATES_CAPTION: &str = "No meme templates found. Try again!";

/// Picks a random template name and phrases it as a caption idea.
pub fn caption_from_names<R: Rng + ?Sized>(names: &[String], rng: &mut R) -> String {
    match names.choose(rng) {
        Some(name) => format!("Try this caption! \"{name}\""),
        None => NO_TEMPLATES_CAPTION.to_string(),
    }
}

/// Caption ideas drawn from a memegen-style `templates` listing.
#[derive(Debug, Clone)]
pub struct MemegenCaptions {
    client: reqwest::Client,
    url: String,
}

impl MemegenCaptions {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CaptionSource for MemegenCaptions {
    async fn suggest_caption(&self) -> Result<String, SourceError> {
        let body = get_text(&self.client, &self.url).await?;
        let templates: Vec<Template> =
            serde_json::from_str(&body).map_err(|e| SourceError::Malformed(e.to_string()))?;

        let names: Vec<String> = templates
            .into_iter()
            .map(|t| t.name)
            .filter(|name| !name.trim().is_empty())
            .collect();
        tracing::debug!(url = %self.url, templates = names.len(), "Captions: Templates loaded");

        Ok(caption_from_names(&names, &mut rand::thread_rng()))
    }
}
