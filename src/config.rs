use std::{env, path::PathBuf, time::Duration};
use thiserror::Error;

use crate::storage::CloudinaryHost;

pub const DEFAULT_MEME_API_URL: &str = "https://api.imgflip.com/get_memes";
pub const DEFAULT_CAPTION_TEMPLATES_URL: &str = "https://api.memegen.link/templates";
pub const DEFAULT_STORE_PATH: &str = "meme_store.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
}

/// Where and how images are uploaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadConfig {
    pub upload_url: String,
    pub upload_preset: String,
}

#[derive(Clone, Debug)] // Clone needed if passed around, Debug for logging
pub struct Config {
    pub meme_api_url: String,
    pub caption_templates_url: String,
    /// `None` when no image host is configured; uploads are then unavailable.
    pub upload: Option<UploadConfig>,
    pub store_path: PathBuf,
    /// Transport default applies when unset.
    pub http_timeout: Option<Duration>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let meme_api_url = var("MEME_API_URL").unwrap_or_else(|| DEFAULT_MEME_API_URL.to_string());
        let caption_templates_url =
            var("CAPTION_TEMPLATES_URL").unwrap_or_else(|| DEFAULT_CAPTION_TEMPLATES_URL.to_string());
        let store_path = PathBuf::from(var("MEME_STORE_PATH").unwrap_or_else(|| DEFAULT_STORE_PATH.to_string()));

        let http_timeout = match var("HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::InvalidVar("HTTP_TIMEOUT_SECS".into(), e.to_string()))?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        // An explicit upload URL overrides the one derived from the cloud name.
        let upload_url = var("CLOUDINARY_UPLOAD_URL")
            .or_else(|| var("CLOUDINARY_CLOUD_NAME").map(|name| CloudinaryHost::endpoint_for(name.trim())));
        let upload = match upload_url {
            Some(upload_url) => {
                let upload_preset = var("CLOUDINARY_UPLOAD_PRESET")
                    .ok_or_else(|| ConfigError::MissingVar("CLOUDINARY_UPLOAD_PRESET".into()))?;
                Some(UploadConfig {
                    upload_url,
                    upload_preset,
                })
            }
            None => None,
        };

        Ok(Config {
            meme_api_url,
            caption_templates_url,
            upload,
            store_path,
            http_timeout,
        })
    }
}
