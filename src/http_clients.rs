use crate::config::{Config, UploadConfig};
use crate::errors::AppError;
use crate::sources::{ImgflipSource, MemegenCaptions};
use crate::storage::CloudinaryHost;
use tracing;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

// Creates the shared HTTP client from application config.
// Without a configured timeout the transport default applies.
pub fn create_http_client(config: &Config) -> Result<reqwest::Client, AppError> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);

    if let Some(timeout) = config.http_timeout {
        tracing::info!(timeout_secs = timeout.as_secs(), "Setting HTTP timeout");
        builder = builder.timeout(timeout);
    } else {
        tracing::info!("Using default HTTP timeout.");
    }

    builder
        .build()
        .map_err(|e| AppError::Init(format!("Failed to build HTTP client: {}", e)))
}

// Creates the meme catalog source from a shared client.
pub fn create_meme_source(config: &Config, client: &reqwest::Client) -> ImgflipSource {
    ImgflipSource::new(client.clone(), config.meme_api_url.clone())
}

// Creates the caption suggestion source from a shared client.
pub fn create_caption_source(config: &Config, client: &reqwest::Client) -> MemegenCaptions {
    MemegenCaptions::new(client.clone(), config.caption_templates_url.clone())
}

// Creates the image host, if uploads are configured.
pub fn create_image_host(config: &Config, client: &reqwest::Client) -> Option<CloudinaryHost> {
    match &config.upload {
        Some(UploadConfig { upload_url, upload_preset }) => {
            tracing::info!(%upload_url, "Image uploads enabled");
            Some(CloudinaryHost::new(client.clone(), upload_url.clone(), upload_preset.clone()))
        }
        None => {
            tracing::warn!("No image host configured, uploads are disabled");
            None
        }
    }
}
