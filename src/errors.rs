use std::path::PathBuf;
use thiserror::Error;

// --- Persistence Errors ---

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read store file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write store file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode store contents: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum RepoError {
    #[error("Meme id must not be empty")]
    EmptyId,

    #[error("Failed to encode value for key {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store backend error: {0}")]
    Store(#[from] StoreError),
}

// --- External Service Errors ---

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Catalog request failed: {0:#}")]
    Transport(#[source] anyhow::Error),

    #[error("Catalog response was malformed: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Image upload request failed: {0:#}")]
    Transport(#[source] anyhow::Error),

    #[error("Image host rejected the upload with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Image host response did not include a secure_url")]
    MissingUrl,
}

// --- Application Error ---

#[derive(Error, Debug)]
pub enum AppError {
    /// Caller input rejected before any network or store call.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Could not upload image")]
    Upload(#[source] UploadError),
    #[error("Could not save meme data")]
    Repository(#[source] RepoError),

    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Initialization error: {0}")]
    Init(String),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        AppError::Upload(err)
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::EmptyId => AppError::Validation(err.to_string()),
            e => AppError::Repository(e),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Repository(RepoError::Store(err))
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
