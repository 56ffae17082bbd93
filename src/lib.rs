//! Client-side meme gallery state: uploaded memes, likes, comments and the
//! remote catalog, kept in a local key-value store.

pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod http_clients;
pub mod models;
pub mod repositories;
pub mod sources;
pub mod startup;
pub mod storage;

pub use db::{FileStore, MemoryStore};
pub use domain::{CaptionSource, ImageHost, KeyValueStore, MemeSource};
pub use errors::AppError;
pub use models::{LikeOutcome, Meme, Profile, Theme};
pub use repositories::MemeRepository;
