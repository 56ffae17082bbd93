use crate::config::Config;
use crate::db::FileStore;
use crate::domain::{CaptionSource, ImageHost};
use crate::errors::AppError;
use crate::flows::leaderboard;
use crate::http_clients::{create_caption_source, create_http_client, create_image_host, create_meme_source};
use crate::models::{Meme, Profile, Theme};
use crate::repositories::MemeRepository;
use std::sync::Arc;
use tracing;

/// AppState holds the shared collaborators a UI binding layer talks to.
#[derive(Clone)]
pub struct AppState {
    pub repo: MemeRepository,
    /// `None` when no image host is configured.
    pub image_host: Option<Arc<dyn ImageHost>>,
    pub captions: Arc<dyn CaptionSource>,
}

/// The views a gallery shows, computed in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GallerySnapshot {
    pub profile: Profile,
    pub theme: Theme,
    pub uploaded: Vec<Meme>,
    /// Uploaded memes followed by the fetched catalog.
    pub memes: Vec<Meme>,
    pub liked: Vec<Meme>,
    pub leaderboard: Vec<Meme>,
}

impl GallerySnapshot {
    /// Recomputes the liked and leaderboard views after memes or likes change.
    pub fn refresh_derived(&mut self, repo: &MemeRepository) {
        self.liked = repo.derived_liked_memes(&self.memes);
        self.leaderboard = leaderboard(&self.liked);
    }
}

/// Wires the file-backed store and HTTP collaborators from configuration.
pub fn build_state(config: &Config) -> Result<AppState, AppError> {
    tracing::info!(path = %config.store_path.display(), "Startup: Opening meme store");
    let store = FileStore::open(&config.store_path)
        .map_err(|e| AppError::Init(format!("Failed to open meme store: {}", e)))?;

    let client = create_http_client(config)?;
    let source = create_meme_source(config, &client);
    let captions = create_caption_source(config, &client);
    let image_host =
        create_image_host(config, &client).map(|host| Arc::new(host) as Arc<dyn ImageHost>);

    Ok(AppState {
        repo: MemeRepository::new(Arc::new(store), Arc::new(source)),
        image_host,
        captions: Arc::new(captions),
    })
}

/// Loads the gallery in a fixed order.
///
/// Persisted profile, theme and uploads are read first, then the catalog is
/// fetched and merged, then the derived views are computed.
pub async fn init_gallery(repo: &MemeRepository) -> GallerySnapshot {
    tracing::info!("Startup: Loading persisted state...");
    let profile = repo.load_profile();
    let theme = repo.load_theme();
    let uploaded = repo.load_uploaded();

    tracing::info!(uploaded = uploaded.len(), "Startup: Fetching meme catalog...");
    let memes = repo.fetch_and_merge().await;

    let mut snapshot = GallerySnapshot {
        profile,
        theme,
        uploaded,
        memes,
        ..GallerySnapshot::default()
    };
    snapshot.refresh_derived(repo);

    tracing::info!(
        memes = snapshot.memes.len(),
        liked = snapshot.liked.len(),
        "Startup: Gallery initialization complete."
    );
    snapshot
}
