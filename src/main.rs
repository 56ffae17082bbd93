use meme_gallery::{
    config::Config,
    errors::AppError,
    startup::{build_state, init_gallery},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing (logging)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "meme_gallery=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let state = build_state(&config)?;

    let snapshot = init_gallery(&state.repo).await;

    tracing::info!(
        profile = %snapshot.profile.name,
        theme = ?snapshot.theme,
        uploaded = snapshot.uploaded.len(),
        memes = snapshot.memes.len(),
        "Gallery ready"
    );
    for (rank, meme) in snapshot.leaderboard.iter().enumerate() {
        tracing::info!(rank = rank + 1, meme_id = %meme.id, name = %meme.name, likes = meme.likes, "Leaderboard");
    }

    Ok(())
}
