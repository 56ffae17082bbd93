use crate::{
    domain::{CaptionSource, ImageHost},
    errors::AppError,
    models::{ExplorePage, ImageUpload, LikeOutcome, Meme, MemeDetail, Profile, ANONYMOUS_UPLOADER},
    repositories::MemeRepository,
};
use tracing;

/// Memes shown per explore page.
pub const EXPLORE_PAGE_SIZE: usize = 8;
/// Entries on the leaderboard.
pub const LEADERBOARD_SIZE: usize = 10;
/// Shown when no caption idea could be fetched.
pub const CAPTION_FAILED: &str = "Failed to generate 😢";

/// A meme the visitor wants to publish.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub image: Option<ImageUpload>,
    pub caption: String,
}

fn validate_image(image: Option<ImageUpload>) -> Result<ImageUpload, AppError> {
    let image = image.ok_or_else(|| AppError::Validation("an image is required".to_string()))?;
    if image.data.is_empty() {
        return Err(AppError::Validation("image data cannot be empty".to_string()));
    }
    Ok(image)
}

/// Timestamp id for a freshly uploaded meme (milliseconds since the epoch).
pub fn new_meme_id() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

/// Validates, uploads the image, then records the meme as the newest upload.
///
/// Nothing is stored unless the image host returned a URL.
pub async fn upload_meme(
    repo: &MemeRepository,
    host: &dyn ImageHost,
    request: UploadRequest,
) -> Result<Meme, AppError> {
    let image = validate_image(request.image)?;
    if request.caption.trim().is_empty() {
        return Err(AppError::Validation("a caption is required".to_string()));
    }

    let url = host.upload(image).await?;

    let meme = Meme {
        id: new_meme_id(),
        url: Some(url),
        name: request.caption,
        uploader: ANONYMOUS_UPLOADER.to_string(),
        likes: 0,
        comments: Vec::new(),
    };
    repo.add_meme(meme.clone())?;

    tracing::info!(meme_id = %meme.id, "Meme uploaded successfully");
    Ok(meme)
}

fn find_meme(repo: &MemeRepository, memes: &[Meme], id: &str) -> Option<Meme> {
    memes
        .iter()
        .find(|meme| meme.id == id)
        .cloned()
        .or_else(|| repo.load_uploaded().into_iter().find(|meme| meme.id == id))
}

/// Everything the meme page needs for `id`, looked up in `memes` and then in the uploads.
pub fn meme_detail(repo: &MemeRepository, memes: &[Meme], id: &str) -> Option<MemeDetail> {
    let Some(meme) = find_meme(repo, memes, id) else {
        tracing::warn!(meme_id = %id, "Meme not found");
        return None;
    };

    Some(MemeDetail {
        likes: repo.likes(id, meme.likes),
        comments: repo.comments(id),
        has_liked: repo.has_liked(id),
        meme,
    })
}

/// Likes `id`, counting up from the meme's own likes when no counter is stored yet.
pub fn like_meme(repo: &MemeRepository, memes: &[Meme], id: &str) -> Result<LikeOutcome, AppError> {
    let base = find_meme(repo, memes, id).map(|meme| meme.likes).unwrap_or(0);
    Ok(repo.like_with_base(id, base)?)
}

/// Case-insensitive caption search, [`EXPLORE_PAGE_SIZE`] results per 1-based page.
pub fn explore(memes: &[Meme], query: &str, page: usize) -> ExplorePage {
    let page = page.max(1);
    let needle = query.to_lowercase();

    let matches: Vec<&Meme> = memes
        .iter()
        .filter(|meme| meme.name.to_lowercase().contains(&needle))
        .collect();

    let total_pages = matches.len().div_ceil(EXPLORE_PAGE_SIZE).max(1);
    let start = (page - 1).saturating_mul(EXPLORE_PAGE_SIZE);

    ExplorePage {
        memes: matches
            .iter()
            .skip(start)
            .take(EXPLORE_PAGE_SIZE)
            .map(|meme| (*meme).clone())
            .collect(),
        page,
        total_pages,
        has_prev: page > 1,
        has_next: page.saturating_mul(EXPLORE_PAGE_SIZE) < matches.len(),
    }
}

/// Most-liked memes first, at most [`LEADERBOARD_SIZE`]. Ties keep their input order.
pub fn leaderboard(liked: &[Meme]) -> Vec<Meme> {
    let mut ranked = liked.to_vec();
    ranked.sort_by(|a, b| b.likes.cmp(&a.likes));
    ranked.truncate(LEADERBOARD_SIZE);
    ranked
}

/// Uploads a new avatar and stores it on the profile.
pub async fn update_avatar(
    repo: &MemeRepository,
    host: &dyn ImageHost,
    image: Option<ImageUpload>,
) -> Result<Profile, AppError> {
    let image = validate_image(image)?;
    let avatar = host.upload(image).await?;

    let mut profile = repo.load_profile();
    profile.avatar = avatar;
    repo.save_profile(&profile)?;
    Ok(profile)
}

/// A caption idea, or [`CAPTION_FAILED`] when none could be fetched.
pub async fn suggest_caption(captions: &dyn CaptionSource) -> String {
    match captions.suggest_caption().await {
        Ok(caption) => caption,
        Err(e) => {
            tracing::error!(error = %e, "Error fetching meme captions");
            CAPTION_FAILED.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(id: &str, name: &str, likes: u64) -> Meme {
        Meme::new(id, name).with_likes(likes)
    }

    #[test]
    fn explore_matches_case_insensitively() {
        let memes = vec![named("1", "Drake Hotline", 0), named("2", "Two Buttons", 0), named("3", "drake again", 0)];

        let page = explore(&memes, "DRAKE", 1);
        assert_eq!(page.memes.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["1", "3"]);
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_prev);
        assert!(!page.has_next);
    }

    #[test]
    fn explore_pages_by_eight() {
        let memes: Vec<Meme> = (0..20).map(|i| named(&i.to_string(), "meme", 0)).collect();

        let first = explore(&memes, "", 1);
        assert_eq!(first.memes.len(), 8);
        assert_eq!(first.total_pages, 3);
        assert!(first.has_next);

        let last = explore(&memes, "", 3);
        assert_eq!(last.memes.len(), 4);
        assert_eq!(last.memes[0].id, "16");
        assert!(last.has_prev);
        assert!(!last.has_next);

        let zero = explore(&memes, "", 0);
        assert_eq!(zero.page, 1);
    }

    #[test]
    fn explore_without_matches_is_one_empty_page() {
        let page = explore(&[named("1", "cat", 0)], "dog", 1);
        assert!(page.memes.is_empty());
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_next);
    }

    #[test]
    fn leaderboard_sorts_and_truncates() {
        let liked: Vec<Meme> = (0..12).map(|i| named(&i.to_string(), "m", i)).collect();

        let board = leaderboard(&liked);
        assert_eq!(board.len(), LEADERBOARD_SIZE);
        assert_eq!(board[0].likes, 11);
        assert_eq!(board[9].likes, 2);
    }

    #[test]
    fn leaderboard_ties_keep_order() {
        let liked = vec![named("a", "m", 3), named("b", "m", 5), named("c", "m", 3)];
        let board = leaderboard(&liked);
        assert_eq!(board.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn meme_ids_are_numeric_timestamps() {
        let id = new_meme_id();
        assert!(id.parse::<i64>().unwrap() > 0);
    }
}
