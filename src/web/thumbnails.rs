use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::future::Future;
use std::path::Path;
use std::time::SystemTime;
use tokio::fs;
use tracing::{error, info, warn};

use crate::services::thumbnailer::Thumbnailer;
use crate::web::models::{AppState, ProjectCatalogue, VideoInfo};

const VIDEO_EXTENSIONS: [&str; 3] = ["mp4", "webm", "mov"];

// Path segments under /api/thumbnails/ that are routes, not projects
const RESERVED_IDS: [&str; 1] = ["status"];

lazy_static! {
    static ref ID_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,127}$").unwrap();
}

pub fn is_valid_project_id(id: &str) -> bool {
    ID_PATTERN.is_match(id) && !RESERVED_IDS.contains(&id)
}

// Queue a thumbnail for one project video; the cache bounds how many run at once
pub fn request_thumbnail(
    state: &AppState,
    video: &VideoInfo,
) -> impl Future<Output = Result<Option<String>>> + Send + 'static {
    let video_path = state.videos_dir.join(&video.filename);
    let options = state.frame_options.clone();

    state
        .thumbnails
        .queue_thumbnail_generation(video.id.clone(), move || async move {
            Thumbnailer::generate_thumbnail(&video_path, &options).await
        })
}

// Generate thumbnails for every project that has none yet
pub async fn prewarm_thumbnails(state: &AppState) {
    let videos = {
        let mut catalogue = state.catalogue.lock().await;
        refresh_if_needed(&mut catalogue, &state.videos_dir).await;
        catalogue.sorted()
    };

    // Everything is queued up front, the cache decides what runs
    let requests: Vec<_> = videos
        .iter()
        .filter(|video| state.thumbnails.get_from_cache(&video.id).is_none())
        .map(|video| (video.id.clone(), request_thumbnail(state, video)))
        .collect();

    info!("Prewarming {} thumbnails", requests.len());

    for (id, request) in requests {
        match request.await {
            Ok(Some(_)) => info!("Generated thumbnail for project: {}", id),
            Ok(None) => info!("No frame available for project: {}", id),
            Err(e) => error!("Failed to generate thumbnail for {}: {}", id, e),
        }
    }
}

pub async fn refresh_if_needed(catalogue: &mut ProjectCatalogue, videos_dir: &Path) {
    if !catalogue.needs_refresh() {
        return;
    }

    match get_video_list(videos_dir).await {
        Ok(videos) => {
            info!("Catalogue refreshed with {} videos", videos.len());
            catalogue.replace(videos);
        }
        Err(e) => {
            error!("Failed to refresh video list from {}: {}", videos_dir.display(), e);
            // Avoid hammering a missing directory on every request
            catalogue.replace(Vec::new());
        }
    }
}

// Function to get the list of project videos
pub async fn get_video_list(dir_path: &Path) -> Result<Vec<VideoInfo>, std::io::Error> {
    let mut videos = Vec::new();

    let mut entries = fs::read_dir(dir_path).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();

        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);

        // Skip directories and non-video files
        if path.is_dir() || !is_video {
            continue;
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let id = path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        // The id ends up in URLs and cache keys
        if !is_valid_project_id(&id) {
            continue;
        }

        // One unreadable file should not empty the whole catalogue
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        let created_at = metadata
            .created()
            .or_else(|_| metadata.modified())
            .unwrap_or(SystemTime::now());

        videos.push(VideoInfo {
            id,
            filename,
            created_at,
        });
    }

    Ok(videos)
}

#[cfg(test)]
mod tests {
    use super::{get_video_list, is_valid_project_id, refresh_if_needed};
    use crate::web::models::ProjectCatalogue;

    #[test]
    fn test_project_id_validation() {
        assert!(is_valid_project_id("portfolio-reel_2024"));
        assert!(!is_valid_project_id(""));
        assert!(!is_valid_project_id("../secret"));
        assert!(!is_valid_project_id("-flag"));
        assert!(!is_valid_project_id("with space"));
        assert!(!is_valid_project_id("status"));
        assert!(is_valid_project_id("status-page"));
    }

    #[tokio::test]
    async fn test_reserved_id_is_left_out_of_catalogue() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("status.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("reel.mp4"), b"").unwrap();

        let ids: Vec<_> = get_video_list(dir.path())
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec!["reel"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_entry_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("reel.mp4"), b"").unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.mp4"), dir.path().join("ghost.mp4"))
            .unwrap();

        let ids: Vec<_> = get_video_list(dir.path())
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec!["reel"]);
    }

    #[tokio::test]
    async fn test_get_video_list_keeps_only_videos() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("reel.mp4"), b"").unwrap();
        std::fs::write(dir.path().join("teaser.WEBM"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();
        std::fs::write(dir.path().join("bad name.mp4"), b"").unwrap();
        std::fs::create_dir(dir.path().join("nested.mp4")).unwrap();

        let mut ids: Vec<_> = get_video_list(dir.path())
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["reel", "teaser"]);
    }

    #[tokio::test]
    async fn test_missing_directory_yields_empty_catalogue() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalogue = ProjectCatalogue::new();
        refresh_if_needed(&mut catalogue, &dir.path().join("absent")).await;
        assert!(catalogue.initialized);
        assert!(catalogue.videos.is_empty());
    }
}
