use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

use crate::config::CONFIG;
use crate::media::playback::PlaybackCoordinator;
use crate::media::thumbnail_cache::ThumbnailCache;
use crate::services::thumbnailer::FrameOptions;

#[derive(Clone, Debug)]
pub struct VideoInfo {
    pub id: String,
    pub filename: String,
    pub created_at: SystemTime,
}

// Project videos on disk, re-listed at most every 30 seconds
pub struct ProjectCatalogue {
    pub videos: HashMap<String, VideoInfo>,
    pub last_refresh: SystemTime,
    pub initialized: bool,
}

impl ProjectCatalogue {
    pub fn new() -> Self {
        Self {
            videos: HashMap::new(),
            last_refresh: UNIX_EPOCH, // Set to epoch to force initial refresh
            initialized: false,
        }
    }

    pub fn needs_refresh(&self) -> bool {
        if !self.initialized {
            return true;
        }

        SystemTime::now()
            .duration_since(self.last_refresh)
            .map(|duration| duration > Duration::from_secs(30))
            .unwrap_or(true)
    }

    pub fn replace(&mut self, videos: Vec<VideoInfo>) {
        self.videos = videos.into_iter().map(|v| (v.id.clone(), v)).collect();
        self.last_refresh = SystemTime::now();
        self.initialized = true;
    }

    // Newest first
    pub fn sorted(&self) -> Vec<VideoInfo> {
        let mut videos: Vec<_> = self.videos.values().cloned().collect();
        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        videos
    }
}

impl Default for ProjectCatalogue {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AppState {
    pub thumbnails: ThumbnailCache,
    pub playback: Mutex<PlaybackCoordinator<String>>,
    pub catalogue: Mutex<ProjectCatalogue>,
    pub http: reqwest::Client,
    pub videos_dir: PathBuf,
    pub frame_options: FrameOptions,
    pub github_api_url: String,
}

impl AppState {
    pub fn new(thumbnails: ThumbnailCache, videos_dir: PathBuf, frame_options: FrameOptions) -> Self {
        Self {
            thumbnails,
            playback: Mutex::new(PlaybackCoordinator::new()),
            catalogue: Mutex::new(ProjectCatalogue::new()),
            http: reqwest::Client::new(),
            videos_dir,
            frame_options,
            github_api_url: "https://api.github.com".to_string(),
        }
    }

    pub fn from_config() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(&CONFIG.github_user_agent)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            thumbnails: ThumbnailCache::new(CONFIG.thumbnail_slots),
            playback: Mutex::new(PlaybackCoordinator::with_threshold(CONFIG.autoplay_threshold)),
            catalogue: Mutex::new(ProjectCatalogue::new()),
            http,
            videos_dir: CONFIG.videos_path(),
            frame_options: FrameOptions::from_config(),
            github_api_url: CONFIG.github_api_url.clone(),
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProjectSummary {
    pub id: String,
    pub filename: String,
    pub created_at: u64,
    pub video_url: String,
    pub thumbnail_url: String,
    pub thumbnail_cached: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ThumbnailResponse {
    pub id: String,
    pub thumbnail: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CacheStatus {
    pub capacity: usize,
    pub in_flight: usize,
    pub pending: usize,
    pub cached: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PlaybackState {
    pub current_playing_id: Option<String>,
    pub candidates: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VisibilityUpdate {
    pub id: String,
    pub ratio: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HoverUpdate {
    pub id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
}
