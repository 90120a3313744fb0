use anyhow::Result;
use async_process::{Command, Stdio};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;
use tracing::debug;

use crate::config::CONFIG;

#[derive(Clone, Debug)]
pub struct FrameOptions {
    pub ffmpeg_bin: String,
    pub seek: String,
    pub width: u32,
}

impl FrameOptions {
    pub fn from_config() -> Self {
        Self {
            ffmpeg_bin: CONFIG.ffmpeg_bin.clone(),
            seek: CONFIG.thumbnail_seek.clone(),
            width: CONFIG.thumbnail_width,
        }
    }
}

pub struct Thumbnailer;

impl Thumbnailer {
    // Seek into the video and pipe a single scaled JPEG frame to stdout.
    pub async fn generate_thumbnail(video_path: &Path, options: &FrameOptions) -> Result<Option<String>> {
        let output = Command::new(&options.ffmpeg_bin)
            .args(Self::frame_args(video_path, options))
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "Failed to extract frame from {}: {}",
                video_path.display(),
                error.trim()
            ));
        }

        // A seek past the end exits cleanly with nothing written.
        if output.stdout.is_empty() {
            debug!("No frame produced for {}", video_path.display());
            return Ok(None);
        }

        Ok(Some(Self::to_data_url("image/jpeg", &output.stdout)))
    }

    pub fn frame_args(video_path: &Path, options: &FrameOptions) -> Vec<String> {
        vec![
            "-loglevel".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            options.seek.clone(),
            "-i".to_string(),
            video_path.to_string_lossy().into_owned(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            format!("scale={}:-1", options.width), // keep aspect ratio
            "-q:v".to_string(),
            "2".to_string(),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-vcodec".to_string(),
            "mjpeg".to_string(),
            "-".to_string(),
        ]
    }

    pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
        format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
    }
}
