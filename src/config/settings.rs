use lazy_static::lazy_static;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::media::playback::DEFAULT_AUTOPLAY_THRESHOLD;
use crate::media::thumbnail_cache::DEFAULT_GENERATION_SLOTS;

pub struct Config {
    pub data_path: String,
    pub videos_dir: String,
    pub ffmpeg_bin: String,
    pub thumbnail_slots: usize,
    pub thumbnail_seek: String,
    pub thumbnail_width: u32,
    pub autoplay_threshold: f64,
    pub webserver_host: String,
    pub webserver_port: u16,
    pub github_api_url: String,
    pub github_user_agent: String,
}

impl Config {
    pub fn new() -> Self {
        let data_path = env::var("DATA_PATH").unwrap_or("./".to_string());
        let videos_dir =
            env::var("VIDEOS_DIR").unwrap_or(format!("{}/videos", data_path.trim_end_matches('/')));

        let ffmpeg_bin = env::var("FFMPEG_BIN").unwrap_or("ffmpeg".to_string());
        let thumbnail_slots = parse_var("THUMBNAIL_SLOTS", DEFAULT_GENERATION_SLOTS);
        let thumbnail_seek = env::var("THUMBNAIL_SEEK").unwrap_or("00:00:01".to_string());
        let thumbnail_width = parse_var("THUMBNAIL_WIDTH", 320);
        let autoplay_threshold = parse_var("AUTOPLAY_THRESHOLD", DEFAULT_AUTOPLAY_THRESHOLD);

        let webserver_host = env::var("WEBSERVER_HOST").unwrap_or("0.0.0.0".to_string());
        let webserver_port = parse_var("WEBSERVER_PORT", 8080);

        let github_api_url =
            env::var("GITHUB_API_URL").unwrap_or("https://api.github.com".to_string());
        let github_user_agent = env::var("GITHUB_USER_AGENT")
            .unwrap_or(format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")));

        Self {
            data_path,
            videos_dir,
            ffmpeg_bin,
            thumbnail_slots,
            thumbnail_seek,
            thumbnail_width,
            autoplay_threshold,
            webserver_host,
            webserver_port,
            github_api_url,
            github_user_agent,
        }
    }

    pub fn videos_path(&self) -> PathBuf {
        PathBuf::from(&self.videos_dir)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

// Unset falls back to the default, anything unparsable is a startup error.
fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => parse_or_panic(name, &raw),
        Err(_) => default,
    }
}

fn parse_or_panic<T: FromStr>(name: &str, raw: &str) -> T {
    raw.trim()
        .parse()
        .unwrap_or_else(|_| panic!("{} must be a valid {}", name, std::any::type_name::<T>()))
}

lazy_static! {
    pub static ref CONFIG: Config = Config::new();
}
