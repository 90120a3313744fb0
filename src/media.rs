pub mod playback;
pub mod thumbnail_cache;
