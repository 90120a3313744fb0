pub mod github;
pub mod thumbnailer;
