pub mod handlers;
pub mod models;
pub mod server;
pub mod thumbnails;
