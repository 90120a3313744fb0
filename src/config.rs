pub mod settings;

pub use settings::CONFIG;
