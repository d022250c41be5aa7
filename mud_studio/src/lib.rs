pub use mud_engine::*;

pub mod app;
pub mod preferences;
pub mod project;

pub use app::Studio;
