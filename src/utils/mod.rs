pub mod format;
pub mod logging;

pub use format::{format_distance, format_seconds, format_speed};
