//! Pinch Cam - camera probing and hand pinch visualizer
//!
//! Finds a camera that actually delivers picture content (streaming virtual
//! cameras often open fine but show a solid color for a while), then tracks
//! hands on it and reports the thumb-to-index pinch distance.

pub mod app;
pub mod camera;
pub mod config;
pub mod display;
pub mod effects;
pub mod error;
pub mod ml;

pub use app::{FrameSink, HandTracker, RunSummary};
pub use config::AppConfig;
pub use error::AppError;
