//! Effects module
//!
//! Per-frame overlays drawn over the camera image.

pub mod pinch;

pub use pinch::{PinchEffect, PinchMeasurement, PinchOverlay};
