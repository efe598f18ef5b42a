//! Preview window
//!
//! Shows annotated frames in a minifb window. The window is created on the
//! first frame so it matches the camera's actual resolution.

use image::RgbImage;
use minifb::{Key, Window, WindowOptions};

use crate::app::FrameSink;
use crate::config::DisplayConfig;
use crate::effects::PinchOverlay;
use crate::error::AppError;

/// Convert HWC RGB buffer to packed 0RGB u32 for minifb
pub fn rgb_to_argb(buf: &[u8], width: usize, height: usize) -> Vec<u32> {
    let mut argb = Vec::with_capacity(width * height);
    for rgb in buf.chunks_exact(3).take(width * height) {
        let r = rgb[0] as u32;
        let g = rgb[1] as u32;
        let b = rgb[2] as u32;
        argb.push((r << 16) | (g << 8) | b);
    }
    argb
}

/// Window title carrying the pinch readout.
///
/// A pinched hand takes precedence so the distance shown always belongs to
/// the hand the flag refers to.
pub fn status_title(base: &str, overlay: &PinchOverlay) -> String {
    let pinched = overlay.measurements.iter().rev().find(|m| m.pinched);
    match pinched.or_else(|| overlay.primary()) {
        Some(m) if m.pinched => format!("{} - Distance: {} - PINCHED!", base, m.distance as i32),
        Some(m) => format!("{} - Distance: {}", base, m.distance as i32),
        None => format!("{} - no hand", base),
    }
}

/// minifb-backed frame sink. Closing the window, `q` or `Esc` ends the loop.
pub struct WindowSink {
    title: String,
    target_fps: usize,
    window: Option<Window>,
    size: (usize, usize),
    current_title: String,
}

impl WindowSink {
    pub fn new(config: &DisplayConfig) -> Self {
        Self {
            title: config.window_title.clone(),
            target_fps: config.target_fps,
            window: None,
            size: (0, 0),
            current_title: String::new(),
        }
    }

    fn create_window(&mut self, width: usize, height: usize) -> Result<(), AppError> {
        let mut window = Window::new(
            &format!("{} - q to quit", self.title),
            width,
            height,
            WindowOptions::default(),
        )
        .map_err(|e| AppError::Display(format!("failed to create window: {}", e)))?;
        window.set_target_fps(self.target_fps);

        log::info!("Window created: {}x{}", width, height);
        self.window = Some(window);
        self.size = (width, height);
        Ok(())
    }
}

impl FrameSink for WindowSink {
    fn is_open(&self) -> bool {
        match &self.window {
            Some(window) => {
                window.is_open() && !window.is_key_down(Key::Q) && !window.is_key_down(Key::Escape)
            }
            None => true,
        }
    }

    fn present(&mut self, frame: &RgbImage, overlay: &PinchOverlay) -> Result<(), AppError> {
        let width = frame.width() as usize;
        let height = frame.height() as usize;

        if self.window.is_none() {
            self.create_window(width, height)?;
        } else if self.size != (width, height) {
            // Skip frames with unexpected dimensions
            log::warn!(
                "Frame dimension mismatch: expected {}x{}, got {}x{}",
                self.size.0,
                self.size.1,
                width,
                height
            );
            return Ok(());
        }

        let title = status_title(&self.title, overlay);
        let Some(window) = self.window.as_mut() else {
            return Ok(());
        };

        let argb = rgb_to_argb(frame.as_raw(), width, height);
        window
            .update_with_buffer(&argb, width, height)
            .map_err(|e| AppError::Display(e.to_string()))?;

        if title != self.current_title {
            window.set_title(&title);
            self.current_title = title;
        }

        Ok(())
    }
}
