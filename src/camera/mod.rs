//! Camera capture module
//!
//! Defines the capture seam used by the prober and the frame loop, the frame
//! type passed between them, and the nokhwa-backed implementation.

pub mod capture;
pub mod probe;

#[cfg(test)]
pub(crate) mod synthetic;

use std::time::Instant;

use image::{Rgb, RgbImage};

use crate::config::CaptureSettings;
use crate::error::CaptureError;

pub use capture::{CameraInfo, NokhwaBackend, NokhwaDevice};
pub use probe::{ProbeReport, ProbeResult, ProbeStatus, Prober, Selection};

/// Camera frame data
#[derive(Clone, Debug)]
pub struct CameraFrame {
    /// RGB pixel data
    pub image: RgbImage,
    /// Frame number within the device's stream
    pub frame_number: u64,
    /// Capture timestamp
    pub timestamp: Instant,
}

impl CameraFrame {
    pub fn new(image: RgbImage, frame_number: u64) -> Self {
        Self {
            image,
            frame_number,
            timestamp: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Standard deviation of grayscale intensity across the frame.
    ///
    /// Near zero for solid frames (the green screen some virtual cameras show
    /// while their stream starts), tens for real scene content.
    pub fn variation_score(&self) -> f64 {
        let count = self.image.width() as usize * self.image.height() as usize;
        if count == 0 {
            return 0.0;
        }

        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for pixel in self.image.pixels() {
            let value = luma(pixel) as f64;
            sum += value;
            sum_sq += value * value;
        }

        let n = count as f64;
        let mean = sum / n;
        (sum_sq / n - mean * mean).max(0.0).sqrt()
    }

    /// Mean of each color channel as (R, G, B).
    pub fn channel_means(&self) -> [f64; 3] {
        let count = self.image.width() as usize * self.image.height() as usize;
        if count == 0 {
            return [0.0; 3];
        }

        let mut sums = [0u64; 3];
        for pixel in self.image.pixels() {
            for (sum, &channel) in sums.iter_mut().zip(pixel.0.iter()) {
                *sum += channel as u64;
            }
        }
        sums.map(|sum| sum as f64 / count as f64)
    }
}

/// Fixed-point BT.601 luma, weights summing to 1 << 14.
fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14) as u8
}

/// An open capture device.
///
/// Dropping the handle releases the device, so every exit path releases it.
pub trait CaptureDevice {
    /// Index the device was opened at.
    fn index(&self) -> u32;

    /// Apply capture settings. Best effort: unsupported settings are ignored.
    fn configure(&mut self, settings: &CaptureSettings);

    /// Read the next frame.
    fn read(&mut self) -> Result<CameraFrame, CaptureError>;
}

/// Opens capture devices by index.
pub trait CaptureBackend {
    type Device: CaptureDevice;

    fn open(&mut self, index: u32) -> Result<Self::Device, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> CameraFrame {
        CameraFrame::new(RgbImage::from_fn(width, height, |x, y| Rgb(f(x, y))), 0)
    }

    #[test]
    fn test_uniform_frame_has_no_variation() {
        let frame = frame_from_fn(32, 24, |_, _| [0, 200, 0]);
        assert_eq!(frame.variation_score(), 0.0);
    }

    #[test]
    fn test_checkerboard_variation() {
        let frame = frame_from_fn(16, 16, |x, y| {
            if (x + y) % 2 == 0 {
                [0, 0, 0]
            } else {
                [255, 255, 255]
            }
        });
        assert!((frame.variation_score() - 127.5).abs() < 1e-9);
    }

    #[test]
    fn test_variation_uses_luma_weights() {
        // Pure red and pure blue differ in luma even though both are saturated
        let frame = frame_from_fn(2, 1, |x, _| if x == 0 { [255, 0, 0] } else { [0, 0, 255] });
        let red = luma(&Rgb([255, 0, 0])) as f64;
        let blue = luma(&Rgb([0, 0, 255])) as f64;
        assert_eq!(red, 76.0);
        assert_eq!(blue, 29.0);
        assert!((frame.variation_score() - (red - blue) / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_channel_means() {
        let frame = frame_from_fn(2, 2, |x, _| if x == 0 { [10, 20, 30] } else { [30, 40, 50] });
        assert_eq!(frame.channel_means(), [20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_empty_frame() {
        let frame = CameraFrame::new(RgbImage::new(0, 0), 0);
        assert_eq!(frame.variation_score(), 0.0);
        assert_eq!(frame.channel_means(), [0.0; 3]);
    }
}
