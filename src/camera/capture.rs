//! nokhwa capture backend
//!
//! Opens cameras by index on the platform's native API and decodes frames
//! to RGB on the calling thread.

use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;

use super::{CameraFrame, CaptureBackend, CaptureDevice};
use crate::config::CaptureSettings;
use crate::error::CaptureError;

/// Information about an available camera
#[derive(Clone, Debug)]
pub struct CameraInfo {
    /// Camera index
    pub index: u32,
    /// Camera name
    pub name: String,
}

/// Capture backend using the platform's native camera API.
#[derive(Debug, Default)]
pub struct NokhwaBackend;

impl NokhwaBackend {
    pub fn new() -> Self {
        Self
    }

    /// List available cameras
    pub fn list_cameras(&self) -> Vec<CameraInfo> {
        let mut cameras = Vec::new();

        match nokhwa::query(ApiBackend::Auto) {
            Ok(camera_list) => {
                for (idx, info) in camera_list.iter().enumerate() {
                    cameras.push(CameraInfo {
                        index: idx as u32,
                        name: info.human_name().to_string(),
                    });
                }
            }
            Err(e) => {
                log::warn!("Failed to enumerate cameras: {:?}", e);
            }
        }

        cameras
    }

    /// Create the camera, stepping down through format requests the driver may reject.
    fn create_camera(index: u32) -> Result<Camera, CaptureError> {
        let camera_index = CameraIndex::Index(index);

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
        let first = match Camera::new(camera_index.clone(), requested) {
            Ok(camera) => return Ok(camera),
            Err(e) => e,
        };
        log::debug!("Camera {}: highest resolution rejected: {:?}", index, first);

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::HighestResolution(
            Resolution::new(640, 480),
        ));
        let second = match Camera::new(camera_index.clone(), requested) {
            Ok(camera) => return Ok(camera),
            Err(e) => e,
        };
        log::debug!("Camera {}: 640x480 request rejected: {:?}", index, second);

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        Camera::new(camera_index, requested).map_err(|e| CaptureError::DeviceOpen {
            index,
            reason: e.to_string(),
        })
    }
}

impl CaptureBackend for NokhwaBackend {
    type Device = NokhwaDevice;

    fn open(&mut self, index: u32) -> Result<NokhwaDevice, CaptureError> {
        let mut camera = Self::create_camera(index)?;

        camera.open_stream().map_err(|e| CaptureError::DeviceOpen {
            index,
            reason: format!("failed to open stream: {}", e),
        })?;

        log::debug!(
            "Camera {} opened: {} ({}x{})",
            index,
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );

        Ok(NokhwaDevice {
            index,
            camera,
            frame_count: 0,
        })
    }
}

/// An open nokhwa camera with a running stream.
pub struct NokhwaDevice {
    index: u32,
    camera: Camera,
    frame_count: u64,
}

impl NokhwaDevice {
    pub fn name(&self) -> String {
        self.camera.info().human_name()
    }
}

impl CaptureDevice for NokhwaDevice {
    fn index(&self) -> u32 {
        self.index
    }

    fn configure(&mut self, settings: &CaptureSettings) {
        if let Some(size) = settings.buffer_size {
            log::debug!("Camera {}: buffer size {} not configurable, ignored", self.index, size);
        }

        if let (Some(width), Some(height)) = (settings.width, settings.height) {
            if let Err(e) = self.camera.set_resolution(Resolution::new(width, height)) {
                log::debug!(
                    "Camera {}: resolution {}x{} not applied: {:?}",
                    self.index,
                    width,
                    height,
                    e
                );
            }
        }
    }

    fn read(&mut self) -> Result<CameraFrame, CaptureError> {
        let buffer = self.camera.frame().map_err(|e| CaptureError::FrameRead {
            index: self.index,
            reason: e.to_string(),
        })?;

        let width = buffer.resolution().width();
        let height = buffer.resolution().height();
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CaptureError::FrameRead {
                index: self.index,
                reason: format!("failed to decode frame: {}", e),
            })?;

        let image = RgbImage::from_raw(width, height, decoded.into_raw()).ok_or_else(|| {
            CaptureError::FrameRead {
                index: self.index,
                reason: format!("decoded buffer does not match {}x{}", width, height),
            }
        })?;

        let frame_number = self.frame_count;
        self.frame_count += 1;
        Ok(CameraFrame::new(image, frame_number))
    }
}

impl Drop for NokhwaDevice {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("Camera {}: failed to stop stream: {:?}", self.index, e);
        }
        log::debug!("Camera {} released", self.index);
    }
}
