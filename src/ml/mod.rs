//! ML inference module
//!
//! Hand landmark detection using ONNX Runtime. Works with the MediaPipe hand
//! landmark model as converted in the PINTO Model Zoo: one square RGB input
//! in [0, 1], 21 landmarks in input pixels, a presence score and a
//! handedness score.

use std::path::{Path, PathBuf};

use image::RgbImage;
use ndarray::Array4;

use crate::config::{PerceptionConfig, TensorLayout};
use crate::error::PerceptionError;

/// Hand landmark indices (MediaPipe hand landmark model convention)
#[allow(dead_code)]
pub mod landmarks {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_DIP: usize = 7;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_TIP: usize = 20;
}

/// Number of landmarks per hand
pub const LANDMARK_COUNT: usize = 21;

/// Skeleton edges between landmark indices
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

/// Hand landmark (normalized coordinates)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HandLandmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Detected hand
#[derive(Clone, Debug, PartialEq)]
pub struct Hand {
    /// 21 landmarks
    pub landmarks: [HandLandmark; LANDMARK_COUNT],
    /// Presence score
    pub confidence: f32,
    /// Is right hand
    pub is_right: bool,
}

impl Default for Hand {
    fn default() -> Self {
        Self {
            landmarks: [HandLandmark::default(); LANDMARK_COUNT],
            confidence: 0.0,
            is_right: false,
        }
    }
}

/// Perception backend: finds hands in an RGB frame.
pub trait HandDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Hand>, PerceptionError>;
}

/// ONNX Runtime hand landmark detector
pub struct OnnxHandDetector {
    session: ort::session::Session,
    config: PerceptionConfig,
}

impl OnnxHandDetector {
    /// Load the landmark model
    pub fn new(config: &PerceptionConfig) -> Result<Self, PerceptionError> {
        let model_dir = match &config.model_dir {
            Some(dir) => dir.clone(),
            None => Self::find_model_dir()?,
        };
        log::info!("Model directory: {:?}", model_dir);

        let model_path = model_dir.join(&config.model_file);
        if !model_path.exists() {
            return Err(PerceptionError::ModelNotFound(model_path));
        }

        let session = Self::load_session(&model_path, config.intra_threads)?;
        log::info!("Loaded hand landmark model from {:?}", model_path);

        Ok(Self {
            session,
            config: config.clone(),
        })
    }

    fn load_session(path: &Path, intra_threads: usize) -> Result<ort::session::Session, PerceptionError> {
        ort::session::Session::builder()
            .map_err(|e| PerceptionError::Runtime(format!("failed to create session builder: {}", e)))?
            .with_intra_threads(intra_threads)
            .map_err(|e| PerceptionError::Runtime(format!("failed to set threads: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| PerceptionError::Runtime(format!("failed to load model: {}", e)))
    }

    /// Find the models directory
    fn find_model_dir() -> Result<PathBuf, PerceptionError> {
        // Next to the executable, then up to three levels above it (target/debug, target/release)
        if let Ok(exe_path) = std::env::current_exe() {
            for dir in exe_path.ancestors().skip(1).take(4) {
                let model_dir = dir.join("models");
                if model_dir.is_dir() {
                    return Ok(model_dir);
                }
            }
        }

        if let Ok(cwd) = std::env::current_dir() {
            let model_dir = cwd.join("models");
            if model_dir.is_dir() {
                return Ok(model_dir);
            }
        }

        Err(PerceptionError::ModelDirNotFound)
    }

    fn input_tensor(&self, image: &RgbImage) -> Result<ort::value::Tensor<f32>, PerceptionError> {
        let size = self.config.input_size as usize;
        let (shape, data) = match self.config.layout {
            TensorLayout::Nhwc => ((1, size, size, 3), preprocess_nhwc(image, self.config.input_size)),
            TensorLayout::Nchw => ((1, 3, size, size), preprocess_nchw(image, self.config.input_size)),
        };

        let array = Array4::from_shape_vec(shape, data)
            .map_err(|e| PerceptionError::Runtime(format!("failed to create input array: {}", e)))?;

        ort::value::Tensor::from_array(array)
            .map_err(|e| PerceptionError::Runtime(format!("failed to create tensor: {}", e)))
    }
}

impl HandDetector for OnnxHandDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Hand>, PerceptionError> {
        let input = self.input_tensor(image)?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .map_err(|e| PerceptionError::Runtime(format!("inference failed: {}", e)))?;

        let mut tensors: Vec<Vec<f32>> = Vec::new();
        for (_name, value) in outputs.iter() {
            if let Ok((_shape, data)) = value.try_extract_tensor::<f32>() {
                tensors.push(data.to_vec());
            }
        }

        let coords = tensors
            .iter()
            .find(|t| t.len() >= LANDMARK_COUNT * 3)
            .ok_or_else(|| PerceptionError::UnexpectedOutput("no landmark tensor".to_string()))?;
        let mut scalars = tensors.iter().filter(|t| t.len() == 1).map(|t| t[0]);
        let presence = scalars.next();
        let handedness = scalars.next();

        Ok(decode_hand(
            coords,
            presence,
            handedness,
            self.config.input_size,
            self.config.min_detection_confidence,
        )
        .into_iter()
        .collect())
    }
}

/// Turn raw model outputs into a hand, or `None` when presence is too low.
///
/// `coords` holds x, y, z triples in input pixels. Scores outside [0, 1] are
/// treated as logits.
pub fn decode_hand(
    coords: &[f32],
    presence: Option<f32>,
    handedness: Option<f32>,
    input_size: u32,
    min_confidence: f32,
) -> Option<Hand> {
    if coords.len() < LANDMARK_COUNT * 3 {
        return None;
    }

    let confidence = presence.map(as_probability).unwrap_or(1.0);
    if confidence < min_confidence {
        return None;
    }

    let scale = input_size as f32;
    let mut hand = Hand {
        confidence,
        is_right: handedness.map(as_probability).unwrap_or(0.0) > 0.5,
        ..Hand::default()
    };
    for (landmark, xyz) in hand.landmarks.iter_mut().zip(coords.chunks_exact(3)) {
        *landmark = HandLandmark {
            x: (xyz[0] / scale).clamp(0.0, 1.0),
            y: (xyz[1] / scale).clamp(0.0, 1.0),
            z: xyz[2] / scale,
        };
    }

    Some(hand)
}

fn as_probability(score: f32) -> f32 {
    if (0.0..=1.0).contains(&score) {
        score
    } else {
        1.0 / (1.0 + (-score).exp())
    }
}

/// Resize (nearest neighbor) to a square HWC buffer scaled to [0, 1].
fn preprocess_nhwc(image: &RgbImage, size: u32) -> Vec<f32> {
    let mut output = vec![0.0f32; (size * size * 3) as usize];
    let x_ratio = image.width() as f32 / size as f32;
    let y_ratio = image.height() as f32 / size as f32;

    if image.width() == 0 || image.height() == 0 {
        return output;
    }

    for y in 0..size {
        for x in 0..size {
            let src_x = ((x as f32 * x_ratio) as u32).min(image.width() - 1);
            let src_y = ((y as f32 * y_ratio) as u32).min(image.height() - 1);
            let pixel = image.get_pixel(src_x, src_y);

            let out_idx = ((y * size + x) * 3) as usize;
            for c in 0..3 {
                output[out_idx + c] = pixel.0[c] as f32 / 255.0;
            }
        }
    }

    output
}

/// Resize (nearest neighbor) to a square CHW buffer scaled to [0, 1].
fn preprocess_nchw(image: &RgbImage, size: u32) -> Vec<f32> {
    let hwc = preprocess_nhwc(image, size);
    let plane = (size * size) as usize;
    let mut output = vec![0.0f32; plane * 3];

    for (pixel_idx, rgb) in hwc.chunks_exact(3).enumerate() {
        for c in 0..3 {
            output[c * plane + pixel_idx] = rgb[c];
        }
    }

    output
}
