//! Configuration and serialization module.
//!
//! Every section defaults to the values the tools were tuned with, so a JSON
//! file only needs the fields it overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Config file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "pinch-cam.json";

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Camera probing.
    pub probe: ProbeConfig,
    /// Frame loop and window.
    pub display: DisplayConfig,
    /// Hand landmark model.
    pub perception: PerceptionConfig,
}

impl AppConfig {
    /// Load and validate a config file over the built-in defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::load_over(path, &Self::default())
    }

    /// Load and validate a config file. Fields the file leaves out keep the
    /// values from `defaults`.
    pub fn load_over(path: &Path, defaults: &Self) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_str_over(&text, defaults).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse JSON text layered over `defaults`.
    pub fn from_str_over(text: &str, defaults: &Self) -> Result<Self, serde_json::Error> {
        let overrides: serde_json::Value = serde_json::from_str(text)?;
        let mut merged = serde_json::to_value(defaults)?;
        merge_json(&mut merged, overrides);
        serde_json::from_value(merged)
    }

    /// Resolve configuration from the first positional argument, then the
    /// default file in the working directory, then `defaults`. A file only
    /// overrides the fields it names.
    pub fn from_args_or(defaults: Self) -> Result<Self, ConfigError> {
        if let Some(path) = std::env::args().nth(1) {
            return Self::load_over(Path::new(&path), &defaults);
        }

        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            log::info!("Using config file {:?}", local);
            return Self::load_over(local, &defaults);
        }

        defaults.validate()?;
        Ok(defaults)
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.probe.validate()?;
        self.display.validate()?;
        self.perception.validate()
    }
}

/// How eligible candidates are chosen among probed devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProbePolicy {
    /// Only devices whose mean variation exceeds the threshold.
    Strict,
    /// Any device that delivered at least one frame.
    #[default]
    Permissive,
}

/// Best-effort capture settings applied right after a device opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CaptureSettings {
    /// Requested driver-side frame buffer depth.
    pub buffer_size: Option<u32>,
    /// Requested frame width.
    pub width: Option<u32>,
    /// Requested frame height.
    pub height: Option<u32>,
}

/// Post-selection warm-up for slow-starting streaming sources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizationConfig {
    /// Upper bound on reads before handing the device over.
    pub max_attempts: u32,
    /// Variation a frame must exceed to count as real content.
    pub variance_threshold: f64,
    /// Good frames needed to stop early.
    pub quota: u32,
    /// Wait after each attempt, in milliseconds.
    pub delay_ms: u64,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            variance_threshold: 5.0,
            quota: 3,
            delay_ms: 200,
        }
    }
}

impl StabilizationConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Camera prober configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Highest device index to try (inclusive, probing starts at 0).
    pub max_index: u32,
    /// Reads per device.
    pub samples_per_device: u32,
    /// Wait after opening before the first read, in milliseconds.
    pub settle_delay_ms: u64,
    /// Wait after each read, in milliseconds.
    pub inter_sample_delay_ms: u64,
    /// Mean variation a device must exceed to be WORKING.
    pub variance_threshold: f64,
    /// Selection policy.
    pub policy: ProbePolicy,
    /// Settings applied to each opened device.
    pub capture: CaptureSettings,
    /// Warm-up after selection (permissive policy only).
    pub stabilization: StabilizationConfig,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_index: 5,
            samples_per_device: 15,
            settle_delay_ms: 1000,
            inter_sample_delay_ms: 100,
            variance_threshold: 15.0,
            policy: ProbePolicy::Permissive,
            capture: CaptureSettings {
                buffer_size: Some(1),
                width: Some(640),
                height: Some(480),
            },
            stabilization: StabilizationConfig::default(),
        }
    }
}

impl ProbeConfig {
    /// Preset for surveying every attached device under the strict policy.
    pub fn survey() -> Self {
        Self {
            max_index: 9,
            samples_per_device: 5,
            settle_delay_ms: 500,
            inter_sample_delay_ms: 0,
            variance_threshold: 15.0,
            policy: ProbePolicy::Strict,
            capture: CaptureSettings {
                buffer_size: Some(1),
                width: None,
                height: None,
            },
            stabilization: StabilizationConfig::default(),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn inter_sample_delay(&self) -> Duration {
        Duration::from_millis(self.inter_sample_delay_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.samples_per_device == 0 {
            return Err(ConfigError::Invalid(
                "probe.samples_per_device must be at least 1".to_string(),
            ));
        }
        check_threshold("probe.variance_threshold", self.variance_threshold)?;
        check_threshold(
            "probe.stabilization.variance_threshold",
            self.stabilization.variance_threshold,
        )?;
        if self.stabilization.quota == 0 {
            return Err(ConfigError::Invalid(
                "probe.stabilization.quota must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Frame loop and window configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Window title prefix.
    pub window_title: String,
    /// Flip frames horizontally before detection.
    pub mirror: bool,
    /// Consecutive failed reads tolerated before the stream counts as lost.
    pub max_consecutive_read_failures: u32,
    /// Thumb-to-index distance below which the hand counts as pinched.
    pub pinch_threshold_px: f32,
    /// Draw the full hand skeleton, not just the fingertips.
    pub draw_skeleton: bool,
    /// Window refresh cap.
    pub target_fps: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_title: "Hand Controller".to_string(),
            mirror: true,
            max_consecutive_read_failures: 30,
            pinch_threshold_px: 50.0,
            draw_skeleton: true,
            target_fps: 30,
        }
    }
}

impl DisplayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.pinch_threshold_px.is_finite() || self.pinch_threshold_px < 0.0 {
            return Err(ConfigError::Invalid(
                "display.pinch_threshold_px must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

/// Memory layout expected by the landmark model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// (1, H, W, 3)
    #[default]
    Nhwc,
    /// (1, 3, H, W)
    Nchw,
}

/// Hand landmark model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Explicit models directory; searched for when unset.
    pub model_dir: Option<PathBuf>,
    /// Model file name inside the models directory.
    pub model_file: String,
    /// Square input edge length in pixels.
    pub input_size: u32,
    /// Input tensor layout.
    pub layout: TensorLayout,
    /// Minimum hand presence score to report a hand.
    pub min_detection_confidence: f32,
    /// ONNX Runtime intra-op threads.
    pub intra_threads: usize,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            model_file: "hand_landmark.onnx".to_string(),
            input_size: 224,
            layout: TensorLayout::Nhwc,
            min_detection_confidence: 0.7,
            intra_threads: 2,
        }
    }
}

impl PerceptionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_size == 0 {
            return Err(ConfigError::Invalid(
                "perception.input_size must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_detection_confidence) {
            return Err(ConfigError::Invalid(
                "perception.min_detection_confidence must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Recursively overlay `overrides` onto `base`. Objects merge key by key,
/// anything else replaces.
fn merge_json(base: &mut serde_json::Value, overrides: serde_json::Value) {
    match (base, overrides) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn check_threshold(name: &str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Invalid(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )));
    }
    Ok(())
}
