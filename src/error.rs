//! Error types shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::camera::probe::ProbeReport;

/// Errors raised by a capture backend.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("could not open camera {index}: {reason}")]
    DeviceOpen { index: u32, reason: String },
    #[error("camera {index} produced no frame: {reason}")]
    FrameRead { index: u32, reason: String },
}

/// Errors raised while acquiring a camera through the prober.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("no camera found (probed {} device indices)", .report.results.len())]
    NoCameraFound { report: ProbeReport },
    #[error("selected camera could not be reopened: {0}")]
    Reopen(#[source] CaptureError),
}

/// Errors raised by the hand landmark backend.
#[derive(Error, Debug)]
pub enum PerceptionError {
    #[error("models directory not found, create a 'models' directory containing the hand landmark model")]
    ModelDirNotFound,
    #[error("hand landmark model not found: {0:?}")]
    ModelNotFound(PathBuf),
    #[error("ONNX Runtime error: {0}")]
    Runtime(String),
    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level application error.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("lost camera feed after {consecutive} consecutive failed reads")]
    StreamLost { consecutive: u32 },
    #[error("display error: {0}")]
    Display(String),
}
