//! Pinch Cam - Main Entry Point
//!
//! Picks the best camera, then shows a mirrored preview with the hand
//! skeleton and thumb-to-index pinch distance.

use std::process::ExitCode;

use pinch_cam::camera::probe::Prober;
use pinch_cam::camera::{CaptureDevice, NokhwaBackend};
use pinch_cam::config::AppConfig;
use pinch_cam::display::WindowSink;
use pinch_cam::error::{AppError, ProbeError};
use pinch_cam::ml::{HandDetector, OnnxHandDetector};
use pinch_cam::HandTracker;

const TROUBLESHOOTING: &[&str] = &[
    "Make sure the camera app is running on your phone",
    "In the PC client, check that the virtual camera is enabled",
    "Try closing and reopening the PC client",
    "Restart the camera app on your phone",
];

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Pinch Cam v{}", env!("CARGO_PKG_VERSION"));

    match run() {
        Ok(()) => {
            log::info!("Done!");
            ExitCode::SUCCESS
        }
        Err(AppError::Probe(ProbeError::NoCameraFound { report })) => {
            log::error!("No cameras found! (probed {} indices)", report.results.len());
            eprintln!("\nTROUBLESHOOTING:");
            for (i, tip) in TROUBLESHOOTING.iter().enumerate() {
                eprintln!("{}. {}", i + 1, tip);
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), AppError> {
    let config = AppConfig::from_args_or(AppConfig::default())?;

    let mut backend = NokhwaBackend::new();
    for camera in backend.list_cameras() {
        log::info!("Found camera {}: {}", camera.index, camera.name);
    }

    let acquired = Prober::new(config.probe.clone()).acquire(&mut backend)?;
    log::info!("Using camera {}: {}", acquired.device.index(), acquired.device.name());

    let detector: Option<Box<dyn HandDetector>> = match OnnxHandDetector::new(&config.perception) {
        Ok(detector) => Some(Box::new(detector)),
        Err(e) => {
            log::warn!("Failed to initialize hand detection: {}. Hand tracking disabled.", e);
            None
        }
    };

    log::info!("Press 'q' to quit");
    if acquired.stabilization.is_some_and(|s| !s.settled) {
        log::info!("If you see a solid color, wait a few seconds: the stream may still be starting");
    }

    let sink = WindowSink::new(&config.display);
    let mut tracker = HandTracker::new(acquired.device, detector, sink, config.display.clone());
    let summary = tracker.run()?;

    log::info!(
        "{} frames shown, {} with a pinch",
        summary.frames_shown,
        summary.pinched_frames
    );
    Ok(())
}
