//! Camera prober
//!
//! Walks device indices in ascending order, samples a few frames from each
//! and scores them by grayscale variation. Solid frames (the placeholder a
//! phone-streaming virtual camera shows before its stream arrives) score near
//! zero, real scenes score well above the threshold.
//!
//! Probing is sequential: opening two capture devices at once is unreliable
//! on common consumer platforms.

use std::fmt;
use std::thread;
use std::time::Duration;

use super::{CaptureBackend, CaptureDevice};
use crate::config::{ProbeConfig, ProbePolicy};
use crate::error::ProbeError;

/// One successful read during probing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameSample {
    /// Grayscale standard deviation
    pub variation: f64,
    /// Per-channel means (R, G, B)
    pub mean_rgb: [f64; 3],
}

/// Why a device was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// The device could not be opened
    OpenFailed,
    /// The device opened but no read produced a frame
    NoFrames,
}

/// Classification of a probed device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeStatus {
    Failed(FailureKind),
    /// Delivers frames with real content
    Working,
    /// Delivers frames, but they are (nearly) one solid color
    Warn,
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Failed(FailureKind::OpenFailed) => write!(f, "FAIL (could not open)"),
            ProbeStatus::Failed(FailureKind::NoFrames) => write!(f, "FAIL (opens but no frames)"),
            ProbeStatus::Working => write!(f, "WORKING"),
            ProbeStatus::Warn => write!(f, "WARN (opens but shows solid color)"),
        }
    }
}

/// Outcome of probing one device index.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeResult {
    pub index: u32,
    pub status: ProbeStatus,
    /// Reads attempted
    pub attempts: u32,
    /// Successful reads, in order
    pub samples: Vec<FrameSample>,
    /// Mean variation over successful reads; `None` when there were none
    pub mean_variation: Option<f64>,
}

impl ProbeResult {
    fn open_failed(index: u32) -> Self {
        Self {
            index,
            status: ProbeStatus::Failed(FailureKind::OpenFailed),
            attempts: 0,
            samples: Vec::new(),
            mean_variation: None,
        }
    }

    fn from_samples(index: u32, attempts: u32, samples: Vec<FrameSample>, threshold: f64) -> Self {
        let mean_variation = if samples.is_empty() {
            None
        } else {
            Some(samples.iter().map(|s| s.variation).sum::<f64>() / samples.len() as f64)
        };

        let status = match mean_variation {
            None => ProbeStatus::Failed(FailureKind::NoFrames),
            Some(mean) if mean > threshold => ProbeStatus::Working,
            Some(_) => ProbeStatus::Warn,
        };

        Self {
            index,
            status,
            attempts,
            samples,
            mean_variation,
        }
    }

    /// Number of successful reads.
    pub fn frames_read(&self) -> usize {
        self.samples.len()
    }

    /// Score used for ranking, if the device is eligible under `policy`.
    pub fn eligible_score(&self, policy: ProbePolicy) -> Option<f64> {
        match (policy, self.status) {
            (ProbePolicy::Strict, ProbeStatus::Working) => self.mean_variation,
            (ProbePolicy::Strict, _) => None,
            (ProbePolicy::Permissive, _) => self.mean_variation,
        }
    }
}

/// The chosen device.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Selection {
    pub index: u32,
    pub mean_variation: f64,
}

/// Per-device results in index order plus the selection.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeReport {
    pub policy: ProbePolicy,
    pub results: Vec<ProbeResult>,
    pub selection: Option<Selection>,
}

impl ProbeReport {
    /// Indices of all WORKING devices.
    pub fn working(&self) -> Vec<u32> {
        self.results
            .iter()
            .filter(|r| r.status == ProbeStatus::Working)
            .map(|r| r.index)
            .collect()
    }

    /// Whether any device opened at all.
    pub fn any_opened(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.status != ProbeStatus::Failed(FailureKind::OpenFailed))
    }
}

/// Result of the post-selection warm-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StabilizationReport {
    pub attempts: u32,
    pub good_frames: u32,
    /// The quota was reached before the attempt budget ran out
    pub settled: bool,
}

/// A selected device ready for the frame loop.
pub struct Acquired<D> {
    pub device: D,
    pub report: ProbeReport,
    pub stabilization: Option<StabilizationReport>,
}

impl<D> fmt::Debug for Acquired<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquired")
            .field("report", &self.report)
            .field("stabilization", &self.stabilization)
            .finish_non_exhaustive()
    }
}

/// Camera prober
pub struct Prober {
    config: ProbeConfig,
}

impl Prober {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe every index and release every device.
    pub fn survey<B: CaptureBackend>(&self, backend: &mut B) -> ProbeReport {
        self.scan(backend, false).0
    }

    /// Probe, select and hand over an open device.
    ///
    /// Under the strict policy every device is released during the scan and
    /// the selection is reopened. Under the permissive policy the winning
    /// handle is kept open, since some backends cannot reopen the same index
    /// twice in quick succession, and then warmed up until real frames flow.
    pub fn acquire<B: CaptureBackend>(&self, backend: &mut B) -> Result<Acquired<B::Device>, ProbeError> {
        let retain = self.config.policy == ProbePolicy::Permissive;
        let (report, retained) = self.scan(backend, retain);

        let Some(selection) = report.selection else {
            return Err(ProbeError::NoCameraFound { report });
        };

        log::info!(
            "Selected camera {} (variation {:.1})",
            selection.index,
            selection.mean_variation
        );

        match retained {
            Some(mut device) => {
                let stabilization = self.stabilize(&mut device);
                Ok(Acquired {
                    device,
                    report,
                    stabilization: Some(stabilization),
                })
            }
            None => {
                let mut device = backend.open(selection.index).map_err(ProbeError::Reopen)?;
                device.configure(&self.config.capture);
                Ok(Acquired {
                    device,
                    report,
                    stabilization: None,
                })
            }
        }
    }

    fn scan<B: CaptureBackend>(&self, backend: &mut B, retain: bool) -> (ProbeReport, Option<B::Device>) {
        let mut results = Vec::new();
        let mut best: Option<(Selection, Option<B::Device>)> = None;

        log::info!(
            "Scanning cameras 0-{} ({:?} policy)",
            self.config.max_index,
            self.config.policy
        );

        for index in 0..=self.config.max_index {
            let (result, device) = self.probe_device(backend, index);

            if let Some(score) = result.eligible_score(self.config.policy) {
                let better = best
                    .as_ref()
                    .map_or(true, |(current, _)| score > current.mean_variation);
                if better {
                    let kept = if retain { device } else { None };
                    // Replacing `best` drops any previously kept handle
                    best = Some((
                        Selection {
                            index,
                            mean_variation: score,
                        },
                        kept,
                    ));
                }
            }

            results.push(result);
        }

        let (selection, device) = match best {
            Some((selection, device)) => (Some(selection), device),
            None => (None, None),
        };

        let report = ProbeReport {
            policy: self.config.policy,
            results,
            selection,
        };
        (report, device)
    }

    /// Probe a single index. The device is returned only if it produced frames.
    fn probe_device<B: CaptureBackend>(&self, backend: &mut B, index: u32) -> (ProbeResult, Option<B::Device>) {
        let mut device = match backend.open(index) {
            Ok(device) => device,
            Err(e) => {
                log::debug!("{}", e);
                log::info!("Camera {}: FAIL (could not open)", index);
                return (ProbeResult::open_failed(index), None);
            }
        };

        device.configure(&self.config.capture);
        pause(self.config.settle_delay());

        let attempts = self.config.samples_per_device;
        let mut samples = Vec::with_capacity(attempts as usize);
        for attempt in 0..attempts {
            match device.read() {
                Ok(frame) => {
                    let sample = FrameSample {
                        variation: frame.variation_score(),
                        mean_rgb: frame.channel_means(),
                    };
                    log::debug!(
                        "Camera {} frame {}: std={:.1}, RGB=({:.0},{:.0},{:.0})",
                        index,
                        attempt + 1,
                        sample.variation,
                        sample.mean_rgb[0],
                        sample.mean_rgb[1],
                        sample.mean_rgb[2]
                    );
                    samples.push(sample);
                }
                Err(e) => log::debug!("{}", e),
            }
            pause(self.config.inter_sample_delay());
        }

        let result = ProbeResult::from_samples(index, attempts, samples, self.config.variance_threshold);
        match (result.status, result.mean_variation) {
            (ProbeStatus::Working, Some(mean)) => log::info!(
                "Camera {}: WORKING, frames {}/{}, variation {:.1}",
                index,
                result.frames_read(),
                attempts,
                mean
            ),
            (ProbeStatus::Warn, Some(mean)) => log::warn!(
                "Camera {}: opens but shows solid color, frames {}/{}, variation {:.1}",
                index,
                result.frames_read(),
                attempts,
                mean
            ),
            _ => log::warn!("Camera {}: opens but no frames", index),
        }

        if result.mean_variation.is_some() {
            (result, Some(device))
        } else {
            (result, None)
        }
    }

    /// Keep reading until a few frames with real content arrive.
    pub fn stabilize<D: CaptureDevice>(&self, device: &mut D) -> StabilizationReport {
        let config = &self.config.stabilization;
        let mut report = StabilizationReport {
            attempts: 0,
            good_frames: 0,
            settled: false,
        };

        log::info!("Waiting for camera {} feed to stabilize...", device.index());

        while report.attempts < config.max_attempts {
            report.attempts += 1;
            if let Ok(frame) = device.read() {
                if frame.variation_score() > config.variance_threshold {
                    report.good_frames += 1;
                    if report.good_frames >= config.quota {
                        report.settled = true;
                        break;
                    }
                }
            }
            pause(config.delay());
        }

        if report.settled {
            log::info!(
                "Camera {} stable after {} reads",
                device.index(),
                report.attempts
            );
        } else {
            log::warn!(
                "Camera {} still mostly solid after {} reads ({} good frames), continuing anyway",
                device.index(),
                report.attempts,
                report.good_frames
            );
        }

        report
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
