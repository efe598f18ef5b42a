//! Scripted capture backend for tests.

use std::cell::RefCell;
use std::rc::Rc;

use image::{Rgb, RgbImage};

use super::{CameraFrame, CaptureBackend, CaptureDevice};
use crate::config::CaptureSettings;
use crate::error::CaptureError;

/// Behavior of one device index.
#[derive(Clone, Debug)]
pub(crate) enum Script {
    OpenFails,
    /// One entry per read: `None` fails the read, `Some(std)` yields a frame
    /// with that exact variation score. The last entry repeats once the
    /// script runs out.
    Frames(Vec<Option<u8>>),
}

impl Script {
    pub fn steady(reads: usize, std: u8) -> Self {
        Script::Frames(vec![Some(std); reads])
    }
}

#[derive(Debug, Default)]
pub(crate) struct Stats {
    pub opens: Vec<u32>,
    pub releases: Vec<u32>,
    pub configured: Vec<u32>,
    pub reads: usize,
}

impl Stats {
    pub fn live(&self) -> usize {
        self.opens.len() - self.releases.len()
    }
}

pub(crate) struct SyntheticBackend {
    scripts: Vec<Script>,
    pub stats: Rc<RefCell<Stats>>,
}

impl SyntheticBackend {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts,
            stats: Rc::new(RefCell::new(Stats::default())),
        }
    }
}

impl CaptureBackend for SyntheticBackend {
    type Device = SyntheticDevice;

    fn open(&mut self, index: u32) -> Result<SyntheticDevice, CaptureError> {
        match self.scripts.get(index as usize) {
            Some(Script::Frames(reads)) => {
                self.stats.borrow_mut().opens.push(index);
                Ok(SyntheticDevice {
                    index,
                    reads: reads.clone(),
                    cursor: 0,
                    stats: self.stats.clone(),
                })
            }
            _ => Err(CaptureError::DeviceOpen {
                index,
                reason: "scripted open failure".to_string(),
            }),
        }
    }
}

pub(crate) struct SyntheticDevice {
    index: u32,
    reads: Vec<Option<u8>>,
    cursor: usize,
    stats: Rc<RefCell<Stats>>,
}

impl SyntheticDevice {
    /// A standalone device, not tied to a backend.
    pub fn standalone(reads: Vec<Option<u8>>) -> Self {
        let stats = Rc::new(RefCell::new(Stats::default()));
        stats.borrow_mut().opens.push(0);
        Self {
            index: 0,
            reads,
            cursor: 0,
            stats,
        }
    }
}

impl CaptureDevice for SyntheticDevice {
    fn index(&self) -> u32 {
        self.index
    }

    fn configure(&mut self, _settings: &CaptureSettings) {
        self.stats.borrow_mut().configured.push(self.index);
    }

    fn read(&mut self) -> Result<CameraFrame, CaptureError> {
        self.stats.borrow_mut().reads += 1;
        let step = self.reads.get(self.cursor).or(self.reads.last()).copied().flatten();
        self.cursor += 1;

        match step {
            Some(std) => Ok(CameraFrame::new(frame_with_std(std), self.cursor as u64)),
            None => Err(CaptureError::FrameRead {
                index: self.index,
                reason: "scripted read failure".to_string(),
            }),
        }
    }
}

impl Drop for SyntheticDevice {
    fn drop(&mut self) {
        self.stats.borrow_mut().releases.push(self.index);
    }
}

/// Gray 8x8 frame whose population std dev of intensity is exactly `std`.
pub(crate) fn frame_with_std(std: u8) -> RgbImage {
    let low = 128 - std.min(128);
    let high = 128u8.saturating_add(std.min(127));
    RgbImage::from_fn(8, 8, |x, y| {
        let v = if (x + y) % 2 == 0 { low } else { high };
        Rgb([v, v, v])
    })
}
