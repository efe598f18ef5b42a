//! Hand tracking frame loop
//!
//! Owns the selected capture device for the rest of the run. Each iteration
//! reads a frame, mirrors it, runs the hand detector, draws the pinch overlay
//! and hands the result to a sink (normally the preview window).

use image::RgbImage;

use crate::camera::{CameraFrame, CaptureDevice};
use crate::config::DisplayConfig;
use crate::effects::{PinchEffect, PinchOverlay};
use crate::error::AppError;
use crate::ml::HandDetector;

/// Destination for annotated frames.
pub trait FrameSink {
    /// False once the user asked to quit.
    fn is_open(&self) -> bool;

    fn present(&mut self, frame: &RgbImage, overlay: &PinchOverlay) -> Result<(), AppError>;
}

/// Counters reported when the loop ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_shown: u64,
    pub read_failures: u64,
    pub pinched_frames: u64,
}

/// Hand tracker application
pub struct HandTracker<D: CaptureDevice, S: FrameSink> {
    device: D,
    detector: Option<Box<dyn HandDetector>>,
    effect: PinchEffect,
    sink: S,
    config: DisplayConfig,
}

impl<D: CaptureDevice, S: FrameSink> HandTracker<D, S> {
    /// Without a detector the loop still runs and shows the plain camera feed.
    pub fn new(device: D, detector: Option<Box<dyn HandDetector>>, sink: S, config: DisplayConfig) -> Self {
        if detector.is_none() {
            log::warn!("No hand detector available, showing camera feed only");
        }

        Self {
            device,
            detector,
            effect: PinchEffect::from_config(&config),
            sink,
            config,
        }
    }

    /// Mirror, detect and annotate one frame.
    ///
    /// Frames from the capture backend are already in RGB order, which is
    /// what the detector expects.
    pub fn process_frame(&mut self, frame: CameraFrame) -> (RgbImage, PinchOverlay) {
        let mut image = frame.image;
        if self.config.mirror {
            image::imageops::flip_horizontal_in_place(&mut image);
        }

        let hands = match self.detector.as_mut() {
            Some(detector) => detector.detect(&image).unwrap_or_else(|e| {
                log::warn!("Inference error: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let overlay = self.effect.apply(&mut image, &hands);
        if let Some(m) = overlay.primary() {
            log::debug!(
                "Frame {}: distance {:.0}px{}",
                frame.frame_number,
                m.distance,
                if m.pinched { " (pinched)" } else { "" }
            );
        }

        (image, overlay)
    }

    /// Run until the sink closes or the stream is lost.
    pub fn run(&mut self) -> Result<RunSummary, AppError> {
        let mut summary = RunSummary::default();
        let mut consecutive_failures = 0u32;

        log::info!("Starting hand tracking (camera {})", self.device.index());

        while self.sink.is_open() {
            let frame = match self.device.read() {
                Ok(frame) => frame,
                Err(e) => {
                    consecutive_failures += 1;
                    summary.read_failures += 1;
                    log::debug!("{}", e);

                    if consecutive_failures > self.config.max_consecutive_read_failures {
                        log::error!("Lost camera feed!");
                        return Err(AppError::StreamLost {
                            consecutive: consecutive_failures,
                        });
                    }
                    continue;
                }
            };
            consecutive_failures = 0;

            let (image, overlay) = self.process_frame(frame);
            if overlay.pinched() == Some(true) {
                summary.pinched_frames += 1;
            }

            self.sink.present(&image, &overlay)?;
            summary.frames_shown += 1;
        }

        log::info!(
            "Hand tracking stopped after {} frames ({} failed reads)",
            summary.frames_shown,
            summary.read_failures
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use image::Rgb;

    use super::*;
    use crate::camera::synthetic::SyntheticDevice;
    use crate::error::PerceptionError;
    use crate::ml::{landmarks, Hand, HandLandmark};

    /// Sink that stays open for a fixed number of frames.
    struct RecordingSink {
        remaining: usize,
        signals: Rc<RefCell<Vec<Option<bool>>>>,
    }

    impl RecordingSink {
        fn new(frames: usize) -> Self {
            Self {
                remaining: frames,
                signals: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl FrameSink for RecordingSink {
        fn is_open(&self) -> bool {
            self.remaining > 0
        }

        fn present(&mut self, _frame: &RgbImage, overlay: &PinchOverlay) -> Result<(), AppError> {
            self.remaining -= 1;
            self.signals.borrow_mut().push(overlay.pinched());
            Ok(())
        }
    }

    /// Returns a fixed hand and records the top-left pixel it was shown.
    struct FixedDetector {
        hands: Vec<Hand>,
        seen: Rc<RefCell<Vec<[u8; 3]>>>,
    }

    impl HandDetector for FixedDetector {
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<Hand>, PerceptionError> {
            self.seen.borrow_mut().push(image.get_pixel(0, 0).0);
            Ok(self.hands.clone())
        }
    }

    struct FailingDetector;

    impl HandDetector for FailingDetector {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<Hand>, PerceptionError> {
            Err(PerceptionError::Runtime("boom".to_string()))
        }
    }

    fn pinching_hand() -> Hand {
        let mut hand = Hand::default();
        hand.landmarks[landmarks::THUMB_TIP] = HandLandmark { x: 0.5, y: 0.5, z: 0.0 };
        hand.landmarks[landmarks::INDEX_FINGER_TIP] = HandLandmark { x: 0.5, y: 0.5, z: 0.0 };
        hand
    }

    fn config(budget: u32) -> DisplayConfig {
        DisplayConfig {
            max_consecutive_read_failures: budget,
            ..DisplayConfig::default()
        }
    }

    #[test]
    fn test_stream_lost_after_budget() {
        let device = SyntheticDevice::standalone(vec![Some(40), None]);
        let mut tracker = HandTracker::new(device, None, RecordingSink::new(usize::MAX), config(3));

        match tracker.run() {
            Err(AppError::StreamLost { consecutive }) => assert_eq!(consecutive, 4),
            other => panic!("expected StreamLost, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_budget_stops_on_first_failure() {
        let device = SyntheticDevice::standalone(vec![None]);
        let mut tracker = HandTracker::new(device, None, RecordingSink::new(10), config(0));

        assert!(matches!(tracker.run(), Err(AppError::StreamLost { consecutive: 1 })));
    }

    #[test]
    fn test_failures_reset_after_a_good_frame() {
        let reads = vec![None, None, Some(10), None, None, Some(10)];
        let device = SyntheticDevice::standalone(reads);
        let sink = RecordingSink::new(2);
        let mut tracker = HandTracker::new(device, None, sink, config(2));

        let summary = tracker.run().unwrap();
        assert_eq!(
            summary,
            RunSummary {
                frames_shown: 2,
                read_failures: 4,
                pinched_frames: 0
            }
        );
    }

    #[test]
    fn test_pinch_signal_reaches_sink() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let detector = FixedDetector {
            hands: vec![pinching_hand()],
            seen: seen.clone(),
        };
        let sink = RecordingSink::new(3);
        let signals = sink.signals.clone();
        let device = SyntheticDevice::standalone(vec![Some(20)]);
        let mut tracker = HandTracker::new(device, Some(Box::new(detector)), sink, config(30));

        let summary = tracker.run().unwrap();
        assert_eq!(summary.pinched_frames, 3);
        assert_eq!(*signals.borrow(), vec![Some(true); 3]);
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn test_no_detector_gives_no_signal() {
        let sink = RecordingSink::new(2);
        let signals = sink.signals.clone();
        let device = SyntheticDevice::standalone(vec![Some(20)]);
        let mut tracker = HandTracker::new(device, None, sink, config(30));

        tracker.run().unwrap();
        assert_eq!(*signals.borrow(), vec![None, None]);
    }

    #[test]
    fn test_detector_errors_are_not_fatal() {
        let sink = RecordingSink::new(2);
        let signals = sink.signals.clone();
        let device = SyntheticDevice::standalone(vec![Some(20)]);
        let mut tracker = HandTracker::new(device, Some(Box::new(FailingDetector)), sink, config(30));

        assert_eq!(tracker.run().unwrap().frames_shown, 2);
        assert_eq!(*signals.borrow(), vec![None, None]);
    }

    #[test]
    fn test_frames_are_mirrored_before_detection() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let detector = FixedDetector {
            hands: Vec::new(),
            seen: seen.clone(),
        };
        let device = SyntheticDevice::standalone(vec![Some(20)]);
        let mut tracker = HandTracker::new(device, Some(Box::new(detector)), RecordingSink::new(0), config(30));

        let image = RgbImage::from_fn(4, 1, |x, _| if x == 3 { Rgb([9, 9, 9]) } else { Rgb([0, 0, 0]) });
        let (mirrored, overlay) = tracker.process_frame(CameraFrame::new(image, 0));

        assert_eq!(seen.borrow()[0], [9, 9, 9]);
        assert_eq!(mirrored.get_pixel(0, 0).0, [9, 9, 9]);
        assert_eq!(overlay.pinched(), None);
    }
}
