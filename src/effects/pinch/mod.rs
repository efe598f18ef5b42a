//! Pinch overlay effect
//!
//! Measures the thumb-tip to index-tip distance of each detected hand in
//! frame pixels and draws the hand skeleton, the two fingertips and the line
//! between them. A hand counts as pinched when that distance drops below
//! the threshold.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::config::DisplayConfig;
use crate::ml::{landmarks, Hand, HandLandmark, HAND_CONNECTIONS};

const FINGERTIP_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const PINCH_LINE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const SKELETON_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LANDMARK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const FINGERTIP_RADIUS: i32 = 15;
const PINCH_RADIUS: i32 = 20;
const LANDMARK_RADIUS: i32 = 3;

/// Thumb/index measurement for one hand
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PinchMeasurement {
    /// Thumb tip in pixels
    pub thumb: (i32, i32),
    /// Index finger tip in pixels
    pub index: (i32, i32),
    /// Euclidean distance in pixels
    pub distance: f32,
    pub pinched: bool,
}

impl PinchMeasurement {
    /// Measure a hand in a frame of the given size.
    pub fn measure(hand: &Hand, width: u32, height: u32, threshold: f32) -> Self {
        let thumb = to_pixels(&hand.landmarks[landmarks::THUMB_TIP], width, height);
        let index = to_pixels(&hand.landmarks[landmarks::INDEX_FINGER_TIP], width, height);

        let dx = (thumb.0 - index.0) as f32;
        let dy = (thumb.1 - index.1) as f32;
        let distance = (dx * dx + dy * dy).sqrt();

        Self {
            thumb,
            index,
            distance,
            pinched: distance < threshold,
        }
    }

    pub fn midpoint(&self) -> (i32, i32) {
        (
            (self.thumb.0 + self.index.0).div_euclid(2),
            (self.thumb.1 + self.index.1).div_euclid(2),
        )
    }
}

/// Measurements for every hand in a frame
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PinchOverlay {
    pub measurements: Vec<PinchMeasurement>,
}

impl PinchOverlay {
    /// Whether any hand is pinched; `None` when no hand was detected.
    pub fn pinched(&self) -> Option<bool> {
        if self.measurements.is_empty() {
            None
        } else {
            Some(self.measurements.iter().any(|m| m.pinched))
        }
    }

    /// The measurement shown in the status line (last hand drawn wins).
    pub fn primary(&self) -> Option<&PinchMeasurement> {
        self.measurements.last()
    }
}

/// Pinch overlay effect runtime
pub struct PinchEffect {
    threshold: f32,
    draw_skeleton: bool,
}

impl PinchEffect {
    pub fn new(threshold: f32, draw_skeleton: bool) -> Self {
        Self {
            threshold,
            draw_skeleton,
        }
    }

    pub fn from_config(config: &DisplayConfig) -> Self {
        Self::new(config.pinch_threshold_px, config.draw_skeleton)
    }

    /// Draw the overlay for `hands` onto `frame` and return the measurements.
    pub fn apply(&self, frame: &mut RgbImage, hands: &[Hand]) -> PinchOverlay {
        let (width, height) = frame.dimensions();
        let mut overlay = PinchOverlay::default();

        for hand in hands {
            if self.draw_skeleton {
                draw_skeleton(frame, hand);
            }

            let m = PinchMeasurement::measure(hand, width, height, self.threshold);

            draw_filled_circle_mut(frame, m.thumb, FINGERTIP_RADIUS, FINGERTIP_COLOR);
            draw_filled_circle_mut(frame, m.index, FINGERTIP_RADIUS, FINGERTIP_COLOR);
            draw_thick_line(frame, m.thumb, m.index, PINCH_LINE_COLOR);

            if m.pinched {
                draw_filled_circle_mut(frame, m.midpoint(), PINCH_RADIUS, FINGERTIP_COLOR);
            }

            overlay.measurements.push(m);
        }

        overlay
    }
}

fn to_pixels(landmark: &HandLandmark, width: u32, height: u32) -> (i32, i32) {
    (
        (landmark.x * width as f32) as i32,
        (landmark.y * height as f32) as i32,
    )
}

fn draw_skeleton(frame: &mut RgbImage, hand: &Hand) {
    let (width, height) = frame.dimensions();
    let points: Vec<(i32, i32)> = hand
        .landmarks
        .iter()
        .map(|l| to_pixels(l, width, height))
        .collect();

    for (a, b) in HAND_CONNECTIONS {
        draw_line_segment_mut(
            frame,
            (points[a].0 as f32, points[a].1 as f32),
            (points[b].0 as f32, points[b].1 as f32),
            SKELETON_COLOR,
        );
    }
    for &point in &points {
        draw_filled_circle_mut(frame, point, LANDMARK_RADIUS, LANDMARK_COLOR);
    }
}

/// 3 px wide line
fn draw_thick_line(frame: &mut RgbImage, from: (i32, i32), to: (i32, i32), color: Rgb<u8>) {
    for offset in -1..=1 {
        let d = offset as f32;
        draw_line_segment_mut(
            frame,
            (from.0 as f32 + d, from.1 as f32),
            (to.0 as f32 + d, to.1 as f32),
            color,
        );
        draw_line_segment_mut(
            frame,
            (from.0 as f32, from.1 as f32 + d),
            (to.0 as f32, to.1 as f32 + d),
            color,
        );
    }
}
