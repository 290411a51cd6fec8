// src/pipeline/motion.rs
//
// Whole-frame motion intensity from consecutive grayscale frames.
//
// motion(0) = 0
// motion(i) = mean |gray(i) - gray(i-1)| / 255
//
// Only the previous frame is retained; it is dropped with the estimator at
// the end of the request.

use crate::types::Frame;
use tracing::warn;

const MAX_INTENSITY: f64 = 255.0;

/// Row-major grayscale: pixel at (x, y) = data[y * width + x]
#[derive(Debug, Clone, PartialEq)]
pub struct GrayFrame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl GrayFrame {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
        }
    }

    /// Convert from RGB packed bytes (3 bytes per pixel)
    pub fn from_rgb(rgb: &[u8], width: usize, height: usize) -> Self {
        let gray = rgb
            .chunks_exact(3)
            .map(|p| {
                // ITU-R BT.601 luma
                (0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32).round() as u8
            })
            .collect();
        Self::new(gray, width, height)
    }

    pub fn from_frame(frame: &Frame) -> Self {
        Self::from_rgb(&frame.data, frame.width, frame.height)
    }

    pub fn same_shape(&self, other: &GrayFrame) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// Mean absolute pixel difference normalized to [0, 1].
/// None when the frames differ in size.
pub fn frame_difference(prev: &GrayFrame, cur: &GrayFrame) -> Option<f64> {
    if !prev.same_shape(cur) || cur.data.is_empty() {
        return None;
    }
    let sum: u64 = prev
        .data
        .iter()
        .zip(&cur.data)
        .map(|(a, b)| (*a as i32 - *b as i32).unsigned_abs() as u64)
        .sum();
    Some(sum as f64 / cur.data.len() as f64 / MAX_INTENSITY)
}

#[derive(Debug, Default)]
pub struct MotionEstimator {
    prev: Option<GrayFrame>,
}

impl MotionEstimator {
    pub fn new() -> Self {
        Self { prev: None }
    }

    /// Motion score of `frame` against the previous one, then remember it
    pub fn update(&mut self, frame: GrayFrame) -> f64 {
        let score = match &self.prev {
            None => 0.0,
            Some(prev) => frame_difference(prev, &frame).unwrap_or_else(|| {
                warn!(
                    "Frame size changed {}x{} → {}x{}, motion reset",
                    prev.width, prev.height, frame.width, frame.height
                );
                0.0
            }),
        };
        self.prev = Some(frame);
        score
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(value: u8, width: usize, height: usize) -> GrayFrame {
        GrayFrame::new(vec![value; width * height], width, height)
    }

    #[test]
    fn test_first_frame_has_no_motion() {
        let mut est = MotionEstimator::new();
        assert_eq!(est.update(flat(200, 4, 4)), 0.0);
    }

    #[test]
    fn test_identical_frames_have_no_motion() {
        let mut est = MotionEstimator::new();
        est.update(flat(90, 8, 6));
        assert_eq!(est.update(flat(90, 8, 6)), 0.0);
        assert_eq!(est.update(flat(90, 8, 6)), 0.0);
    }

    #[test]
    fn test_full_swing_is_one() {
        let mut est = MotionEstimator::new();
        est.update(flat(0, 3, 3));
        assert_eq!(est.update(flat(255, 3, 3)), 1.0);
        assert_eq!(est.update(flat(0, 3, 3)), 1.0);
    }

    #[test]
    fn test_partial_change() {
        let prev = GrayFrame::new(vec![10, 10, 10, 10], 2, 2);
        let cur = GrayFrame::new(vec![10, 61, 10, 10], 2, 2);
        let score = frame_difference(&prev, &cur).unwrap();
        assert!((score - 51.0 / 4.0 / 255.0).abs() < 1e-12);
    }

    #[test]
    fn test_size_change_resets_motion() {
        let mut est = MotionEstimator::new();
        est.update(flat(0, 4, 4));
        assert_eq!(est.update(flat(255, 2, 2)), 0.0);
        // The new size becomes the reference
        assert_eq!(est.update(flat(255, 2, 2)), 0.0);
    }

    #[test]
    fn test_rgb_conversion() {
        let gray = GrayFrame::from_rgb(&[255, 255, 255, 0, 0, 0, 255, 0, 0], 3, 1);
        assert_eq!(gray.data, vec![255, 0, 76]);
    }
}
