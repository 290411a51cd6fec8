// src/pipeline/metrics.rs
//
// Per-request counters for the live fusion path, summarized in logs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

// Motion is accumulated in millionths to stay in an integer counter
const MOTION_SCALE: f64 = 1_000_000.0;

#[derive(Debug)]
pub struct PipelineMetrics {
    pub total_frames: AtomicU64,
    pub fallback_frames: AtomicU64,
    pub aggressive_frames: AtomicU64,
    motion_micros: AtomicU64,
    pub started_at: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: AtomicU64::new(0),
            fallback_frames: AtomicU64::new(0),
            aggressive_frames: AtomicU64::new(0),
            motion_micros: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn record(&self, motion: f64, fallback: bool, aggressive: bool) {
        self.total_frames.fetch_add(1, Ordering::Relaxed);
        if fallback {
            self.fallback_frames.fetch_add(1, Ordering::Relaxed);
        }
        if aggressive {
            self.aggressive_frames.fetch_add(1, Ordering::Relaxed);
        }
        self.motion_micros
            .fetch_add((motion * MOTION_SCALE).round() as u64, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let total_frames = self.total_frames.load(Ordering::Relaxed);
        let motion = self.motion_micros.load(Ordering::Relaxed) as f64 / MOTION_SCALE;
        MetricsSummary {
            total_frames,
            fallback_frames: self.fallback_frames.load(Ordering::Relaxed),
            aggressive_frames: self.aggressive_frames.load(Ordering::Relaxed),
            mean_motion: if total_frames > 0 {
                motion / total_frames as f64
            } else {
                0.0
            },
            fps: self.fps(),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub fallback_frames: u64,
    pub aggressive_frames: u64,
    pub mean_motion: f64,
    pub fps: f64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let metrics = PipelineMetrics::new();
        metrics.record(0.0, false, true);
        metrics.record(0.5, true, false);
        metrics.record(0.25, true, true);

        let summary = metrics.summary();
        assert_eq!(summary.total_frames, 3);
        assert_eq!(summary.fallback_frames, 2);
        assert_eq!(summary.aggressive_frames, 2);
        assert!((summary.mean_motion - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_empty_summary() {
        let summary = PipelineMetrics::default().summary();
        assert_eq!(summary.total_frames, 0);
        assert_eq!(summary.mean_motion, 0.0);
    }
}
