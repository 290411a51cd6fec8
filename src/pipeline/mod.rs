// src/pipeline/mod.rs
//
// Live video path:
//   FrameSource → motion → fusion (SignalStore lookup per frame) → FrameResult
//
// Wrapped for one upload at a time by service::PredictionService.

pub mod fusion;
pub mod metrics;
pub mod motion;
pub mod service;

pub use fusion::{dynamic_alpha, OnlineFusionEngine};
pub use metrics::{MetricsSummary, PipelineMetrics};
pub use motion::{GrayFrame, MotionEstimator};
pub use service::{ErrorResponse, PredictionResponse, PredictionService};
