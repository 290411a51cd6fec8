// src/pipeline/fusion.rs
//
// Live per-frame fusion of ML and rule signals, weighted by motion.
//
//   alpha = clamp(min(motion / MOTION_THRESHOLD, 1) * BASE_ALPHA + (1 - BASE_ALPHA), 0, 1)
//
// A still scene leans on the rule signal (alpha = 1 - BASE_ALPHA); once
// motion reaches the threshold the ML signal is fully trusted (alpha = 1).
//
// This weight is independent of the offline calibrator's tuned alpha and
// threshold; the live path never reads them.

use super::metrics::PipelineMetrics;
use super::motion::{GrayFrame, MotionEstimator};
use crate::error::InputError;
use crate::signal_store::SignalStore;
use crate::types::{BehaviorLabel, Frame, FrameResult, FusionConfig};
use crate::video_processor::FrameSource;
use tracing::{debug, info, warn};

pub fn dynamic_alpha(motion: f64, config: &FusionConfig) -> f64 {
    let ratio = if config.motion_threshold > 0.0 {
        (motion / config.motion_threshold).min(1.0)
    } else if motion > 0.0 {
        1.0
    } else {
        0.0
    };
    (ratio * config.base_alpha + (1.0 - config.base_alpha)).clamp(0.0, 1.0)
}

/// Per-request engine; owns the motion state for one video
pub struct OnlineFusionEngine<'a> {
    store: &'a SignalStore,
    config: FusionConfig,
    motion: MotionEstimator,
    frame_index: u64,
    metrics: PipelineMetrics,
}

impl<'a> OnlineFusionEngine<'a> {
    pub fn new(store: &'a SignalStore, config: FusionConfig) -> Self {
        Self {
            store,
            config,
            motion: MotionEstimator::new(),
            frame_index: 0,
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Fuse one frame; frames must arrive in decode order
    pub fn process_frame(&mut self, frame: &Frame) -> FrameResult {
        let index = self.frame_index;
        self.frame_index += 1;

        let motion_score = self.motion.update(GrayFrame::from_frame(frame));
        let alpha = dynamic_alpha(motion_score, &self.config);

        let signals = self.store.lookup(index as usize);
        if signals.fallback && index as usize == self.store.len() {
            warn!(
                "Frame {} past the {}-row signal table, using population means",
                index,
                self.store.len()
            );
        }

        let hybrid_aggressive =
            alpha * signals.ml.aggressive + (1.0 - alpha) * signals.rule.aggressive;
        let hybrid_normal = alpha * signals.ml.normal + (1.0 - alpha) * signals.rule.normal;
        let label = if hybrid_aggressive >= hybrid_normal {
            BehaviorLabel::Aggressive
        } else {
            BehaviorLabel::Normal
        };

        debug!(
            "Frame {}: motion={:.4} alpha={:.3} aggr={:.3} norm={:.3} → {}",
            index,
            motion_score,
            alpha,
            hybrid_aggressive,
            hybrid_normal,
            label.as_str()
        );
        self.metrics.record(
            motion_score,
            signals.fallback,
            label == BehaviorLabel::Aggressive,
        );

        FrameResult {
            frame: index,
            hybrid_aggressive,
            hybrid_normal,
            motion_score,
            dynamic_alpha: alpha,
            label,
        }
    }

    /// Drain `source` to the end. Zero frames is an input error.
    pub fn run(&mut self, source: &mut dyn FrameSource) -> Result<Vec<FrameResult>, InputError> {
        let mut results = Vec::new();

        while let Some(frame) = source.next_frame()? {
            results.push(self.process_frame(&frame));
        }

        if results.is_empty() {
            return Err(InputError::NoFrames);
        }

        let summary = self.metrics.summary();
        info!(
            "✓ Fused {} frames ({} from population means), {} aggressive, mean motion {:.4}",
            summary.total_frames,
            summary.fallback_frames,
            summary.aggressive_frames,
            summary.mean_motion
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal_store::SignalRow;
    use crate::types::{ClassifierProbability, RuleLabel};
    use proptest::prelude::*;
    use std::collections::VecDeque;

    struct VecSource(VecDeque<Frame>);

    impl FrameSource for VecSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, InputError> {
            Ok(self.0.pop_front())
        }
    }

    fn frame(value: u8) -> Frame {
        Frame {
            data: vec![value; 4 * 4 * 3],
            width: 4,
            height: 4,
            timestamp_ms: 0.0,
        }
    }

    fn store() -> SignalStore {
        SignalStore::new(vec![
            SignalRow::from_verdict(
                ClassifierProbability::from_aggressive(0.8),
                RuleLabel::Normal,
                None,
            ),
            SignalRow::from_verdict(
                ClassifierProbability::from_aggressive(0.3),
                RuleLabel::Uncertain,
                None,
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_alpha_at_rest_and_saturation() {
        let cfg = FusionConfig::default();
        assert_eq!(dynamic_alpha(0.0, &cfg), 0.5);
        assert!((dynamic_alpha(0.025, &cfg) - 0.75).abs() < 1e-12);
        assert_eq!(dynamic_alpha(0.05, &cfg), 1.0);
        assert_eq!(dynamic_alpha(0.9, &cfg), 1.0);
    }

    #[test]
    fn test_alpha_with_zero_threshold() {
        let cfg = FusionConfig {
            motion_threshold: 0.0,
            ..FusionConfig::default()
        };
        assert_eq!(dynamic_alpha(0.0, &cfg), 0.5);
        assert_eq!(dynamic_alpha(0.01, &cfg), 1.0);
    }

    #[test]
    fn test_identical_frames_keep_base_alpha() {
        let store = store();
        let mut engine = OnlineFusionEngine::new(&store, FusionConfig::default());
        let mut source = VecSource(vec![frame(120), frame(120), frame(120)].into());

        let results = engine.run(&mut source).unwrap();
        assert_eq!(results.len(), 3);
        for r in &results {
            assert_eq!(r.motion_score, 0.0);
            assert_eq!(r.dynamic_alpha, 0.5);
        }

        // Frame 0: 0.5 * 0.8 + 0.5 * 0.0
        assert!((results[0].hybrid_aggressive - 0.4).abs() < 1e-12);
        assert!((results[0].hybrid_normal - 0.6).abs() < 1e-12);
        assert_eq!(results[0].label, BehaviorLabel::Normal);
        // Frame 1: uncertain rule collapses to ML
        assert!((results[1].hybrid_aggressive - 0.3).abs() < 1e-12);
        assert_eq!(results[1].frame, 1);
    }

    #[test]
    fn test_motion_trusts_ml() {
        let store = store();
        let mut engine = OnlineFusionEngine::new(&store, FusionConfig::default());

        engine.process_frame(&frame(0));
        let moving = engine.process_frame(&frame(255));
        assert_eq!(moving.motion_score, 1.0);
        assert_eq!(moving.dynamic_alpha, 1.0);
        assert_eq!(moving.hybrid_aggressive, 0.3);
    }

    #[test]
    fn test_frames_past_table_use_column_means() {
        let store = store();
        let mut engine = OnlineFusionEngine::new(&store, FusionConfig::default());
        let mut source = VecSource((0..5).map(|_| frame(50)).collect());

        let results = engine.run(&mut source).unwrap();
        let (ml_mean, rule_mean) = store.population_mean();

        // Direct column means: ml (0.8 + 0.3) / 2, rule (0.0 + 0.3) / 2
        assert!((ml_mean.aggressive - 0.55).abs() < 1e-12);
        assert!((rule_mean.aggressive - 0.15).abs() < 1e-12);

        for r in &results[2..] {
            let expected = 0.5 * 0.55 + 0.5 * 0.15;
            assert!((r.hybrid_aggressive - expected).abs() < 1e-12);
            assert!((r.hybrid_normal - (0.5 * 0.45 + 0.5 * 0.85)).abs() < 1e-12);
        }
        assert_eq!(engine.metrics().summary().fallback_frames, 3);
    }

    #[test]
    fn test_ties_favor_aggressive() {
        let store = SignalStore::new(vec![SignalRow::from_verdict(
            ClassifierProbability::from_aggressive(0.5),
            RuleLabel::Uncertain,
            None,
        )])
        .unwrap();
        let mut engine = OnlineFusionEngine::new(&store, FusionConfig::default());
        assert_eq!(engine.process_frame(&frame(1)).label, BehaviorLabel::Aggressive);
    }

    #[test]
    fn test_empty_video_is_input_error() {
        let store = store();
        let mut engine = OnlineFusionEngine::new(&store, FusionConfig::default());
        let err = engine.run(&mut VecSource(VecDeque::new())).unwrap_err();
        assert!(matches!(err, InputError::NoFrames));
    }

    proptest! {
        #[test]
        fn prop_alpha_in_unit_range(motion in 0.0f64..=1.0, base in 0.0f64..=1.0) {
            let cfg = FusionConfig { base_alpha: base, motion_threshold: 0.05 };
            let alpha = dynamic_alpha(motion, &cfg);
            prop_assert!((0.0..=1.0).contains(&alpha));
            prop_assert!(alpha >= 1.0 - base - 1e-12);
        }

        #[test]
        fn prop_alpha_rises_only_with_motion(
            motion in 0.001f64..0.05,
            base in 0.05f64..=1.0,
        ) {
            let cfg = FusionConfig { base_alpha: base, motion_threshold: 0.05 };
            prop_assert_eq!(dynamic_alpha(0.0, &cfg), 1.0 - base);
            prop_assert!(dynamic_alpha(motion, &cfg) > 1.0 - base);
        }
    }
}
