// src/analysis/rule_scorer.rs
//
// Heuristic posture scorer.
//
// Each feature is z-scored against the reference population, then compared to
// the midpoint between the two class means. Outside a one-sigma dead zone the
// feature votes with its data-derived weight; inside it, it stays silent.
// A few fixed compound posture rules are layered on top of the weighted sum.
//
//   score > +band → Aggressive
//   score < -band → Normal
//   otherwise     → Uncertain
//
// The bundle is fitted once and never mutated, so it can be shared freely.

use crate::dataset::ReferenceSample;
use crate::error::CalibrationError;
use crate::features::{
    FeatureVector, BACK_LEG_STANCE, BODY_RATIO, FRONT_LEG_STANCE, HEAD_ANGLE, TAIL_ANGLE,
    TAIL_RATIO,
};
use crate::types::{BehaviorLabel, RuleConfig, RuleLabel, RuleVerdict};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

// Compound posture rules operate on z-scores
const RAISED_POSTURE_THRESHOLD: f64 = 0.5;
const WIDE_STANCE_THRESHOLD: f64 = 0.5;
const RELAXED_BODY_THRESHOLD: f64 = -0.3;

// ============================================================================
// CALIBRATION ARTIFACTS
// ============================================================================

/// Population mean / standard deviation of one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizationStats {
    pub mean: f64,
    pub std: f64,
}

impl NormalizationStats {
    /// Z-score clipped to [-clip, clip]. `epsilon` keeps the divisor positive.
    pub fn normalize(&self, value: f64, epsilon: f64, clip: f64) -> f64 {
        ((value - self.mean) / (self.std + epsilon)).clamp(-clip, clip)
    }
}

/// Per-class mean of one (normalized) feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMeans {
    pub aggressive: f64,
    pub normal: f64,
}

impl ClassMeans {
    pub fn mid(&self) -> f64 {
        0.5 * (self.aggressive + self.normal)
    }

    pub fn separation(&self) -> f64 {
        (self.aggressive - self.normal).abs()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureCalibration {
    pub name: String,
    pub stats: NormalizationStats,
    pub class_means: ClassMeans,
    /// Share of total class separation; all weights sum to 1
    pub weight: f64,
    /// Dead-zone half width around the class midpoint
    pub margin: f64,
}

impl FeatureCalibration {
    /// Weight is assigned when the bundle is assembled
    pub fn new(
        name: impl Into<String>,
        stats: NormalizationStats,
        class_means: ClassMeans,
        margin: f64,
    ) -> Self {
        Self {
            name: name.into(),
            stats,
            class_means,
            weight: 0.0,
            margin,
        }
    }

    /// Signed vote of a normalized value. Strictly inside the band → 0.
    pub fn contribution(&self, z: f64) -> f64 {
        let mid = self.class_means.mid();
        if z > mid + self.margin {
            self.weight
        } else if z < mid - self.margin {
            -self.weight
        } else {
            0.0
        }
    }
}

/// Immutable scorer parameters fitted from a labeled reference dataset
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationBundle {
    features: Vec<FeatureCalibration>,
    /// Stats for every feature seen in the reference set, including those
    /// with no weighted vote; the compound rules read from these
    population: Vec<(String, NormalizationStats)>,
    decision_band: f64,
    clip: f64,
    std_epsilon: f64,
    heuristic_bonus: f64,
}

impl CalibrationBundle {
    /// Fit normalization stats, class means, weights and margins.
    ///
    /// A configured feature takes part only if at least one sample carries
    /// it; statistics for a feature use only the samples that carry it.
    pub fn fit(
        samples: &[ReferenceSample],
        config: &RuleConfig,
    ) -> Result<Self, CalibrationError> {
        if samples.is_empty() {
            return Err(CalibrationError::EmptyReferenceSet);
        }
        for class in [BehaviorLabel::Aggressive, BehaviorLabel::Normal] {
            if !samples.iter().any(|s| s.label == Some(class)) {
                return Err(CalibrationError::MissingClass(class));
            }
        }

        let mut fitted = Vec::new();
        let mut population = Vec::new();

        for name in &config.features {
            let raw: Vec<f64> = samples
                .iter()
                .filter_map(|s| s.features.get(name))
                .collect();
            if raw.is_empty() {
                debug!("Rule feature {} not in reference dataset, skipping", name);
                continue;
            }

            let (mean, std) = mean_std(&raw);
            let stats = NormalizationStats { mean, std };
            population.push((name.clone(), stats));

            let mut normalized = Vec::with_capacity(raw.len());
            let mut aggressive = Vec::new();
            let mut normal = Vec::new();
            for sample in samples {
                let Some(value) = sample.features.get(name) else {
                    continue;
                };
                let z = stats.normalize(value, config.std_epsilon, config.clip);
                normalized.push(z);
                match sample.label {
                    Some(BehaviorLabel::Aggressive) => aggressive.push(z),
                    Some(BehaviorLabel::Normal) => normal.push(z),
                    None => {}
                }
            }

            if aggressive.is_empty() || normal.is_empty() {
                warn!(
                    "Rule feature {} lacks samples for one class, no weighted vote",
                    name
                );
                continue;
            }

            let class_means = ClassMeans {
                aggressive: mean_std(&aggressive).0,
                normal: mean_std(&normal).0,
            };
            let spread = mean_std(&normalized).1;
            let margin = if spread.is_finite() && spread > 0.0 {
                spread
            } else {
                config.default_margin
            };

            fitted.push(FeatureCalibration::new(
                name.clone(),
                stats,
                class_means,
                margin,
            ));
        }

        if fitted.is_empty() {
            return Err(CalibrationError::NoFeatures);
        }

        let mut bundle = Self::from_features(fitted, config);
        bundle.population = population;

        info!(
            "✓ Rule bundle fitted on {} samples, {} features",
            samples.len(),
            bundle.features.len()
        );
        for f in &bundle.features {
            info!(
                "  {}: weight={:.3} margin={:.3} mid={:+.3}",
                f.name,
                f.weight,
                f.margin,
                f.class_means.mid()
            );
        }

        Ok(bundle)
    }

    /// Assemble a bundle from precomputed per-feature calibration,
    /// deriving weights from class separation.
    pub fn from_features(mut features: Vec<FeatureCalibration>, config: &RuleConfig) -> Self {
        let total: f64 = features.iter().map(|f| f.class_means.separation()).sum();
        let count = features.len().max(1) as f64;

        for f in &mut features {
            f.weight = if total > 0.0 {
                f.class_means.separation() / total
            } else {
                // No separation anywhere: spread weight evenly
                1.0 / count
            };
        }

        let population = features
            .iter()
            .map(|f| (f.name.clone(), f.stats))
            .collect();

        Self {
            features,
            population,
            decision_band: config.decision_band,
            clip: config.clip,
            std_epsilon: config.std_epsilon,
            heuristic_bonus: config.heuristic_bonus,
        }
    }

    pub fn features(&self) -> &[FeatureCalibration] {
        &self.features
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureCalibration> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn weight_sum(&self) -> f64 {
        self.features.iter().map(|f| f.weight).sum()
    }

    /// Z-scores for every feature with population stats; absent features
    /// are backfilled with 0.0
    pub fn normalize(&self, vector: &FeatureVector) -> HashMap<&str, f64> {
        self.population
            .iter()
            .map(|(name, stats)| {
                let z = vector
                    .get(name)
                    .map(|v| stats.normalize(v, self.std_epsilon, self.clip))
                    .unwrap_or(0.0);
                (name.as_str(), z)
            })
            .collect()
    }
}

// ============================================================================
// SCORING
// ============================================================================

/// Score one feature vector against the bundle
pub fn score(bundle: &CalibrationBundle, vector: &FeatureVector) -> RuleVerdict {
    let z = bundle.normalize(vector);

    let mut total: f64 = bundle
        .features
        .iter()
        .map(|f| f.contribution(z.get(f.name.as_str()).copied().unwrap_or(0.0)))
        .sum();

    total += compound_adjustment(&z, bundle.heuristic_bonus);

    RuleVerdict {
        label: decide(total, bundle.decision_band),
        score: total,
    }
}

/// Fixed posture rules. Features never seen in the reference set read as 0.
fn compound_adjustment(z: &HashMap<&str, f64>, bonus: f64) -> f64 {
    let get = |name: &str| z.get(name).copied().unwrap_or(0.0);
    let mut adjustment = 0.0;

    if get(TAIL_ANGLE) + get(HEAD_ANGLE) > RAISED_POSTURE_THRESHOLD {
        adjustment += bonus;
    }
    if get(FRONT_LEG_STANCE) + get(BACK_LEG_STANCE) > WIDE_STANCE_THRESHOLD {
        adjustment += bonus;
    }
    if get(TAIL_RATIO) < RELAXED_BODY_THRESHOLD && get(BODY_RATIO) < RELAXED_BODY_THRESHOLD {
        adjustment -= bonus;
    }

    adjustment
}

pub fn decide(score: f64, band: f64) -> RuleLabel {
    if score > band {
        RuleLabel::Aggressive
    } else if score < -band {
        RuleLabel::Normal
    } else {
        RuleLabel::Uncertain
    }
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Confident accuracy and coverage of the rule scorer on labeled data
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RuleReport {
    pub total: usize,
    pub confident: usize,
    pub correct: usize,
    /// Accuracy over non-Uncertain, labeled verdicts [0, 1]
    pub accuracy: f64,
    /// Share of verdicts that are not Uncertain [0, 1]
    pub coverage: f64,
}

pub fn evaluate(samples: &[ReferenceSample], verdicts: &[RuleVerdict]) -> RuleReport {
    let mut confident = 0;
    let mut judged = 0;
    let mut correct = 0;

    for (sample, verdict) in samples.iter().zip(verdicts) {
        let Some(predicted) = verdict.label.as_behavior() else {
            continue;
        };
        confident += 1;
        if let Some(truth) = sample.label {
            judged += 1;
            if truth == predicted {
                correct += 1;
            }
        }
    }

    let total = verdicts.len();
    RuleReport {
        total,
        confident,
        correct,
        accuracy: if judged > 0 {
            correct as f64 / judged as f64
        } else {
            0.0
        },
        coverage: if total > 0 {
            confident as f64 / total as f64
        } else {
            0.0
        },
    }
}

/// Mean and sample (n-1) standard deviation; std is 0 below two values
fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, var.sqrt())
}
