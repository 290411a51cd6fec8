// src/analysis/calibrator.rs
//
// Offline search for the ML/rule blending weight and decision threshold.
//
// For every (alpha, threshold) on the grid:
//
//   hybrid = alpha * ml + (1 - alpha) * rule    (rows with a confident rule)
//   hybrid = ml                                 (rows where the rule was Uncertain)
//   label  = Aggressive if hybrid >= threshold else Normal
//
// and the pair with the highest weighted F1 against ground truth wins.
// Grid order is alpha-major, ascending; only a strictly better F1 replaces the
// incumbent, so ties resolve to the lowest alpha, then the lowest threshold.
// Without ground truth the search is skipped and the configured defaults apply.

use super::classification::{self, ClassificationReport, LabelSummary};
use crate::signal_store::{SignalRow, SignalStore};
use crate::types::{BehaviorLabel, CalibrationConfig, HybridParameters};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Hybrid output for one reference row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HybridRow {
    pub aggressive: f64,
    pub normal: f64,
    pub label: BehaviorLabel,
}

impl HybridRow {
    pub fn new(aggressive: f64, label: BehaviorLabel) -> Self {
        Self {
            aggressive,
            normal: 1.0 - aggressive,
            label,
        }
    }
}

/// One evaluated grid point
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridPoint {
    pub alpha: f64,
    pub threshold: f64,
    pub f1: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationOutcome {
    pub parameters: HybridParameters,
    /// None when calibration was skipped
    pub best_f1: Option<f64>,
    pub calibrated: bool,
    pub hybrid: Vec<HybridRow>,
}

impl CalibrationOutcome {
    pub fn labels(&self) -> Vec<BehaviorLabel> {
        self.hybrid.iter().map(|h| h.label).collect()
    }
}

/// Blended aggressive probability; masked rows pass ML through untouched
pub fn hybrid_aggressive(row: &SignalRow, alpha: f64) -> f64 {
    match row.rule {
        Some(rule) => alpha * row.ml.aggressive + (1.0 - alpha) * rule.aggressive,
        None => row.ml.aggressive,
    }
}

pub fn label_for(hybrid: f64, threshold: f64) -> BehaviorLabel {
    if hybrid >= threshold {
        BehaviorLabel::Aggressive
    } else {
        BehaviorLabel::Normal
    }
}

/// `steps` evenly spaced points over [start, stop], endpoint exact
pub fn linspace(start: f64, stop: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (steps - 1) as f64;
            let mut points: Vec<f64> = (0..steps).map(|i| start + i as f64 * step).collect();
            points[steps - 1] = stop;
            points
        }
    }
}

pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    pub fn default_parameters(&self) -> HybridParameters {
        HybridParameters {
            alpha: self.config.default_alpha,
            threshold: self.config.default_threshold,
        }
    }

    pub fn alphas(&self) -> Vec<f64> {
        linspace(
            self.config.alpha_min,
            self.config.alpha_max,
            self.config.alpha_steps,
        )
    }

    pub fn thresholds(&self) -> Vec<f64> {
        linspace(
            self.config.threshold_min,
            self.config.threshold_max,
            self.config.threshold_steps,
        )
    }

    pub fn apply(rows: &[SignalRow], params: HybridParameters) -> Vec<HybridRow> {
        rows.iter()
            .map(|row| {
                let h = hybrid_aggressive(row, params.alpha);
                HybridRow::new(h, label_for(h, params.threshold))
            })
            .collect()
    }

    /// Exhaustive grid search. Returns the winner, its F1 and every grid point.
    ///
    /// The incumbent starts as the defaults at F1 = 0, so a grid on which
    /// nothing scores above zero keeps the defaults.
    pub fn search(
        &self,
        rows: &[SignalRow],
        truth: &[BehaviorLabel],
    ) -> (HybridParameters, f64, Vec<GridPoint>) {
        let mut best = self.default_parameters();
        let mut best_f1 = 0.0;
        let mut grid = Vec::new();

        let thresholds = self.thresholds();
        for alpha in self.alphas() {
            let blended: Vec<f64> = rows.iter().map(|r| hybrid_aggressive(r, alpha)).collect();

            for &threshold in &thresholds {
                let labels: Vec<BehaviorLabel> =
                    blended.iter().map(|h| label_for(*h, threshold)).collect();
                let f1 = classification::weighted_f1(truth, &labels);
                debug!("alpha={:.2} threshold={:.2} → F1={:.4}", alpha, threshold, f1);

                grid.push(GridPoint {
                    alpha,
                    threshold,
                    f1,
                });
                if f1 > best_f1 {
                    best_f1 = f1;
                    best = HybridParameters { alpha, threshold };
                }
            }
        }

        (best, best_f1, grid)
    }

    pub fn calibrate(&self, store: &SignalStore) -> CalibrationOutcome {
        let rows = store.rows();

        let Some(truth) = store.ground_truth() else {
            let parameters = self.default_parameters();
            warn!(
                "No ground truth for every row; skipping calibration, using alpha={} threshold={}",
                parameters.alpha, parameters.threshold
            );
            let outcome = CalibrationOutcome {
                parameters,
                best_f1: None,
                calibrated: false,
                hybrid: Self::apply(rows, parameters),
            };
            log_summary(&LabelSummary::from_labels(outcome.labels()));
            return outcome;
        };

        let masked = rows.iter().filter(|r| !r.rule_mask()).count();
        info!(
            "Calibrating over {} rows ({} with uncertain rule verdicts)",
            rows.len(),
            masked
        );

        let (parameters, best_f1, grid) = self.search(rows, &truth);
        info!(
            "✅ Best alpha: {:.2}, threshold: {:.2}, weighted F1: {:.3} ({} combinations)",
            parameters.alpha,
            parameters.threshold,
            best_f1,
            grid.len()
        );

        let hybrid = Self::apply(rows, parameters);
        let outcome = CalibrationOutcome {
            parameters,
            best_f1: Some(best_f1),
            calibrated: true,
            hybrid,
        };
        log_summary(&LabelSummary::from_labels(outcome.labels()));
        log_report(&ClassificationReport::new(&truth, &outcome.labels()));
        outcome
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}

fn log_summary(summary: &LabelSummary) {
    info!(
        "Total: {} | Agg: {} ({:.2}%) | Normal: {} ({:.2}%)",
        summary.total,
        summary.aggressive,
        summary.aggressive_pct(),
        summary.normal,
        summary.normal_pct()
    );
}

fn log_report(report: &ClassificationReport) {
    let cm = &report.confusion.counts;
    info!("📊 Confusion matrix (rows=truth, cols=pred; Normal, Aggressive)");
    info!("   [{:>5} {:>5}]", cm[0][0], cm[0][1]);
    info!("   [{:>5} {:>5}]", cm[1][0], cm[1][1]);
    for (name, m) in [("Normal", report.normal), ("Aggressive", report.aggressive)] {
        info!(
            "   {:<10} precision={:.2} recall={:.2} f1={:.2} support={}",
            name, m.precision, m.recall, m.f1, m.support
        );
    }
    info!(
        "   accuracy={:.3} weighted F1={:.3}",
        report.accuracy, report.weighted_f1
    );
}
