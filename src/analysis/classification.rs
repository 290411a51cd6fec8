// src/analysis/classification.rs
//
// Two-class agreement metrics against ground truth. Weighted F1 averages the
// per-class F1 scores by true support, matching the usual "weighted" average.

use crate::types::BehaviorLabel;
use serde::Serialize;

const CLASSES: [BehaviorLabel; 2] = [BehaviorLabel::Normal, BehaviorLabel::Aggressive];

fn index(label: BehaviorLabel) -> usize {
    match label {
        BehaviorLabel::Normal => 0,
        BehaviorLabel::Aggressive => 1,
    }
}

/// Rows = truth, columns = prediction, order (Normal, Aggressive)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn from_labels(truth: &[BehaviorLabel], predicted: &[BehaviorLabel]) -> Self {
        let mut counts = [[0usize; 2]; 2];
        for (t, p) in truth.iter().zip(predicted) {
            counts[index(*t)][index(*p)] += 1;
        }
        Self { counts }
    }

    pub fn get(&self, truth: BehaviorLabel, predicted: BehaviorLabel) -> usize {
        self.counts[index(truth)][index(predicted)]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn support(&self, class: BehaviorLabel) -> usize {
        self.counts[index(class)].iter().sum()
    }

    pub fn class_metrics(&self, class: BehaviorLabel) -> ClassMetrics {
        let i = index(class);
        let tp = self.counts[i][i];
        let fn_ = self.counts[i][1 - i];
        let fp = self.counts[1 - i][i];

        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };

        ClassMetrics {
            precision: ratio(tp, tp + fp),
            recall: ratio(tp, tp + fn_),
            f1: ratio(2 * tp, 2 * tp + fp + fn_),
            support: tp + fn_,
        }
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.counts[0][0] + self.counts[1][1]) as f64 / total as f64
    }

    /// Support-weighted mean of per-class F1
    pub fn weighted_f1(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        CLASSES
            .iter()
            .map(|c| {
                let m = self.class_metrics(*c);
                m.f1 * m.support as f64
            })
            .sum::<f64>()
            / total as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

pub fn weighted_f1(truth: &[BehaviorLabel], predicted: &[BehaviorLabel]) -> f64 {
    ConfusionMatrix::from_labels(truth, predicted).weighted_f1()
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    pub confusion: ConfusionMatrix,
    pub normal: ClassMetrics,
    pub aggressive: ClassMetrics,
    pub accuracy: f64,
    pub weighted_f1: f64,
}

impl ClassificationReport {
    pub fn new(truth: &[BehaviorLabel], predicted: &[BehaviorLabel]) -> Self {
        let confusion = ConfusionMatrix::from_labels(truth, predicted);
        Self {
            normal: confusion.class_metrics(BehaviorLabel::Normal),
            aggressive: confusion.class_metrics(BehaviorLabel::Aggressive),
            accuracy: confusion.accuracy(),
            weighted_f1: confusion.weighted_f1(),
            confusion,
        }
    }
}

/// Label distribution of a prediction set
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LabelSummary {
    pub total: usize,
    pub aggressive: usize,
    pub normal: usize,
}

impl LabelSummary {
    pub fn from_labels(labels: impl IntoIterator<Item = BehaviorLabel>) -> Self {
        let mut summary = Self {
            total: 0,
            aggressive: 0,
            normal: 0,
        };
        for label in labels {
            summary.total += 1;
            match label {
                BehaviorLabel::Aggressive => summary.aggressive += 1,
                BehaviorLabel::Normal => summary.normal += 1,
            }
        }
        summary
    }

    pub fn aggressive_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.aggressive as f64 / self.total as f64
        }
    }

    pub fn normal_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.normal as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BehaviorLabel::{Aggressive as A, Normal as N};

    #[test]
    fn test_perfect_prediction() {
        let truth = [A, N, A, N];
        assert_eq!(weighted_f1(&truth, &truth), 1.0);
    }

    #[test]
    fn test_weighted_f1_known_values() {
        // Aggressive: tp=2 fp=1 fn=1 → f1 = 4/6
        // Normal:     tp=1 fp=1 fn=1 → f1 = 2/4
        // supports 3 and 2
        let truth = [A, A, A, N, N];
        let pred = [A, A, N, A, N];
        let expected = (3.0 * (4.0 / 6.0) + 2.0 * 0.5) / 5.0;
        assert!((weighted_f1(&truth, &pred) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_class_absent_from_truth_has_no_weight() {
        // Only Normal in truth; Aggressive F1 is 0 but weighs nothing
        let truth = [N, N, N, N];
        let pred = [N, N, N, A];
        let normal_f1 = 2.0 * 3.0 / (2.0 * 3.0 + 0.0 + 1.0);
        assert!((weighted_f1(&truth, &pred) - normal_f1).abs() < 1e-12);
    }

    #[test]
    fn test_report_and_confusion_layout() {
        let truth = [A, A, N];
        let pred = [A, N, N];
        let report = ClassificationReport::new(&truth, &pred);

        assert_eq!(report.confusion.get(A, N), 1);
        assert_eq!(report.confusion.get(N, N), 1);
        assert_eq!(report.confusion.counts, [[1, 0], [1, 1]]);
        assert_eq!(report.aggressive.support, 2);
        assert_eq!(report.aggressive.precision, 1.0);
        assert_eq!(report.aggressive.recall, 0.5);
        assert!((report.accuracy - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(weighted_f1(&[], &[]), 0.0);
        let summary = LabelSummary::from_labels(Vec::new());
        assert_eq!(summary.aggressive_pct(), 0.0);
    }
}
