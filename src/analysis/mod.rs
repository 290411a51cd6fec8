// src/analysis/mod.rs
//
// Offline analysis over the labeled reference set.
//
//   ReferenceSample → rule_scorer (CalibrationBundle) → RuleVerdict ─┐
//   PoseClassifier / precomputed probabilities ──────────────────────┼→ SignalStore
//                                                                     └→ calibrator → HybridParameters
//
// classification holds the metrics shared by the rule report and the calibrator.

pub mod calibrator;
pub mod classification;
pub mod rule_scorer;

pub use calibrator::{CalibrationOutcome, Calibrator, GridPoint, HybridRow};
pub use classification::{ClassificationReport, ConfusionMatrix, LabelSummary};
pub use rule_scorer::{CalibrationBundle, FeatureCalibration, RuleReport};
