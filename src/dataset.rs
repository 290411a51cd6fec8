// src/dataset.rs
//
// JSON-backed tabular data: the labeled reference set, and the
// calibration artifact written for reporting.

use crate::analysis::calibrator::CalibrationOutcome;
use crate::features::FeatureVector;
use crate::signal_store::SignalRow;
use crate::types::{BehaviorLabel, ClassifierProbability, HybridParameters, RuleLabel};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// One row of the reference dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSample {
    pub features: FeatureVector,
    #[serde(default)]
    pub label: Option<BehaviorLabel>,
    /// Precomputed pose-classifier output, if the row carries one
    #[serde(default)]
    pub classifier: Option<ClassifierProbability>,
}

pub fn load_reference<P: AsRef<Path>>(path: P) -> Result<Vec<ReferenceSample>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference dataset {}", path.display()))?;
    let samples: Vec<ReferenceSample> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse reference dataset {}", path.display()))?;

    let labeled = samples.iter().filter(|s| s.label.is_some()).count();
    info!(
        "Loaded {} reference samples ({} labeled) from {}",
        samples.len(),
        labeled,
        path.display()
    );
    Ok(samples)
}

/// Persisted calibration result, one entry per reference row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationArtifact {
    pub generated_at: DateTime<Utc>,
    pub calibrated: bool,
    pub parameters: HybridParameters,
    pub best_f1: Option<f64>,
    pub rows: Vec<ArtifactRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRow {
    pub ml_aggressive: f64,
    pub ml_normal: f64,
    pub rule_verdict: Option<RuleLabel>,
    #[serde(default)]
    pub true_label: Option<BehaviorLabel>,
    pub hybrid_prob_aggressive: f64,
    pub hybrid_prob_normal: f64,
    pub hybrid_label: BehaviorLabel,
}

impl CalibrationArtifact {
    pub fn new(outcome: &CalibrationOutcome, rows: &[SignalRow]) -> Self {
        let rows = rows
            .iter()
            .zip(&outcome.hybrid)
            .map(|(row, hybrid)| ArtifactRow {
                ml_aggressive: row.ml.aggressive,
                ml_normal: row.ml.normal,
                rule_verdict: row.rule_verdict,
                true_label: row.truth,
                hybrid_prob_aggressive: hybrid.aggressive,
                hybrid_prob_normal: hybrid.normal,
                hybrid_label: hybrid.label,
            })
            .collect();

        Self {
            generated_at: Utc::now(),
            calibrated: outcome.calibrated,
            parameters: outcome.parameters,
            best_f1: outcome.best_f1,
            rows,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write calibration artifact {}", path.display()))?;
        info!("💾 Calibration artifact saved → {}", path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read calibration artifact {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse calibration artifact {}", path.display()))
    }

    /// Signal table for live video: hybrid probabilities act as the ML
    /// columns, and confident rule verdicts supply the rule columns.
    pub fn to_signal_rows(&self) -> Vec<SignalRow> {
        self.rows
            .iter()
            .map(|r| {
                let rule_verdict = r.rule_verdict;
                SignalRow {
                    ml: ClassifierProbability::new(r.hybrid_prob_aggressive, r.hybrid_prob_normal),
                    rule: rule_verdict.and_then(|v| v.probability()),
                    rule_verdict,
                    truth: r.true_label,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::calibrator::HybridRow;

    #[test]
    fn test_load_reference() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.json");
        fs::write(
            &path,
            r#"[
                {"features": {"ear_ratio": 0.8}, "label": "Aggressive",
                 "classifier": {"aggressive": 0.9, "normal": 0.1}},
                {"features": {"ear_ratio": 0.1}}
            ]"#,
        )
        .unwrap();

        let samples = load_reference(&path).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label, Some(BehaviorLabel::Aggressive));
        assert_eq!(samples[0].classifier.unwrap().aggressive, 0.9);
        assert!(samples[1].label.is_none());
        assert!(samples[1].classifier.is_none());
    }

    #[test]
    fn test_artifact_round_trip_to_signal_rows() {
        let rows = vec![
            SignalRow::from_verdict(
                ClassifierProbability::from_aggressive(0.8),
                RuleLabel::Aggressive,
                Some(BehaviorLabel::Aggressive),
            ),
            SignalRow::from_verdict(
                ClassifierProbability::from_aggressive(0.3),
                RuleLabel::Uncertain,
                None,
            ),
        ];
        let outcome = CalibrationOutcome {
            parameters: HybridParameters::default(),
            best_f1: None,
            calibrated: false,
            hybrid: vec![
                HybridRow::new(0.86, BehaviorLabel::Aggressive),
                HybridRow::new(0.3, BehaviorLabel::Normal),
            ],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("calibration.json");
        CalibrationArtifact::new(&outcome, &rows).save(&path).unwrap();

        let loaded = CalibrationArtifact::load(&path).unwrap();
        assert!(!loaded.calibrated);
        assert_eq!(loaded.rows.len(), 2);
        assert!((loaded.rows[1].hybrid_prob_normal - 0.7).abs() < 1e-12);

        let signal = loaded.to_signal_rows();
        assert_eq!(signal[0].ml.aggressive, 0.86);
        assert_eq!(signal[0].rule.unwrap().aggressive, 1.0);
        assert!(signal[1].rule.is_none(), "uncertain verdict has no rule columns");
    }
}
