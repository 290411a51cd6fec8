// src/signal_store.rs
//
// Per-row lookup of precomputed classifier and rule probabilities.
//
// Rows are addressed by position (frame index == row index). Past the end of
// the table every lookup returns the column means of the whole table, so
// arbitrarily long videos keep producing results.

use crate::analysis::rule_scorer::{self, CalibrationBundle};
use crate::dataset::ReferenceSample;
use crate::error::StoreError;
use crate::inference::PoseClassifier;
use crate::types::{BehaviorLabel, ClassifierProbability, RuleLabel, RuleVerdict};
use anyhow::{bail, Result};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct SignalRow {
    pub ml: ClassifierProbability,
    /// Absent when the rule was Uncertain or the table has no rule columns
    pub rule: Option<ClassifierProbability>,
    pub rule_verdict: Option<RuleLabel>,
    pub truth: Option<BehaviorLabel>,
}

impl SignalRow {
    pub fn from_verdict(
        ml: ClassifierProbability,
        verdict: RuleLabel,
        truth: Option<BehaviorLabel>,
    ) -> Self {
        Self {
            ml,
            rule: verdict.probability(),
            rule_verdict: Some(verdict),
            truth,
        }
    }

    /// Whether the rule signal is confident enough to blend
    pub fn rule_mask(&self) -> bool {
        self.rule.is_some()
    }

    /// Rule probability, or the ML probability when the rule has none
    pub fn effective_rule(&self) -> ClassifierProbability {
        self.rule.unwrap_or(self.ml)
    }
}

/// Signals served for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalLookup {
    pub ml: ClassifierProbability,
    pub rule: ClassifierProbability,
    /// True when the index was past the table and means were served
    pub fallback: bool,
}

#[derive(Debug, Clone)]
pub struct SignalStore {
    rows: Vec<SignalRow>,
    ml_mean: ClassifierProbability,
    rule_mean: ClassifierProbability,
}

impl SignalStore {
    pub fn new(rows: Vec<SignalRow>) -> Result<Self, StoreError> {
        if rows.is_empty() {
            return Err(StoreError::Empty);
        }

        let n = rows.len() as f64;
        let mut ml = (0.0, 0.0);
        let mut rule = (0.0, 0.0);
        for row in &rows {
            let r = row.effective_rule();
            ml.0 += row.ml.aggressive;
            ml.1 += row.ml.normal;
            rule.0 += r.aggressive;
            rule.1 += r.normal;
        }

        let store = Self {
            ml_mean: ClassifierProbability::new(ml.0 / n, ml.1 / n),
            rule_mean: ClassifierProbability::new(rule.0 / n, rule.1 / n),
            rows,
        };
        debug!(
            "Signal store: {} rows, population ml={:.3} rule={:.3}",
            store.rows.len(),
            store.ml_mean.aggressive,
            store.rule_mean.aggressive
        );
        Ok(store)
    }

    /// Zip parallel columns into rows
    pub fn from_columns(
        ml: Vec<ClassifierProbability>,
        verdicts: &[RuleVerdict],
        truth: Vec<Option<BehaviorLabel>>,
    ) -> Result<Self, StoreError> {
        if ml.len() != verdicts.len() || truth.len() != verdicts.len() {
            return Err(StoreError::LengthMismatch {
                rows: ml.len(),
                verdicts: verdicts.len(),
            });
        }
        let rows = ml
            .into_iter()
            .zip(verdicts)
            .zip(truth)
            .map(|((ml, v), truth)| SignalRow::from_verdict(ml, v.label, truth))
            .collect();
        Self::new(rows)
    }

    /// Score every reference sample with the rule bundle and pair it with
    /// its classifier probability (precomputed, or from `classifier`).
    pub fn from_reference(
        samples: &[ReferenceSample],
        bundle: &CalibrationBundle,
        mut classifier: Option<&mut dyn PoseClassifier>,
    ) -> Result<(Self, Vec<RuleVerdict>)> {
        let mut ml = Vec::with_capacity(samples.len());
        for (i, sample) in samples.iter().enumerate() {
            let p = match (sample.classifier, classifier.as_deref_mut()) {
                (Some(p), _) => p,
                (None, Some(c)) => c.predict(&sample.features)?,
                (None, None) => bail!(
                    "Reference row {} has no classifier probability and no classifier is loaded",
                    i
                ),
            };
            ml.push(p);
        }

        let verdicts: Vec<RuleVerdict> = samples
            .iter()
            .map(|s| rule_scorer::score(bundle, &s.features))
            .collect();
        let truth = samples.iter().map(|s| s.label).collect();

        let store = Self::from_columns(ml, &verdicts, truth)?;
        info!("✓ Signal store built from {} reference rows", store.len());
        Ok((store, verdicts))
    }

    pub fn lookup(&self, index: usize) -> SignalLookup {
        match self.rows.get(index) {
            Some(row) => SignalLookup {
                ml: row.ml,
                rule: row.effective_rule(),
                fallback: false,
            },
            None => self.population(),
        }
    }

    /// Column means of the whole table. Also served for frames where the
    /// pose extractor found no animal.
    pub fn population(&self) -> SignalLookup {
        SignalLookup {
            ml: self.ml_mean,
            rule: self.rule_mean,
            fallback: true,
        }
    }

    pub fn rows(&self) -> &[SignalRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Ground truth for every row, or None if any row is unlabeled
    pub fn ground_truth(&self) -> Option<Vec<BehaviorLabel>> {
        self.rows.iter().map(|r| r.truth).collect()
    }

    pub fn population_mean(&self) -> (ClassifierProbability, ClassifierProbability) {
        (self.ml_mean, self.rule_mean)
    }
}
