// src/features.rs
//
// Named pose features as produced by the upstream keypoint pipeline.
// Ratios and angles are already normalized there; this crate only reads them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default rule-scorer feature set
pub const RULE_FEATURES: [&str; 11] = [
    "tail_stiffness",
    "front_leg_stance",
    "back_leg_stance",
    "head_angle_norm",
    "front_leg_angle_norm",
    "back_leg_angle_norm",
    "tail_angle_norm",
    "ear_ratio",
    "trunk_ratio",
    "tail_ratio",
    "body_ratio",
];

/// Input order expected by the pose classifier model
pub const CLASSIFIER_FEATURES: [&str; 17] = [
    "ear_spread",
    "trunk_length",
    "tail_length",
    "front_leg_stance",
    "back_leg_stance",
    "ear_ratio",
    "trunk_ratio",
    "front_leg_ratio",
    "back_leg_ratio",
    "tail_ratio",
    "body_ratio",
    "head_angle_norm",
    "trunk_angle_norm",
    "front_leg_angle_norm",
    "back_leg_angle_norm",
    "ear_angle_norm",
    "tail_angle_norm",
];

pub const TAIL_ANGLE: &str = "tail_angle_norm";
pub const HEAD_ANGLE: &str = "head_angle_norm";
pub const FRONT_LEG_STANCE: &str = "front_leg_stance";
pub const BACK_LEG_STANCE: &str = "back_leg_stance";
pub const TAIL_RATIO: &str = "tail_ratio";
pub const BODY_RATIO: &str = "body_ratio";

/// Feature name → scalar. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(BTreeMap<String, f64>);

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    /// Missing features read as 0.0
    pub fn get_or_zero(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(0.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Dense vector in `order`, zero-filling absent names
    pub fn to_dense(&self, order: &[&str]) -> Vec<f32> {
        order.iter().map(|name| self.get_or_zero(name) as f32).collect()
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_feature_defaults_to_zero() {
        let fv: FeatureVector = [("ear_ratio", 0.4)].into_iter().collect();
        assert_eq!(fv.get_or_zero("ear_ratio"), 0.4);
        assert_eq!(fv.get_or_zero("tail_ratio"), 0.0);
        assert!(fv.get("tail_ratio").is_none());
    }

    #[test]
    fn test_dense_order() {
        let fv: FeatureVector = [("b", 2.0), ("a", 1.0)].into_iter().collect();
        assert_eq!(fv.to_dense(&["a", "missing", "b"]), vec![1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_json_is_plain_map() {
        let fv: FeatureVector = serde_json::from_str(r#"{"ear_ratio": 0.5}"#).unwrap();
        assert_eq!(fv.get("ear_ratio"), Some(0.5));
    }
}
