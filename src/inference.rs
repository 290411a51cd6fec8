// src/inference.rs
//
// Pose classifier seam. The trained model is opaque: it takes a feature
// vector and returns (p_aggressive, p_normal).

use crate::features::FeatureVector;
use crate::types::ClassifierProbability;
use anyhow::Result;

pub trait PoseClassifier {
    fn predict(&mut self, features: &FeatureVector) -> Result<ClassifierProbability>;

    fn predict_batch(&mut self, batch: &[FeatureVector]) -> Result<Vec<ClassifierProbability>> {
        batch.iter().map(|f| self.predict(f)).collect()
    }
}

#[cfg(feature = "onnx")]
pub use onnx::OnnxPoseClassifier;

#[cfg(feature = "onnx")]
mod onnx {
    use super::PoseClassifier;
    use crate::features::{FeatureVector, CLASSIFIER_FEATURES};
    use crate::types::{ClassifierConfig, ClassifierProbability};
    use anyhow::{bail, Context, Result};
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use tracing::{debug, info};

    /// ONNX export of the pose classifier (scaler included in the graph).
    /// The last output holds class probabilities in order [normal, aggressive].
    pub struct OnnxPoseClassifier {
        session: Session,
    }

    impl OnnxPoseClassifier {
        pub fn new(config: &ClassifierConfig) -> Result<Self> {
            let Some(path) = &config.model_path else {
                bail!("classifier.model_path is not set");
            };
            info!("Initializing pose classifier");
            info!("Model path: {}", path);

            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(config.num_threads)?
                .with_inter_threads(1)?
                .commit_from_file(path)
                .context("Failed to load classifier model")?;

            info!("✓ Pose classifier initialized");
            Ok(Self { session })
        }
    }

    impl PoseClassifier for OnnxPoseClassifier {
        fn predict(&mut self, features: &FeatureVector) -> Result<ClassifierProbability> {
            // Missing features are zero-filled in model order
            let input = features.to_dense(&CLASSIFIER_FEATURES);
            let shape = [1usize, CLASSIFIER_FEATURES.len()];
            let input_value =
                ort::value::Value::from_array((shape.as_slice(), input.into_boxed_slice()))?;

            let outputs = self.session.run(ort::inputs![input_value])?;
            let output = &outputs[outputs.len() - 1];
            let (_, probs) = output
                .try_extract_tensor::<f32>()
                .context("Failed to extract probability tensor")?;

            if probs.len() < 2 {
                bail!("Classifier returned {} values, expected 2", probs.len());
            }
            debug!("Classifier output: normal={:.3} aggressive={:.3}", probs[0], probs[1]);

            Ok(ClassifierProbability::new(probs[1] as f64, probs[0] as f64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Linear stand-in for the trained model
    struct EarSpreadClassifier;

    impl PoseClassifier for EarSpreadClassifier {
        fn predict(&mut self, features: &FeatureVector) -> Result<ClassifierProbability> {
            let p = features.get_or_zero("ear_ratio").clamp(0.0, 1.0);
            Ok(ClassifierProbability::from_aggressive(p))
        }
    }

    #[test]
    fn test_batch_defaults_to_per_row() {
        let batch: Vec<FeatureVector> = vec![
            [("ear_ratio", 0.9)].into_iter().collect(),
            FeatureVector::default(),
        ];
        let probs = EarSpreadClassifier.predict_batch(&batch).unwrap();
        assert_eq!(probs.len(), 2);
        assert_eq!(probs[0].aggressive, 0.9);
        assert_eq!(probs[1].normal, 1.0);
    }
}
