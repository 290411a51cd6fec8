use crate::features::RULE_FEATURES;
use crate::types::{
    CalibrationConfig, ClassifierConfig, Config, DataConfig, FusionConfig, LoggingConfig,
    RuleConfig, VideoConfig,
};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

impl Config {
    /// Read and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Read the YAML file only; no environment lookups
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// `ELEPHANT_INPUT_DIR` / `ELEPHANT_OUTPUT_DIR` win over the file
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("ELEPHANT_INPUT_DIR") {
            info!("Input dir overridden by environment: {}", dir);
            self.video.input_dir = dir;
        }
        if let Some(dir) = lookup("ELEPHANT_OUTPUT_DIR") {
            info!("Output dir overridden by environment: {}", dir);
            self.video.output_dir = dir;
        }
    }

    /// Filter directive for tracing_subscriber
    pub fn log_directive(&self) -> String {
        format!("elephant_behavior={},ort=warn", self.logging.level)
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            features: RULE_FEATURES.iter().map(|f| f.to_string()).collect(),
            decision_band: 0.25,
            default_margin: 0.2,
            clip: 3.0,
            std_epsilon: 1e-6,
            heuristic_bonus: 0.1,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            alpha_min: 0.4,
            alpha_max: 0.9,
            alpha_steps: 6,
            threshold_min: 0.4,
            threshold_max: 0.6,
            threshold_steps: 5,
            default_alpha: 0.7,
            default_threshold: 0.5,
        }
    }
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            base_alpha: 0.5,
            motion_threshold: 0.05,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            reference_dataset: "data/reference.json".to_string(),
            signal_table: None,
            calibration_artifact: "output/calibration.json".to_string(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            input_dir: "videos".to_string(),
            output_dir: "output".to_string(),
            extensions: ["mp4", "avi", "mov", "mkv"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            num_threads: 1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "fusion:\n  base_alpha: 0.4\nlogging:\n  level: debug\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.fusion.base_alpha, 0.4);
        assert_eq!(config.fusion.motion_threshold, 0.05);
        assert_eq!(config.rules.decision_band, 0.25);
        assert_eq!(config.rules.features.len(), RULE_FEATURES.len());
        assert_eq!(config.calibration.alpha_steps, 6);
        assert_eq!(config.log_directive(), "elephant_behavior=debug,ort=warn");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "calibration:\n  threshold_steps: 3").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.calibration.threshold_steps, 3);
        assert_eq!(config.calibration.default_threshold, 0.5);
    }

    #[test]
    fn test_from_file_leaves_overrides_to_caller() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "video:\n  input_dir: clips").unwrap();

        let mut config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.video.input_dir, "clips");

        config.apply_overrides(|key| match key {
            "ELEPHANT_OUTPUT_DIR" => Some("/tmp/out".to_string()),
            _ => None,
        });
        assert_eq!(config.video.input_dir, "clips");
        assert_eq!(config.video.output_dir, "/tmp/out");
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load("/nonexistent/config.yaml").is_err());
    }
}
