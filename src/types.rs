// src/types.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rules: RuleConfig,
    pub calibration: CalibrationConfig,
    pub fusion: FusionConfig,
    pub data: DataConfig,
    pub video: VideoConfig,
    pub classifier: ClassifierConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Candidate features for the rule scorer, in scoring order
    pub features: Vec<String>,
    /// Score above +band is Aggressive, below -band is Normal
    pub decision_band: f64,
    /// Margin used when a feature's spread cannot be measured
    pub default_margin: f64,
    /// Z-scores are clipped to [-clip, clip]
    pub clip: f64,
    pub std_epsilon: f64,
    /// Fixed bonus/penalty of the compound posture heuristics
    pub heuristic_bonus: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub alpha_min: f64,
    pub alpha_max: f64,
    pub alpha_steps: usize,
    pub threshold_min: f64,
    pub threshold_max: f64,
    pub threshold_steps: usize,
    pub default_alpha: f64,
    pub default_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Share of the blending weight that motion can move
    pub base_alpha: f64,
    /// Motion at which the ML signal is fully trusted
    pub motion_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub reference_dataset: String,
    /// Optional precomputed signal table; built from the reference set when empty
    pub signal_table: Option<String>,
    pub calibration_artifact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub input_dir: String,
    pub output_dir: String,
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub model_path: Option<String>,
    pub num_threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

/// Decoded video frame, RGB packed (3 bytes per pixel)
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

/// Ground-truth / hybrid output class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehaviorLabel {
    Aggressive,
    Normal,
}

impl BehaviorLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorLabel::Aggressive => "Aggressive",
            BehaviorLabel::Normal => "Normal",
        }
    }
}

/// Rule scorer outcome. `Uncertain` means insufficient evidence, not failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleLabel {
    Aggressive,
    Normal,
    Uncertain,
}

impl RuleLabel {
    pub fn as_behavior(&self) -> Option<BehaviorLabel> {
        match self {
            RuleLabel::Aggressive => Some(BehaviorLabel::Aggressive),
            RuleLabel::Normal => Some(BehaviorLabel::Normal),
            RuleLabel::Uncertain => None,
        }
    }

    /// Hard probability implied by a confident verdict
    pub fn probability(&self) -> Option<ClassifierProbability> {
        match self {
            RuleLabel::Aggressive => Some(ClassifierProbability::from_aggressive(1.0)),
            RuleLabel::Normal => Some(ClassifierProbability::from_aggressive(0.0)),
            RuleLabel::Uncertain => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleVerdict {
    pub label: RuleLabel,
    pub score: f64,
}

/// (p_aggressive, p_normal) pair from the pose classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierProbability {
    pub aggressive: f64,
    pub normal: f64,
}

impl ClassifierProbability {
    pub fn new(aggressive: f64, normal: f64) -> Self {
        Self { aggressive, normal }
    }

    pub fn from_aggressive(aggressive: f64) -> Self {
        Self {
            aggressive,
            normal: 1.0 - aggressive,
        }
    }
}

/// Tuned blending weight and decision threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridParameters {
    pub alpha: f64,
    pub threshold: f64,
}

impl Default for HybridParameters {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameResult {
    pub frame: u64,
    pub hybrid_aggressive: f64,
    pub hybrid_normal: f64,
    pub motion_score: f64,
    pub dynamic_alpha: f64,
    pub label: BehaviorLabel,
}

impl FrameResult {
    /// Copy with probabilities rounded to 3 decimals for the response table
    pub fn rounded(&self) -> Self {
        Self {
            frame: self.frame,
            hybrid_aggressive: round3(self.hybrid_aggressive),
            hybrid_normal: round3(self.hybrid_normal),
            motion_score: round3(self.motion_score),
            dynamic_alpha: round3(self.dynamic_alpha),
            label: self.label,
        }
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
