// src/error.rs
//
// Typed failures at the library boundary. Everything else is absorbed by
// fallback policies inside the pipeline.

use crate::types::BehaviorLabel;

/// Request-boundary failures. No partial results accompany these.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("No video uploaded")]
    NoVideo,

    #[error("Cannot open video: {0}")]
    CannotOpen(String),

    #[error("Video has no frames")]
    NoFrames,

    #[error("Failed to decode frame {frame}: {reason}")]
    Decode { frame: u64, reason: String },
}

impl InputError {
    pub fn code(&self) -> &'static str {
        match self {
            InputError::NoVideo => "no_video",
            InputError::CannotOpen(_) => "cannot_open",
            InputError::NoFrames => "no_frames",
            InputError::Decode { .. } => "decode_failed",
        }
    }
}

/// A reference dataset that cannot produce a calibration bundle
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("Reference dataset is empty")]
    EmptyReferenceSet,

    #[error("Reference dataset has no {} samples", .0.as_str())]
    MissingClass(BehaviorLabel),

    #[error("None of the configured rule features appear in the reference dataset")]
    NoFeatures,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Signal table is empty")]
    Empty,

    #[error("Signal table has {rows} rows but {verdicts} rule verdicts")]
    LengthMismatch { rows: usize, verdicts: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_error_codes_and_messages() {
        assert_eq!(InputError::NoVideo.code(), "no_video");
        assert_eq!(InputError::NoFrames.to_string(), "Video has no frames");
        assert_eq!(
            InputError::CannotOpen("bad header".into()).to_string(),
            "Cannot open video: bad header"
        );
    }

    #[test]
    fn test_missing_class_message() {
        let err = CalibrationError::MissingClass(BehaviorLabel::Aggressive);
        assert_eq!(err.to_string(), "Reference dataset has no Aggressive samples");
    }
}
