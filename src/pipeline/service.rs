// src/pipeline/service.rs
//
// Request boundary: one uploaded video in, one list of per-frame results out.
// The upload is spooled to a temp file that is removed on every exit path.

use super::fusion::OnlineFusionEngine;
use crate::error::InputError;
use crate::signal_store::SignalStore;
use crate::types::{FrameResult, FusionConfig};
use crate::video_processor::VideoDecoder;
use serde::Serialize;
use std::io::Write;
use tracing::{error, info};

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub frame_wise_predictions: Vec<FrameResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl From<&InputError> for ErrorResponse {
    fn from(err: &InputError) -> Self {
        Self {
            error: err.to_string(),
            code: err.code(),
        }
    }
}

pub struct PredictionService<'a, D: VideoDecoder> {
    decoder: D,
    store: &'a SignalStore,
    fusion: FusionConfig,
}

impl<'a, D: VideoDecoder> PredictionService<'a, D> {
    pub fn new(decoder: D, store: &'a SignalStore, fusion: FusionConfig) -> Self {
        Self {
            decoder,
            store,
            fusion,
        }
    }

    /// Fuse every frame of `upload`. Values are rounded to 3 decimals.
    pub fn predict(&self, upload: Option<&[u8]>) -> Result<PredictionResponse, InputError> {
        let bytes = upload.ok_or(InputError::NoVideo)?;

        let mut spool = tempfile::Builder::new()
            .prefix("upload_")
            .suffix(".mp4")
            .tempfile()
            .map_err(|e| InputError::CannotOpen(format!("spool: {}", e)))?;
        spool
            .write_all(bytes)
            .and_then(|_| spool.flush())
            .map_err(|e| InputError::CannotOpen(format!("spool: {}", e)))?;
        info!("Spooled {} byte upload to {}", bytes.len(), spool.path().display());

        let result = self.decoder.open(spool.path()).and_then(|mut source| {
            let mut engine = OnlineFusionEngine::new(self.store, self.fusion.clone());
            engine.run(source.as_mut())
        });

        match result {
            Ok(frames) => Ok(PredictionResponse {
                frame_wise_predictions: frames.iter().map(FrameResult::rounded).collect(),
            }),
            Err(e) => {
                error!("Prediction failed [{}]: {}", e.code(), e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal_store::SignalRow;
    use crate::types::{BehaviorLabel, ClassifierProbability, Frame, RuleLabel};
    use crate::video_processor::FrameSource;
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    /// Yields `frames` copies of a flat frame and remembers the spool path
    struct FakeDecoder {
        frames: usize,
        opened: RefCell<Option<PathBuf>>,
    }

    struct FlatSource(usize);

    impl FrameSource for FlatSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, InputError> {
            if self.0 == 0 {
                return Ok(None);
            }
            self.0 -= 1;
            Ok(Some(Frame {
                data: vec![90; 2 * 2 * 3],
                width: 2,
                height: 2,
                timestamp_ms: 0.0,
            }))
        }
    }

    impl VideoDecoder for FakeDecoder {
        fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, InputError> {
            assert!(path.exists());
            *self.opened.borrow_mut() = Some(path.to_path_buf());
            Ok(Box::new(FlatSource(self.frames)))
        }
    }

    fn decoder(frames: usize) -> FakeDecoder {
        FakeDecoder {
            frames,
            opened: RefCell::new(None),
        }
    }

    fn store() -> SignalStore {
        SignalStore::new(vec![SignalRow::from_verdict(
            ClassifierProbability::from_aggressive(0.8123),
            RuleLabel::Aggressive,
            None,
        )])
        .unwrap()
    }

    #[test]
    fn test_predict_rounds_and_cleans_up() {
        let store = store();
        let service = PredictionService::new(decoder(2), &store, FusionConfig::default());

        let response = service.predict(Some(b"fake mp4 bytes")).unwrap();
        assert_eq!(response.frame_wise_predictions.len(), 2);

        // 0.5 * 0.8123 + 0.5 * 1.0 = 0.90615
        let first = &response.frame_wise_predictions[0];
        assert_eq!(first.hybrid_aggressive, 0.906);
        assert_eq!(first.label, BehaviorLabel::Aggressive);

        let spooled = service.decoder.opened.borrow().clone().unwrap();
        assert!(spooled.to_string_lossy().ends_with(".mp4"));
        assert!(!spooled.exists());
    }

    #[test]
    fn test_missing_upload() {
        let store = store();
        let service = PredictionService::new(decoder(1), &store, FusionConfig::default());
        let err = service.predict(None).unwrap_err();
        assert_eq!(ErrorResponse::from(&err).code, "no_video");
        assert!(service.decoder.opened.borrow().is_none());
    }

    #[test]
    fn test_empty_video_removes_spool() {
        let store = store();
        let service = PredictionService::new(decoder(0), &store, FusionConfig::default());
        let err = service.predict(Some(b"")).unwrap_err();

        let body = ErrorResponse::from(&err);
        assert_eq!(body.code, "no_frames");
        assert_eq!(body.error, "Video has no frames");
        assert!(!service.decoder.opened.borrow().clone().unwrap().exists());
    }

    #[test]
    fn test_response_json_shape() {
        let store = store();
        let service = PredictionService::new(decoder(1), &store, FusionConfig::default());
        let response = service.predict(Some(b"x")).unwrap();

        let json = serde_json::to_value(&response).unwrap();
        let frame = &json["frame_wise_predictions"][0];
        assert_eq!(frame["frame"], 0);
        assert!(frame.get("motion_score").is_some());
    }
}
