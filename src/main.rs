// src/main.rs
//
// Batch runner: fit the rule scorer on the reference set, calibrate the
// hybrid, then fuse every video under the input dir.

use anyhow::{Context, Result};
use elephant_behavior::analysis::{rule_scorer, CalibrationBundle, Calibrator, LabelSummary};
use elephant_behavior::dataset::{self, CalibrationArtifact};
use elephant_behavior::inference::PoseClassifier;
use elephant_behavior::pipeline::OnlineFusionEngine;
use elephant_behavior::signal_store::SignalStore;
use elephant_behavior::types::{Config, FrameResult};
use elephant_behavior::video_processor::{
    ImageSequenceDecoder, VideoDecoder, VideoInput, VideoProcessor,
};
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let config_path =
        std::env::var("ELEPHANT_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let mut config = if Path::new(&config_path).exists() {
        Config::from_file(&config_path)?
    } else {
        Config::default()
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_directive()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Must follow subscriber init
    config.apply_env_overrides();

    info!("🐘 Elephant Behavior Classifier Starting");
    info!("✓ Configuration loaded ({})", config_path);

    // ── Rule scorer ─────────────────────────────────────────────
    let samples = dataset::load_reference(&config.data.reference_dataset)?;
    let bundle = CalibrationBundle::fit(&samples, &config.rules)
        .context("Failed to fit rule scorer on reference dataset")?;

    // ── Reference signal table ──────────────────────────────────
    let mut classifier = load_classifier(&config)?;
    let (reference, verdicts) = SignalStore::from_reference(
        &samples,
        &bundle,
        classifier
            .as_deref_mut()
            .map(|c| c as &mut dyn PoseClassifier),
    )?;

    let report = rule_scorer::evaluate(&samples, &verdicts);
    info!(
        "📏 Rule scorer: confident accuracy {:.1}%, coverage {:.1}% ({}/{} confident)",
        report.accuracy * 100.0,
        report.coverage * 100.0,
        report.confident,
        report.total
    );

    // ── Offline calibration ─────────────────────────────────────
    let calibrator = Calibrator::new(config.calibration.clone());
    let outcome = calibrator.calibrate(&reference);
    let artifact = CalibrationArtifact::new(&outcome, reference.rows());
    artifact.save(&config.data.calibration_artifact)?;

    // ── Live signal table ───────────────────────────────────────
    let store = match &config.data.signal_table {
        Some(path) => {
            let rows = CalibrationArtifact::load(path)?.to_signal_rows();
            let store = SignalStore::new(rows)
                .with_context(|| format!("Signal table {} is unusable", path))?;
            info!("✓ Signal table loaded from {} ({} rows)", path, store.len());
            store
        }
        None => reference,
    };

    // ── Videos ──────────────────────────────────────────────────
    let processor = VideoProcessor::new(config.video.clone());
    let inputs = processor.find_inputs();
    if inputs.is_empty() {
        warn!("No videos found in {}", config.video.input_dir);
        return Ok(());
    }
    fs::create_dir_all(&config.video.output_dir)?;

    let mut processed = 0;
    for (idx, input) in inputs.iter().enumerate() {
        info!("\n========================================");
        info!(
            "Processing video {}/{}: {}",
            idx + 1,
            inputs.len(),
            input.path().display()
        );
        info!("========================================\n");

        match process_input(input, &store, &config) {
            Ok(Some(results)) => {
                processed += 1;
                let summary = LabelSummary::from_labels(results.iter().map(|r| r.label));
                info!(
                    "✓ {} frames: {} aggressive ({:.1}%), {} normal ({:.1}%)",
                    summary.total,
                    summary.aggressive,
                    summary.aggressive_pct(),
                    summary.normal,
                    summary.normal_pct()
                );
            }
            Ok(None) => {}
            Err(e) => error!("✗ Failed to process {}: {:#}", input.path().display(), e),
        }
    }

    info!("\n📊 Final Report:");
    info!("  Videos processed: {}/{}", processed, inputs.len());
    info!(
        "  Hybrid parameters: alpha={:.2} threshold={:.2} ({})",
        outcome.parameters.alpha,
        outcome.parameters.threshold,
        if outcome.calibrated { "calibrated" } else { "defaults" }
    );
    Ok(())
}

#[cfg(feature = "onnx")]
fn load_classifier(config: &Config) -> Result<Option<Box<dyn PoseClassifier>>> {
    use elephant_behavior::inference::OnnxPoseClassifier;

    if config.classifier.model_path.is_none() {
        info!("⚪ No classifier model configured, using precomputed probabilities");
        return Ok(None);
    }
    Ok(Some(Box::new(OnnxPoseClassifier::new(&config.classifier)?)))
}

#[cfg(not(feature = "onnx"))]
fn load_classifier(config: &Config) -> Result<Option<Box<dyn PoseClassifier>>> {
    if config.classifier.model_path.is_some() {
        warn!("classifier.model_path is set but the `onnx` feature is disabled");
    }
    Ok(None)
}

/// Fuse one input and write `<name>_frames.json`. Returns None when the
/// input cannot be decoded in this build.
fn process_input(
    input: &VideoInput,
    store: &SignalStore,
    config: &Config,
) -> Result<Option<Vec<FrameResult>>> {
    let decoder: Box<dyn VideoDecoder> = match input {
        VideoInput::FrameDirectory(_) => Box::new(ImageSequenceDecoder),
        #[cfg(feature = "video")]
        VideoInput::File(_) => Box::new(elephant_behavior::video_processor::OpenCvDecoder),
        #[cfg(not(feature = "video"))]
        VideoInput::File(path) => {
            warn!(
                "Skipping {}: container decoding needs the `video` feature",
                path.display()
            );
            return Ok(None);
        }
    };

    let mut source = decoder.open(input.path())?;
    let mut engine = OnlineFusionEngine::new(store, config.fusion.clone());
    let results: Vec<FrameResult> = engine
        .run(source.as_mut())?
        .iter()
        .map(FrameResult::rounded)
        .collect();

    let name = input
        .path()
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    let out_path = Path::new(&config.video.output_dir).join(format!("{}_frames.json", name));
    let json = serde_json::json!({ "frame_wise_predictions": results });
    fs::write(&out_path, serde_json::to_string_pretty(&json)?)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    info!("💾 Results written to: {}", out_path.display());

    Ok(Some(results))
}
