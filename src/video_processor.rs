// src/video_processor.rs

use crate::error::InputError;
use crate::types::{Frame, VideoConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];
const SEQUENCE_FPS: f64 = 30.0;

/// Ordered, finite, non-restartable frame stream
pub trait FrameSource {
    /// Next frame, or None at end of stream
    fn next_frame(&mut self) -> Result<Option<Frame>, InputError>;
}

/// Opens a stored video for decoding
pub trait VideoDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, InputError>;
}

/// A video input discovered on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoInput {
    /// Container file, needs the `video` feature to decode
    File(PathBuf),
    /// Directory of frame images, decoded in file-name order
    FrameDirectory(PathBuf),
}

impl VideoInput {
    pub fn path(&self) -> &Path {
        match self {
            VideoInput::File(p) | VideoInput::FrameDirectory(p) => p,
        }
    }
}

pub struct VideoProcessor {
    config: VideoConfig,
}

impl VideoProcessor {
    pub fn new(config: VideoConfig) -> Self {
        Self { config }
    }

    pub fn find_inputs(&self) -> Vec<VideoInput> {
        let mut inputs = Vec::new();

        for entry in WalkDir::new(&self.config.input_dir)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if entry.file_type().is_dir() {
                if contains_images(path) {
                    inputs.push(VideoInput::FrameDirectory(path.to_path_buf()));
                }
            } else if has_extension(path, &self.config.extensions) {
                inputs.push(VideoInput::File(path.to_path_buf()));
            }
        }

        info!(
            "Found {} video input(s) in {}",
            inputs.len(),
            self.config.input_dir
        );
        inputs
    }
}

fn has_extension<S: AsRef<str>>(path: &Path, extensions: &[S]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|allowed| allowed.as_ref().eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

fn image_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), &IMAGE_EXTENSIONS))
        .map(|e| e.into_path())
        .collect()
}

fn contains_images(dir: &Path) -> bool {
    !image_files(dir).is_empty()
}

// ============================================================================
// IMAGE SEQUENCE
// ============================================================================

/// Decodes a directory of frame images
pub struct ImageSequenceDecoder;

impl VideoDecoder for ImageSequenceDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, InputError> {
        if !path.is_dir() {
            return Err(InputError::CannotOpen(format!(
                "{} is not a frame directory",
                path.display()
            )));
        }
        let frames = image_files(path);
        info!(
            "Opening frame sequence: {} ({} images)",
            path.display(),
            frames.len()
        );
        Ok(Box::new(ImageSequenceReader {
            frames: frames.into_iter(),
            current_frame: 0,
        }))
    }
}

pub struct ImageSequenceReader {
    frames: std::vec::IntoIter<PathBuf>,
    current_frame: u64,
}

impl FrameSource for ImageSequenceReader {
    fn next_frame(&mut self) -> Result<Option<Frame>, InputError> {
        let Some(path) = self.frames.next() else {
            return Ok(None);
        };

        let rgb = image::open(&path)
            .map_err(|e| InputError::Decode {
                frame: self.current_frame,
                reason: format!("{}: {}", path.display(), e),
            })?
            .to_rgb8();
        debug!("Decoded {}", path.display());

        let frame = Frame {
            width: rgb.width() as usize,
            height: rgb.height() as usize,
            data: rgb.into_raw(),
            timestamp_ms: self.current_frame as f64 / SEQUENCE_FPS * 1000.0,
        };
        self.current_frame += 1;
        Ok(Some(frame))
    }
}

// ============================================================================
// OPENCV CONTAINER DECODING
// ============================================================================

#[cfg(feature = "video")]
pub use opencv_backend::{OpenCvDecoder, VideoReader};

#[cfg(feature = "video")]
mod opencv_backend {
    use super::{FrameSource, VideoDecoder};
    use crate::error::InputError;
    use crate::types::Frame;
    use opencv::{
        core::Mat,
        imgproc,
        prelude::*,
        videoio::{self, VideoCapture, VideoCaptureTrait, VideoCaptureTraitConst},
    };
    use std::path::Path;
    use tracing::info;

    pub struct OpenCvDecoder;

    impl VideoDecoder for OpenCvDecoder {
        fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, InputError> {
            info!("Opening video: {}", path.display());
            let reader = VideoReader::open(path)
                .map_err(|e| InputError::CannotOpen(e.to_string()))?;
            Ok(Box::new(reader))
        }
    }

    /// Owns the capture handle; released on drop on every exit path
    pub struct VideoReader {
        cap: VideoCapture,
        pub fps: f64,
        pub total_frames: i32,
        pub current_frame: u64,
        pub width: i32,
        pub height: i32,
    }

    impl VideoReader {
        pub fn open(path: &Path) -> anyhow::Result<Self> {
            let path_str = path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Non UTF-8 video path"))?;
            let cap = VideoCapture::from_file(path_str, videoio::CAP_ANY)?;

            if !cap.is_opened()? {
                anyhow::bail!("Failed to open video file");
            }

            let fps = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FPS)?;
            let total_frames =
                VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_COUNT)? as i32;
            let width = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_WIDTH)? as i32;
            let height = VideoCaptureTraitConst::get(&cap, videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

            info!(
                "Video properties: {}x{} @ {:.1} FPS, {} frames",
                width, height, fps, total_frames
            );

            Ok(Self {
                cap,
                fps,
                total_frames,
                current_frame: 0,
                width,
                height,
            })
        }

        fn read_rgb(&mut self) -> anyhow::Result<Option<Frame>> {
            let mut mat = Mat::default();
            if !VideoCaptureTrait::read(&mut self.cap, &mut mat)? || mat.empty() {
                return Ok(None);
            }

            let timestamp_ms = if self.fps > 0.0 {
                self.current_frame as f64 / self.fps * 1000.0
            } else {
                0.0
            };

            let mut rgb_mat = Mat::default();
            imgproc::cvt_color(&mat, &mut rgb_mat, imgproc::COLOR_BGR2RGB, 0)?;

            Ok(Some(Frame {
                data: rgb_mat.data_bytes()?.to_vec(),
                width: rgb_mat.cols() as usize,
                height: rgb_mat.rows() as usize,
                timestamp_ms,
            }))
        }
    }

    impl FrameSource for VideoReader {
        fn next_frame(&mut self) -> Result<Option<Frame>, InputError> {
            let frame = self.read_rgb().map_err(|e| InputError::Decode {
                frame: self.current_frame,
                reason: e.to_string(),
            })?;
            if frame.is_some() {
                self.current_frame += 1;
            }
            Ok(frame)
        }
    }

    impl Drop for VideoReader {
        fn drop(&mut self) {
            let _ = VideoCaptureTrait::release(&mut self.cap);
        }
    }
}
