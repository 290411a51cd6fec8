// src/lib.rs

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod inference;
pub mod pipeline;
pub mod signal_store;
pub mod types;
pub mod video_processor;

pub use error::{CalibrationError, InputError, StoreError};
pub use types::{BehaviorLabel, Config, FrameResult, RuleLabel};
