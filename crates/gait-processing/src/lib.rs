//! Gait-Processing: orientation, filtering and segmentation engine
//!
//! Turns raw IMU streams into body-frame, band-filtered, trial-segmented
//! streams. Human review and storage are injected through traits.

pub mod config;
pub mod filters;
pub mod orientation;
pub mod pipeline;
pub mod processor;
pub mod segmentation;

pub use config::{AcquisitionProfile, LowpassCutoffs};
pub use filters::{BiquadSection, ButterworthFilter, ClassFilter, FilterConfig, FilterType, SignalFilterStage};
pub use orientation::{derive_rotation, CalibrationOutcome, RotationMatrix};
pub use pipeline::*;
pub use processor::{ProcessingChain, ProcessingMetrics, ProcessingTimer, StreamProcessor};
pub use segmentation::{TrialSegmenter, TrialSegments};
