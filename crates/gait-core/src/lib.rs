//! Gait-Core: Foundation types for inertial gait recordings
//!
//! Sensor streams, sensor roles, time windows and the error taxonomy
//! shared by the processing engine and the command line tool.

pub mod axis_map;
pub mod error;
pub mod sensor_stream;
pub mod sensor_types;
pub mod timestamp;

pub use axis_map::{Axis, AxisMap, AxisMapEntry};
pub use error::{GaitError, GaitResult};
pub use sensor_stream::*;
pub use sensor_types::*;
pub use timestamp::*;
