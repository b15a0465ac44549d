//! Gait-Simulation: synthetic IMU sessions
//!
//! Seedable recordings with calibration poses, walking trials, arbitrary
//! sensor mountings and independent sample clocks, for tests and demos.

pub mod imu_simulator;
pub mod motion_patterns;

pub use imu_simulator::*;
pub use motion_patterns::*;
