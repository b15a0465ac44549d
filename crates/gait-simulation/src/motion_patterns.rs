//! Body-frame motion patterns for session phases

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Standard gravity used for synthetic poses (m/s^2)
pub const GRAVITY: f64 = 9.8;

/// What a sensor experiences during one phase, expressed in its body frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MotionPattern {
    /// Static pose; the accelerometer reads `gravity`, the gyroscope zero
    Still { gravity: [f64; 3] },
    /// Upright walking at `cadence_hz` strides per second
    Walking {
        cadence_hz: f64,
        /// Peak forward/vertical acceleration (m/s^2)
        accel_amplitude: f64,
        /// Peak sagittal angular velocity (deg/s)
        gyro_amplitude: f64,
    },
    /// Linear blend between two static poses over `duration` seconds
    Transition {
        from: [f64; 3],
        to: [f64; 3],
        duration: f64,
    },
}

impl MotionPattern {
    pub fn upright() -> Self {
        MotionPattern::Still {
            gravity: [0.0, GRAVITY, 0.0],
        }
    }

    /// Limb extended horizontally (knee straight, seated)
    pub fn limb_horizontal() -> Self {
        MotionPattern::Still {
            gravity: [-GRAVITY, 0.0, 0.0],
        }
    }

    /// Body-frame accelerometer and gyroscope readings `time` seconds into the phase
    pub fn body_sample(&self, time: f64) -> (Vector3<f64>, Vector3<f64>) {
        match *self {
            MotionPattern::Still { gravity } => (Vector3::from(gravity), Vector3::zeros()),

            MotionPattern::Walking {
                cadence_hz,
                accel_amplitude,
                gyro_amplitude,
            } => {
                let phase = 2.0 * PI * cadence_hz * time;
                let accel = Vector3::new(
                    accel_amplitude * phase.sin(),
                    GRAVITY + 0.5 * accel_amplitude * (2.0 * phase + 0.4).sin(),
                    0.2 * accel_amplitude * phase.cos(),
                );
                let gyro = Vector3::new(
                    0.15 * gyro_amplitude * phase.cos(),
                    0.1 * gyro_amplitude * (2.0 * phase).sin(),
                    gyro_amplitude * (phase + PI / 2.0).sin(),
                );
                (accel, gyro)
            }

            MotionPattern::Transition { from, to, duration } => {
                let alpha = if duration > 0.0 {
                    (time / duration).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                let from = Vector3::from(from);
                let to = Vector3::from(to);
                (from + (to - from) * alpha, Vector3::zeros())
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MotionPattern::Still { .. } => "Static pose",
            MotionPattern::Walking { .. } => "Level walking",
            MotionPattern::Transition { .. } => "Pose transition",
        }
    }

    /// Walking presets by how fast the mounting segment moves
    pub fn presets() -> Vec<(&'static str, MotionPattern)> {
        vec![
            ("Pelvis walk", MotionPattern::Walking {
                cadence_hz: 0.9, accel_amplitude: 1.5, gyro_amplitude: 15.0
            }),
            ("Shank walk", MotionPattern::Walking {
                cadence_hz: 0.9, accel_amplitude: 6.0, gyro_amplitude: 250.0
            }),
            ("Cane walk", MotionPattern::Walking {
                cadence_hz: 0.9, accel_amplitude: 3.0, gyro_amplitude: 60.0
            }),
        ]
    }
}
