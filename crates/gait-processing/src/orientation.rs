//! Sensor orientation: local sensor axes to the body frame
//!
//! Body frame: X along the direction of travel, Y vertical. Three ways to
//! get there, chosen by sensor role:
//! - calibration poses (shanks): rotation from horizontal and vertical rest windows
//! - fixed permutation (pelvis): backward-mounted sensor with known axes
//! - axis map table (assistive device): per-session signed axis remapping

use crate::processor::StreamProcessor;
use gait_core::{calibration_error, AxisMap, GaitResult, SensorStream};
use nalgebra::{Matrix3, Vector3};
use std::fmt;
use tracing::{info, warn};

/// Below this a calibration vector cannot be normalised
const MIN_NORM: f64 = 1e-9;

/// Below this the two calibration directions count as collinear
const MIN_CROSS_NORM: f64 = 1e-6;

/// Orthogonal 3x3 matrix taking local sensor axes to body axes.
///
/// Applied identically to the accelerometer and gyroscope triplets of every
/// sample; both sensing elements share one rigid housing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix {
    matrix: Matrix3<f64>,
}

impl RotationMatrix {
    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        RotationMatrix { matrix }
    }

    /// Backward-mounted pelvis sensor: X' = -Z, Y' = Y, Z' = X
    #[rustfmt::skip]
    pub fn pelvis_permutation() -> Self {
        RotationMatrix {
            matrix: Matrix3::new(
                0.0, 0.0, -1.0,
                0.0, 1.0,  0.0,
                1.0, 0.0,  0.0,
            ),
        }
    }

    /// Signed permutation described by a per-session axis map
    pub fn from_axis_map(map: &AxisMap) -> Self {
        let mut matrix = Matrix3::zeros();
        for entry in map.entries() {
            matrix[(entry.target.index(), entry.source.index())] = entry.sign;
        }
        RotationMatrix { matrix }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Inverse of an orthogonal matrix
    pub fn transpose(&self) -> RotationMatrix {
        RotationMatrix {
            matrix: self.matrix.transpose(),
        }
    }

    pub fn apply_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.matrix * local
    }

    /// Rotate every sample of a copy of `stream`
    pub fn apply(&self, stream: &SensorStream) -> SensorStream {
        stream.map_triplets(|v| self.matrix * v)
    }
}

impl StreamProcessor for RotationMatrix {
    fn process(&self, input: &SensorStream) -> GaitResult<SensorStream> {
        Ok(self.apply(input))
    }

    fn name(&self) -> &str {
        "orientation"
    }
}

impl fmt::Display for RotationMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.matrix.row_iter() {
            writeln!(f, "[{:>9.5} {:>9.5} {:>9.5}]", row[0], row[1], row[2])?;
        }
        Ok(())
    }
}

/// Rotation derived from calibration poses, with the intermediate vectors
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationOutcome {
    pub rotation: RotationMatrix,
    /// Gravity direction in the local frame during the horizontal pose
    pub g_prime: Vector3<f64>,
    /// Body vertical axis in the local frame
    pub y_body: Vector3<f64>,
    /// Mean accelerometer magnitude in the horizontal window
    pub horizontal_norm: f64,
    /// Mean accelerometer magnitude in the vertical window
    pub vertical_norm: f64,
}

impl CalibrationOutcome {
    /// Log how close both windows are to gravity. Never fails.
    pub fn log_gravity_check(&self, expected: f64, tolerance: f64) -> bool {
        let mut plausible = true;
        for (pose, norm) in [("horizontal", self.horizontal_norm), ("vertical", self.vertical_norm)] {
            if (norm - expected).abs() > tolerance {
                plausible = false;
                warn!(pose, norm, expected, "calibration window magnitude far from gravity");
            } else {
                info!(pose, norm, "calibration window magnitude");
            }
        }
        plausible
    }
}

/// Derive the body-frame rotation from two rest windows of the same sensor.
///
/// The horizontal mean (X sign flipped) gives the gravity direction `g'`,
/// the vertical mean gives `Y_B`; `Z_B = Y_B x g'` (normalised) and
/// `X_B = Y_B x Z_B`. The matrix has `X_B`, `Y_B`, `Z_B` as columns.
pub fn derive_rotation(horizontal: &SensorStream, vertical: &SensorStream) -> GaitResult<CalibrationOutcome> {
    let horizontal_mean = horizontal
        .accel_mean()
        .ok_or_else(|| calibration_error!("horizontal window is empty"))?;
    let vertical_mean = vertical
        .accel_mean()
        .ok_or_else(|| calibration_error!("vertical window is empty"))?;

    let horizontal_norm = horizontal_mean.norm();
    let vertical_norm = vertical_mean.norm();
    if horizontal_norm < MIN_NORM {
        return Err(calibration_error!("horizontal window mean has zero magnitude"));
    }
    if vertical_norm < MIN_NORM {
        return Err(calibration_error!("vertical window mean has zero magnitude"));
    }

    let flipped = Vector3::new(-horizontal_mean.x, horizontal_mean.y, horizontal_mean.z);
    let g_prime = flipped / horizontal_norm;
    let y_body = vertical_mean / vertical_norm;

    let z_raw = y_body.cross(&g_prime);
    let z_norm = z_raw.norm();
    if z_norm < MIN_CROSS_NORM {
        return Err(calibration_error!(
            "horizontal and vertical poses are collinear (|Y_B x g'| = {:.2e})",
            z_norm
        ));
    }
    let z_body = z_raw / z_norm;
    let x_body = y_body.cross(&z_body);
    if x_body.norm() < MIN_CROSS_NORM {
        return Err(calibration_error!("body X axis vanished"));
    }

    let rotation = RotationMatrix::from_matrix(Matrix3::from_columns(&[x_body, y_body, z_body]));

    Ok(CalibrationOutcome {
        rotation,
        g_prime,
        y_body,
        horizontal_norm,
        vertical_norm,
    })
}
