//! Sensor roles, classes and orientation strategies

use crate::error::{GaitError, GaitResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Body side for limb-mounted sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Filter parameter class of a sensor.
///
/// Torso sensors carry slower content than limbs and walking aids, so
/// their accelerometer lowpass is lower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorClass {
    Torso,
    Limb,
    AssistiveDevice,
}

impl SensorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorClass::Torso => "torso",
            SensorClass::Limb => "limb",
            SensorClass::AssistiveDevice => "assistive_device",
        }
    }
}

impl FromStr for SensorClass {
    type Err = GaitError;

    fn from_str(s: &str) -> GaitResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "torso" | "pelvis" | "com" => Ok(SensorClass::Torso),
            "limb" | "shank" => Ok(SensorClass::Limb),
            "assistive_device" | "device" | "dev" => Ok(SensorClass::AssistiveDevice),
            _ => Err(GaitError::InvalidSensorClass { name: s.to_string() }),
        }
    }
}

impl std::fmt::Display for SensorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a sensor's local axes are brought into the body frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrientationStrategy {
    /// Rotation derived from horizontal and vertical rest poses
    Calibration,
    /// Known backward mounting: X' = -Z, Y' = Y, Z' = X
    FixedPermutation,
    /// Per-session axis map table
    AxisMapTable,
}

/// Sensor placement in the study
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorRole {
    /// Lower-back sensor near the centre of mass
    Pelvis,
    Shank(Side),
    /// Cane or walker sensor; not every participant has one
    AssistiveDevice,
}

impl SensorRole {
    /// Every role in processing order
    pub const ALL: [SensorRole; 4] = [
        SensorRole::Pelvis,
        SensorRole::Shank(Side::Left),
        SensorRole::Shank(Side::Right),
        SensorRole::AssistiveDevice,
    ];

    pub fn sensor_class(&self) -> SensorClass {
        match self {
            SensorRole::Pelvis => SensorClass::Torso,
            SensorRole::Shank(_) => SensorClass::Limb,
            SensorRole::AssistiveDevice => SensorClass::AssistiveDevice,
        }
    }

    pub fn orientation_strategy(&self) -> OrientationStrategy {
        match self {
            SensorRole::Pelvis => OrientationStrategy::FixedPermutation,
            SensorRole::Shank(_) => OrientationStrategy::Calibration,
            SensorRole::AssistiveDevice => OrientationStrategy::AxisMapTable,
        }
    }

    /// Missing recordings for optional roles are skipped, not fatal
    pub fn is_optional(&self) -> bool {
        matches!(self, SensorRole::AssistiveDevice)
    }

    /// Short label used in study file names
    pub fn file_stem(&self) -> &'static str {
        match self {
            SensorRole::Pelvis => "COM",
            SensorRole::Shank(Side::Left) => "LA",
            SensorRole::Shank(Side::Right) => "RA",
            SensorRole::AssistiveDevice => "DEV",
        }
    }
}

impl FromStr for SensorRole {
    type Err = GaitError;

    fn from_str(s: &str) -> GaitResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "COM" | "PELVIS" => Ok(SensorRole::Pelvis),
            "LA" | "LEFT_SHANK" => Ok(SensorRole::Shank(Side::Left)),
            "RA" | "RIGHT_SHANK" => Ok(SensorRole::Shank(Side::Right)),
            "DEV" | "DEVICE" | "ASSISTIVE_DEVICE" => Ok(SensorRole::AssistiveDevice),
            _ => Err(GaitError::InvalidConfiguration {
                reason: format!("unknown sensor role '{}'", s),
            }),
        }
    }
}

impl std::fmt::Display for SensorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorRole::Pelvis => write!(f, "Pelvis (COM)"),
            SensorRole::Shank(Side::Left) => write!(f, "Left shank (LA)"),
            SensorRole::Shank(Side::Right) => write!(f, "Right shank (RA)"),
            SensorRole::AssistiveDevice => write!(f, "Assistive device (DEV)"),
        }
    }
}
