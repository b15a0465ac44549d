//! Acquisition profile: sampling rate, filter cutoffs and trial offset

use gait_core::{config_error, GaitError, GaitResult, SensorClass};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Accelerometer lowpass cutoffs per sensor class (Hz)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowpassCutoffs {
    pub torso: f64,
    pub limb: f64,
    pub assistive_device: f64,
}

impl LowpassCutoffs {
    pub fn for_class(&self, class: SensorClass) -> f64 {
        match class {
            SensorClass::Torso => self.torso,
            SensorClass::Limb => self.limb,
            SensorClass::AssistiveDevice => self.assistive_device,
        }
    }

    fn all(&self) -> [(SensorClass, f64); 3] {
        [
            (SensorClass::Torso, self.torso),
            (SensorClass::Limb, self.limb),
            (SensorClass::AssistiveDevice, self.assistive_device),
        ]
    }
}

impl Default for LowpassCutoffs {
    fn default() -> Self {
        Self {
            torso: 3.0,
            limb: 10.0,
            assistive_device: 10.0,
        }
    }
}

/// Everything that ties the engine to a particular sensor and study.
///
/// Cutoffs are stored in absolute Hz and converted against
/// `sample_rate_hz` when filters are designed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionProfile {
    /// Profile name for logs and notes
    pub name: String,
    /// Nominal sampling rate of every sensor (Hz)
    pub sample_rate_hz: f64,
    /// Butterworth order of each filter stage
    pub filter_order: usize,
    /// Accelerometer drift/gravity highpass (Hz)
    pub accel_highpass_hz: f64,
    /// Accelerometer lowpass per sensor class (Hz)
    pub accel_lowpass_hz: LowpassCutoffs,
    /// Gyroscope lowpass, all classes (Hz)
    pub gyro_lowpass_hz: f64,
    /// Trial boundary tolerance in timestamp units.
    ///
    /// Added to the reference trial-2 end before snapping and subtracted
    /// from dependent-sensor starts.
    pub trial_offset: f64,
    /// Gravity magnitude expected in calibration windows (m/s^2)
    pub expected_gravity: f64,
    /// Deviation from `expected_gravity` that triggers a warning
    pub gravity_tolerance: f64,
}

impl Default for AcquisitionProfile {
    fn default() -> Self {
        Self::shimmer_51hz()
    }
}

impl AcquisitionProfile {
    /// Wearable IMUs sampling at 51.2 Hz with millisecond timestamps
    pub fn shimmer_51hz() -> Self {
        AcquisitionProfile {
            name: "Shimmer 51.2 Hz".to_string(),
            sample_rate_hz: 51.2,
            filter_order: 4,
            accel_highpass_hz: 0.1,
            accel_lowpass_hz: LowpassCutoffs::default(),
            gyro_lowpass_hz: 4.0,
            trial_offset: 500.0,
            expected_gravity: 9.8,
            gravity_tolerance: 1.0,
        }
    }

    pub fn nyquist_hz(&self) -> f64 {
        self.sample_rate_hz / 2.0
    }

    /// Validate entire profile
    pub fn validate(&self) -> GaitResult<()> {
        if !(self.sample_rate_hz > 0.0) {
            return Err(config_error!(
                "sample rate must be positive, got {}",
                self.sample_rate_hz
            ));
        }

        if self.filter_order == 0 || self.filter_order % 2 != 0 {
            return Err(config_error!(
                "filter order must be a positive even number, got {}",
                self.filter_order
            ));
        }

        let nyquist = self.nyquist_hz();
        let check_cutoff = |label: &str, hz: f64| -> GaitResult<()> {
            if !(hz > 0.0) || hz >= nyquist {
                return Err(config_error!(
                    "{} cutoff {} Hz must lie in (0, {}) Hz",
                    label,
                    hz,
                    nyquist
                ));
            }
            Ok(())
        };

        check_cutoff("accelerometer highpass", self.accel_highpass_hz)?;
        check_cutoff("gyroscope lowpass", self.gyro_lowpass_hz)?;
        for (class, hz) in self.accel_lowpass_hz.all() {
            check_cutoff(&format!("{} accelerometer lowpass", class), hz)?;
            if hz <= self.accel_highpass_hz {
                return Err(config_error!(
                    "{} lowpass {} Hz must exceed highpass {} Hz",
                    class,
                    hz,
                    self.accel_highpass_hz
                ));
            }
        }

        if !(self.trial_offset >= 0.0) {
            return Err(config_error!(
                "trial offset must be non-negative, got {}",
                self.trial_offset
            ));
        }

        if !(self.gravity_tolerance >= 0.0) {
            return Err(config_error!("gravity tolerance must be non-negative"));
        }

        Ok(())
    }

    /// Export profile to JSON
    pub fn to_json(&self) -> GaitResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| config_error!("failed to serialize profile: {}", e))
    }

    /// Import profile from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> GaitResult<Self> {
        let profile: AcquisitionProfile = serde_json::from_str(json)
            .map_err(|e| config_error!("failed to deserialize profile: {}", e))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load and validate a profile file
    pub fn load(path: &Path) -> GaitResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| GaitError::io(path.display().to_string(), e))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_profile() {
        let profile = AcquisitionProfile::default();
        assert!(profile.validate().is_ok());
        assert_relative_eq!(profile.nyquist_hz(), 25.6);
        assert_eq!(profile.accel_lowpass_hz.for_class(SensorClass::Torso), 3.0);
        assert_eq!(profile.accel_lowpass_hz.for_class(SensorClass::Limb), 10.0);
        assert_eq!(profile.accel_lowpass_hz.for_class(SensorClass::AssistiveDevice), 10.0);
        assert_eq!(profile.trial_offset, 500.0);
    }

    #[test]
    fn test_profile_validation() {
        let mut profile = AcquisitionProfile::default();

        profile.gyro_lowpass_hz = 30.0;
        assert!(profile.validate().is_err());

        profile = AcquisitionProfile::default();
        profile.filter_order = 3;
        assert!(profile.validate().is_err());

        profile = AcquisitionProfile::default();
        profile.accel_lowpass_hz.torso = 0.05;
        assert!(profile.validate().is_err());

        profile = AcquisitionProfile::default();
        profile.sample_rate_hz = 0.0;
        assert!(profile.validate().is_err());

        profile = AcquisitionProfile::default();
        profile.trial_offset = -1.0;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_json_serialization() {
        let profile = AcquisitionProfile::default();
        let json = profile.to_json().unwrap();
        assert!(json.contains("sample_rate_hz"));

        let restored = AcquisitionProfile::from_json(&json).unwrap();
        assert_eq!(restored, profile);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let profile = AcquisitionProfile::from_json(r#"{ "sample_rate_hz": 102.4 }"#).unwrap();
        assert_eq!(profile.sample_rate_hz, 102.4);
        assert_eq!(profile.gyro_lowpass_hz, 4.0);
    }

    #[test]
    fn test_invalid_json_rejected() {
        assert!(AcquisitionProfile::from_json(r#"{ "gyro_lowpass_hz": 40.0 }"#).is_err());
        assert!(AcquisitionProfile::from_json("not json").is_err());
    }
}
