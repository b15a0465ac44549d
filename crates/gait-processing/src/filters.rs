//! Digital filters for inertial gait signals
//!
//! Butterworth designs are built as cascades of second-order sections and
//! applied forward then backward, so the output carries no phase lag.

use crate::config::AcquisitionProfile;
use crate::processor::{ProcessingMetrics, StreamProcessor};
use gait_core::{config_error, Channel, GaitError, GaitResult, SensorClass, SensorStream};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Filter types supported by the filter stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterType {
    /// Butterworth lowpass filter
    ButterworthLowpass,
    /// Butterworth highpass filter
    ButterworthHighpass,
}

/// Filter configuration parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Filter type
    pub filter_type: FilterType,
    /// Filter order (even)
    pub order: usize,
    /// Cutoff frequency (Hz)
    pub cutoff_hz: f64,
}

impl FilterConfig {
    /// Create lowpass filter configuration
    pub fn lowpass(cutoff_hz: f64, order: usize) -> Self {
        Self {
            filter_type: FilterType::ButterworthLowpass,
            order,
            cutoff_hz,
        }
    }

    /// Create highpass filter configuration
    pub fn highpass(cutoff_hz: f64, order: usize) -> Self {
        Self {
            filter_type: FilterType::ButterworthHighpass,
            order,
            cutoff_hz,
        }
    }
}

/// Single biquad section (2nd order), transposed direct form II
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadSection {
    // y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2] - a1*y[n-1] - a2*y[n-2]
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl BiquadSection {
    /// Gain at 0 Hz
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// State that holds the output steady for a unit-step input
    fn step_state(&self) -> [f64; 2] {
        let gain = self.dc_gain();
        let z2 = self.b2 - self.a2 * gain;
        let z1 = self.b1 - self.a1 * gain + z2;
        [z1, z2]
    }

    #[inline]
    fn process_sample(&self, input: f64, state: &mut [f64; 2]) -> f64 {
        let output = self.b0 * input + state[0];
        state[0] = self.b1 * input - self.a1 * output + state[1];
        state[1] = self.b2 * input - self.a2 * output;
        output
    }

    fn response(&self, z_inv: Complex64) -> Complex64 {
        let z_inv2 = z_inv * z_inv;
        let num = self.b0 + z_inv * self.b1 + z_inv2 * self.b2;
        let den = 1.0 + z_inv * self.a1 + z_inv2 * self.a2;
        num / den
    }
}

/// Butterworth filter designed for a fixed sampling rate
#[derive(Debug, Clone)]
pub struct ButterworthFilter {
    config: FilterConfig,
    sampling_rate: f64,
    // Use biquad sections for stability
    sections: Vec<BiquadSection>,
}

impl ButterworthFilter {
    /// Design the filter via bilinear transform of the analog prototype.
    ///
    /// Cutoffs are pre-warped from absolute Hz, so the -3 dB point of a
    /// single pass sits exactly at `config.cutoff_hz`.
    pub fn new(config: FilterConfig, sampling_rate: f64) -> GaitResult<Self> {
        if config.order == 0 || config.order % 2 != 0 {
            return Err(config_error!(
                "Butterworth order must be even and positive, got {}",
                config.order
            ));
        }
        if !(sampling_rate > 0.0) {
            return Err(config_error!("sampling rate must be positive, got {}", sampling_rate));
        }
        let nyquist = sampling_rate / 2.0;
        if !(config.cutoff_hz > 0.0) || config.cutoff_hz >= nyquist {
            return Err(config_error!(
                "cutoff {} Hz must lie in (0, {}) Hz",
                config.cutoff_hz,
                nyquist
            ));
        }

        let k = (PI * config.cutoff_hz / sampling_rate).tan();
        let k2 = k * k;
        let order = config.order as f64;

        let sections = (0..config.order / 2)
            .map(|i| {
                // Upper-half-plane prototype pole; its conjugate shares the section
                let theta = PI * (2.0 * i as f64 + 1.0 + order) / (2.0 * order);
                let pole = Complex64::from_polar(1.0, theta);
                let damping = -2.0 * pole.re;

                let norm = 1.0 + damping * k + k2;
                let a1 = 2.0 * (k2 - 1.0) / norm;
                let a2 = (1.0 - damping * k + k2) / norm;

                match config.filter_type {
                    FilterType::ButterworthLowpass => BiquadSection {
                        b0: k2 / norm,
                        b1: 2.0 * k2 / norm,
                        b2: k2 / norm,
                        a1,
                        a2,
                    },
                    FilterType::ButterworthHighpass => BiquadSection {
                        b0: 1.0 / norm,
                        b1: -2.0 / norm,
                        b2: 1.0 / norm,
                        a1,
                        a2,
                    },
                }
            })
            .collect();

        Ok(ButterworthFilter {
            config,
            sampling_rate,
            sections,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn sections(&self) -> &[BiquadSection] {
        &self.sections
    }

    /// Edge padding used by `filtfilt`
    pub fn pad_len(&self) -> usize {
        3 * (2 * self.sections.len() + 1)
    }

    /// Single-pass magnitude response at `freq_hz`
    pub fn magnitude_at(&self, freq_hz: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / self.sampling_rate;
        let z_inv = Complex64::from_polar(1.0, -omega);
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, s| acc * s.response(z_inv))
            .norm()
    }

    /// Causal single pass from rest
    pub fn filter(&self, signal: &[f64]) -> Vec<f64> {
        let mut states = vec![[0.0; 2]; self.sections.len()];
        self.run(signal, &mut states)
    }

    /// Zero-phase forward-backward filtering.
    ///
    /// The signal is extended at both ends by odd reflection and each pass
    /// starts from the steady state for its first sample, which keeps edge
    /// transients out of the returned range.
    pub fn filtfilt(&self, signal: &[f64]) -> GaitResult<Vec<f64>> {
        let pad = self.pad_len();
        let n = signal.len();
        if n <= pad {
            return Err(GaitError::InsufficientSamples {
                required: pad,
                available: n,
            });
        }

        let first = signal[0];
        let last = signal[n - 1];
        let mut extended = Vec::with_capacity(n + 2 * pad);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
        extended.extend_from_slice(signal);
        extended.extend((1..=pad).map(|i| 2.0 * last - signal[n - 1 - i]));

        let step = self.step_states();

        let mut states = Self::scaled(&step, extended[0]);
        let forward = self.run(&extended, &mut states);

        let reversed: Vec<f64> = forward.into_iter().rev().collect();
        let mut states = Self::scaled(&step, reversed[0]);
        let mut backward = self.run(&reversed, &mut states);
        backward.reverse();

        Ok(backward[pad..pad + n].to_vec())
    }

    /// Per-section step states, each scaled by the DC gain of the sections before it
    fn step_states(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|s| {
                let [z1, z2] = s.step_state();
                let state = [z1 * scale, z2 * scale];
                scale *= s.dc_gain();
                state
            })
            .collect()
    }

    fn scaled(step: &[[f64; 2]], x0: f64) -> Vec<[f64; 2]> {
        step.iter().map(|[z1, z2]| [z1 * x0, z2 * x0]).collect()
    }

    fn run(&self, signal: &[f64], states: &mut [[f64; 2]]) -> Vec<f64> {
        signal
            .iter()
            .map(|&x| {
                self.sections
                    .iter()
                    .zip(states.iter_mut())
                    .fold(x, |sample, (section, state)| section.process_sample(sample, state))
            })
            .collect()
    }
}

/// Per-channel filter cascade selected by sensor class.
///
/// Accelerometer: zero-phase highpass then zero-phase lowpass (class cutoff).
/// Gyroscope: zero-phase lowpass, same for every class.
#[derive(Debug, Clone)]
pub struct SignalFilterStage {
    accel_highpass: ButterworthFilter,
    accel_lowpass_torso: ButterworthFilter,
    accel_lowpass_limb: ButterworthFilter,
    accel_lowpass_device: ButterworthFilter,
    gyro_lowpass: ButterworthFilter,
}

impl SignalFilterStage {
    pub fn new(profile: &AcquisitionProfile) -> GaitResult<Self> {
        profile.validate()?;
        let fs = profile.sample_rate_hz;
        let order = profile.filter_order;
        let lowpass = |class: SensorClass| {
            ButterworthFilter::new(
                FilterConfig::lowpass(profile.accel_lowpass_hz.for_class(class), order),
                fs,
            )
        };

        Ok(SignalFilterStage {
            accel_highpass: ButterworthFilter::new(
                FilterConfig::highpass(profile.accel_highpass_hz, order),
                fs,
            )?,
            accel_lowpass_torso: lowpass(SensorClass::Torso)?,
            accel_lowpass_limb: lowpass(SensorClass::Limb)?,
            accel_lowpass_device: lowpass(SensorClass::AssistiveDevice)?,
            gyro_lowpass: ButterworthFilter::new(
                FilterConfig::lowpass(profile.gyro_lowpass_hz, order),
                fs,
            )?,
        })
    }

    fn accel_lowpass(&self, class: SensorClass) -> &ButterworthFilter {
        match class {
            SensorClass::Torso => &self.accel_lowpass_torso,
            SensorClass::Limb => &self.accel_lowpass_limb,
            SensorClass::AssistiveDevice => &self.accel_lowpass_device,
        }
    }

    /// Filter all six channels; timestamps and header pass through unchanged
    pub fn filter(&self, stream: &SensorStream, class: SensorClass) -> GaitResult<SensorStream> {
        let mut timer = ProcessingMetrics::start_timing();
        let lowpass = self.accel_lowpass(class);

        let mut channels = stream.all_channels();
        for channel in Channel::ALL {
            let data = &channels[channel.index()];
            let filtered = if channel.is_accel() {
                lowpass.filtfilt(&self.accel_highpass.filtfilt(data)?)?
            } else {
                self.gyro_lowpass.filtfilt(data)?
            };
            channels[channel.index()] = filtered;
        }

        let filtered = stream.with_channels(&channels)?;
        timer.set_samples(stream.len());
        let metrics = timer.finish();
        debug!(
            class = %class,
            samples = metrics.samples,
            elapsed_us = metrics.processing_time_us,
            accel_lowpass_hz = lowpass.config().cutoff_hz,
            "filtered stream"
        );
        Ok(filtered)
    }

    /// Filter with a class given by name, as read from a profile or command line
    pub fn filter_named(&self, stream: &SensorStream, class_name: &str) -> GaitResult<SensorStream> {
        let class: SensorClass = class_name.parse()?;
        self.filter(stream, class)
    }

    /// Bind the stage to one class for use in a processing chain
    pub fn for_class(&self, class: SensorClass) -> ClassFilter<'_> {
        ClassFilter { stage: self, class }
    }
}

/// `SignalFilterStage` fixed to one sensor class
pub struct ClassFilter<'a> {
    stage: &'a SignalFilterStage,
    class: SensorClass,
}

impl StreamProcessor for ClassFilter<'_> {
    fn process(&self, input: &SensorStream) -> GaitResult<SensorStream> {
        self.stage.filter(input, self.class)
    }

    fn name(&self) -> &str {
        "Butterworth zero-phase filter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use gait_core::ImuSample;

    const FS: f64 = 51.2;

    fn sine(freq: f64, seconds: f64, offset: f64) -> Vec<f64> {
        let n = (seconds * FS) as usize;
        (0..n)
            .map(|i| offset + (2.0 * PI * freq * i as f64 / FS).sin())
            .collect()
    }

    fn zero_crossings(signal: &[f64]) -> Vec<usize> {
        signal
            .windows(2)
            .enumerate()
            .filter(|(_, w)| w[0] < 0.0 && w[1] >= 0.0)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_minus_3db_at_cutoff() {
        for config in [FilterConfig::lowpass(3.0, 4), FilterConfig::highpass(0.1, 4)] {
            let filter = ButterworthFilter::new(config, FS).unwrap();
            assert_relative_eq!(
                filter.magnitude_at(config.cutoff_hz),
                std::f64::consts::FRAC_1_SQRT_2,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn test_passband_and_stopband_gain() {
        let lowpass = ButterworthFilter::new(FilterConfig::lowpass(4.0, 4), FS).unwrap();
        assert_relative_eq!(lowpass.magnitude_at(0.0), 1.0, epsilon = 1e-12);
        assert!(lowpass.magnitude_at(12.0) < 0.02);

        let highpass = ButterworthFilter::new(FilterConfig::highpass(0.1, 4), FS).unwrap();
        assert!(highpass.magnitude_at(0.0) < 1e-12);
        assert_relative_eq!(highpass.magnitude_at(FS / 2.0), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fourth_order_has_two_sections() {
        let filter = ButterworthFilter::new(FilterConfig::lowpass(10.0, 4), FS).unwrap();
        assert_eq!(filter.sections().len(), 2);
        assert_eq!(filter.pad_len(), 15);
    }

    #[test]
    fn test_rejects_bad_design() {
        assert!(ButterworthFilter::new(FilterConfig::lowpass(30.0, 4), FS).is_err());
        assert!(ButterworthFilter::new(FilterConfig::lowpass(3.0, 3), FS).is_err());
        assert!(ButterworthFilter::new(FilterConfig::highpass(0.0, 4), FS).is_err());
    }

    #[test]
    fn test_filtfilt_is_phase_neutral() {
        let filter = ButterworthFilter::new(FilterConfig::lowpass(4.0, 4), FS).unwrap();
        let signal = sine(1.0, 20.0, 0.0);
        let filtered = filter.filtfilt(&signal).unwrap();
        assert_eq!(filtered.len(), signal.len());

        let interior = 100..signal.len() - 100;
        let original = zero_crossings(&signal[interior.clone()]);
        let shifted = zero_crossings(&filtered[interior.clone()]);
        assert_eq!(original.len(), shifted.len());
        for (a, b) in original.iter().zip(&shifted) {
            assert!(a.abs_diff(*b) <= 1, "crossing moved from {} to {}", a, b);
        }

        // Away from the edges the passband tone comes through untouched
        for i in 100..signal.len() - 100 {
            assert_abs_diff_eq!(filtered[i], signal[i], epsilon = 1e-3);
        }
    }

    #[test]
    fn test_single_pass_lags() {
        let filter = ButterworthFilter::new(FilterConfig::lowpass(4.0, 4), FS).unwrap();
        let signal = sine(1.0, 20.0, 0.0);
        let causal = filter.filter(&signal);
        let max_err = (100..signal.len() - 100)
            .map(|i| (causal[i] - signal[i]).abs())
            .fold(0.0, f64::max);
        assert!(max_err > 0.1);
    }

    #[test]
    fn test_highpass_removes_constant_offset() {
        let filter = ButterworthFilter::new(FilterConfig::highpass(0.1, 4), FS).unwrap();
        let constant = vec![9.81; 500];
        let filtered = filter.filtfilt(&constant).unwrap();
        for value in filtered {
            assert_abs_diff_eq!(value, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_lowpass_preserves_constant() {
        let filter = ButterworthFilter::new(FilterConfig::lowpass(3.0, 4), FS).unwrap();
        let filtered = filter.filtfilt(&vec![-2.5; 100]).unwrap();
        for value in filtered {
            assert_abs_diff_eq!(value, -2.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_filtfilt_too_short() {
        let filter = ButterworthFilter::new(FilterConfig::lowpass(3.0, 4), FS).unwrap();
        assert_eq!(
            filter.filtfilt(&[0.0; 15]),
            Err(GaitError::InsufficientSamples {
                required: 15,
                available: 15
            })
        );
        assert!(filter.filtfilt(&[0.0; 16]).is_ok());
    }

    fn stream_from(accel: &[f64], gyro: &[f64]) -> SensorStream {
        let samples = accel
            .iter()
            .zip(gyro)
            .enumerate()
            .map(|(i, (&a, &g))| {
                ImuSample::new(i as f64 * 1000.0 / FS, [a, a, a], [g, g, g])
            })
            .collect();
        SensorStream::new(samples, Vec::new()).unwrap()
    }

    #[test]
    fn test_stage_removes_gravity_and_noise() {
        let stage = SignalFilterStage::new(&AcquisitionProfile::default()).unwrap();

        // 1 Hz gait-like tone on gravity, plus 20 Hz vibration
        let accel: Vec<f64> = sine(1.0, 60.0, 9.8)
            .iter()
            .zip(sine(20.0, 60.0, 0.0))
            .map(|(a, b)| a + 0.5 * b)
            .collect();
        let gyro = sine(1.0, 60.0, 0.0);
        let stream = stream_from(&accel, &gyro);

        let filtered = stage.filter(&stream, SensorClass::Limb).unwrap();
        assert_eq!(filtered.timestamps(), stream.timestamps());

        let ax = filtered.channel_data(Channel::AccelX);
        let clean = sine(1.0, 60.0, 0.0);
        let mid = ax.len() / 2;
        for i in mid - 500..mid + 500 {
            assert_abs_diff_eq!(ax[i], clean[i], epsilon = 0.02);
        }

        let gz = filtered.channel_data(Channel::GyroZ);
        for i in mid - 500..mid + 500 {
            assert_abs_diff_eq!(gz[i], gyro[i], epsilon = 1e-3);
        }
    }

    #[test]
    fn test_torso_cutoff_lower_than_limb() {
        let stage = SignalFilterStage::new(&AcquisitionProfile::default()).unwrap();
        let accel = sine(6.0, 30.0, 0.0);
        let stream = stream_from(&accel, &accel);

        let torso = stage.filter(&stream, SensorClass::Torso).unwrap();
        let limb = stage.filter(&stream, SensorClass::Limb).unwrap();

        let rms = |s: &SensorStream| s.channel_stats(Channel::AccelY).rms;
        assert!(rms(&torso) < 0.1);
        assert!(rms(&limb) > 0.6);
    }

    #[test]
    fn test_filter_named_rejects_unknown_class() {
        let stage = SignalFilterStage::new(&AcquisitionProfile::default()).unwrap();
        let accel = sine(1.0, 2.0, 0.0);
        let stream = stream_from(&accel, &accel);
        assert_eq!(
            stage.filter_named(&stream, "wrist"),
            Err(GaitError::InvalidSensorClass { name: "wrist".into() })
        );
        assert!(stage.filter_named(&stream, "torso").is_ok());
    }

    #[test]
    fn test_filtering_is_deterministic() {
        let stage = SignalFilterStage::new(&AcquisitionProfile::default()).unwrap();
        let accel = sine(2.0, 10.0, 3.0);
        let stream = stream_from(&accel, &accel);
        let a = stage.for_class(SensorClass::Torso).process(&stream).unwrap();
        let b = stage.filter(&stream, SensorClass::Torso).unwrap();
        assert_eq!(a, b);
    }
}
