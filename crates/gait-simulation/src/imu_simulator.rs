//! IMU session simulator: calibration poses, two walking trials, one stream per sensor

use crate::motion_patterns::{MotionPattern, GRAVITY};
use gait_core::{
    config_error, Axis, AxisMap, AxisMapEntry, CalibrationWindows, GaitResult, ImuSample,
    SensorRole, SensorStream, TimeWindow, TrialWindows,
};
use nalgebra::{Matrix3, Rotation3};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Shortest session that fits calibration plus two usable trials (s)
pub const MIN_SESSION_SECONDS: f64 = 48.0;

/// Noise configuration for sensor readings and clocks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Accelerometer white noise standard deviation (m/s^2)
    pub accel_std: f64,
    /// Gyroscope white noise standard deviation (deg/s)
    pub gyro_std: f64,
    /// Per-sample timestamp jitter standard deviation (ms)
    pub clock_jitter_ms: f64,
    /// Largest start offset of a sensor clock relative to the session (ms)
    pub max_clock_offset_ms: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            accel_std: 0.05,
            gyro_std: 0.5,
            clock_jitter_ms: 0.3,
            max_clock_offset_ms: 40.0,
        }
    }
}

/// Configuration for a simulated recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sampling rate in Hz, shared by all sensors
    pub sample_rate_hz: f64,
    /// Session length in seconds
    pub duration_s: f64,
    /// Record the optional assistive-device sensor
    pub include_device: bool,
    /// Mount shanks at a random orientation instead of aligned with the body
    pub random_mounting: bool,
    pub noise: NoiseConfig,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 51.2,
            duration_s: 100.0,
            include_device: true,
            random_mounting: true,
            noise: NoiseConfig::default(),
            seed: None,
        }
    }
}

/// Phase timeline of a session, in seconds on the session clock.
///
/// Calibration and trial windows are also exposed in milliseconds, the unit
/// sensor timestamps are recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionScript {
    pub duration_s: f64,
    pub calibration: CalibrationWindows,
    pub trials: TrialWindows,
}

const HORIZONTAL_S: (f64, f64) = (2.0, 8.0);
const VERTICAL_S: (f64, f64) = (10.0, 16.0);
const FIRST_TRIAL_START_S: f64 = 20.0;
const TRIAL_GAP_S: f64 = 5.0;
const TAIL_S: f64 = 3.0;

impl SessionScript {
    pub fn for_duration(duration_s: f64) -> GaitResult<Self> {
        if !(duration_s >= MIN_SESSION_SECONDS) {
            return Err(config_error!(
                "session must last at least {} s, got {}",
                MIN_SESSION_SECONDS,
                duration_s
            ));
        }

        let trial_s = (duration_s - FIRST_TRIAL_START_S - TRIAL_GAP_S - TAIL_S) / 2.0;
        let first_end = FIRST_TRIAL_START_S + trial_s;
        let second_start = first_end + TRIAL_GAP_S;
        let ms = |a: f64, b: f64| TimeWindow::new(a * 1000.0, b * 1000.0);

        Ok(SessionScript {
            duration_s,
            calibration: CalibrationWindows {
                horizontal: ms(HORIZONTAL_S.0, HORIZONTAL_S.1)?,
                vertical: ms(VERTICAL_S.0, VERTICAL_S.1)?,
            },
            trials: TrialWindows {
                first: ms(FIRST_TRIAL_START_S, first_end)?,
                second: ms(second_start, second_start + trial_s)?,
            },
        })
    }

    /// Motion pattern active at session time `t` (s) and the time into it
    pub fn pattern_at(&self, role: SensorRole, walking: MotionPattern, t: f64) -> (MotionPattern, f64) {
        let t_ms = t * 1000.0;
        if self.trials.first.contains(t_ms) {
            return (walking, t - self.trials.first.start / 1000.0);
        }
        if self.trials.second.contains(t_ms) {
            return (walking, t - self.trials.second.start / 1000.0);
        }

        // Only limbs take the horizontal calibration pose
        if role.orientation_strategy() != gait_core::OrientationStrategy::Calibration {
            return (MotionPattern::upright(), 0.0);
        }

        let horizontal = [-GRAVITY, 0.0, 0.0];
        let upright = [0.0, GRAVITY, 0.0];
        match t {
            t if t < 1.0 => (MotionPattern::upright(), 0.0),
            t if t < HORIZONTAL_S.0 => (
                MotionPattern::Transition { from: upright, to: horizontal, duration: 1.0 },
                t - 1.0,
            ),
            t if t <= HORIZONTAL_S.1 => (MotionPattern::limb_horizontal(), 0.0),
            t if t < VERTICAL_S.0 => (
                MotionPattern::Transition { from: horizontal, to: upright, duration: VERTICAL_S.0 - HORIZONTAL_S.1 },
                t - HORIZONTAL_S.1,
            ),
            _ => (MotionPattern::upright(), 0.0),
        }
    }
}

/// One simulated sensor with the ground truth of its mounting
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    pub role: SensorRole,
    pub stream: SensorStream,
    /// Maps body-frame vectors to the sensor's local frame
    pub mounting: Matrix3<f64>,
    /// Axis map describing the mounting, for table-driven roles
    pub axis_map: Option<AxisMap>,
}

/// A complete synthetic session
#[derive(Debug, Clone)]
pub struct SimulatedSession {
    pub sensors: Vec<SimulatedSensor>,
    pub script: SessionScript,
}

impl SimulatedSession {
    pub fn sensor(&self, role: SensorRole) -> Option<&SimulatedSensor> {
        self.sensors.iter().find(|s| s.role == role)
    }
}

/// Four-line file header: device name, signal name, calibration state, units
pub fn header_for(role: SensorRole) -> Vec<String> {
    let device = format!("Shimmer_{}", role.file_stem());
    vec![
        vec![device.as_str(); 7].join(","),
        "Timestamp,Accel_X,Accel_Y,Accel_Z,Gyro_X,Gyro_Y,Gyro_Z".to_string(),
        vec!["CAL"; 7].join(","),
        "mSecs,m/(sec^2),m/(sec^2),m/(sec^2),deg/sec,deg/sec,deg/sec".to_string(),
    ]
}

/// Pelvis sensor worn backwards; inverse of the body-frame permutation
#[rustfmt::skip]
fn pelvis_mounting() -> Matrix3<f64> {
    Matrix3::new(
         0.0, 0.0, 1.0,
         0.0, 1.0, 0.0,
        -1.0, 0.0, 0.0,
    )
}

/// IMU session simulator
pub struct ImuSimulator {
    config: SessionConfig,
    rng: rand::rngs::StdRng,
    accel_noise: Normal<f64>,
    gyro_noise: Normal<f64>,
    jitter: Normal<f64>,
}

impl ImuSimulator {
    /// Create new simulator with configuration
    pub fn new(config: SessionConfig) -> GaitResult<Self> {
        if !(config.sample_rate_hz > 0.0) {
            return Err(config_error!("sample rate must be positive, got {}", config.sample_rate_hz));
        }
        SessionScript::for_duration(config.duration_s)?;

        let seed = config.seed.unwrap_or_else(rand::random);
        let rng = rand::rngs::StdRng::seed_from_u64(seed);

        let normal = |std: f64, what: &str| {
            Normal::new(0.0, std)
                .map_err(|e| config_error!("failed to create {} distribution: {}", what, e))
        };
        let accel_noise = normal(config.noise.accel_std, "accelerometer noise")?;
        let gyro_noise = normal(config.noise.gyro_std, "gyroscope noise")?;
        let jitter = normal(config.noise.clock_jitter_ms, "clock jitter")?;

        Ok(ImuSimulator {
            config,
            rng,
            accel_noise,
            gyro_noise,
            jitter,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Generate every sensor of a session
    pub fn generate_session(&mut self) -> GaitResult<SimulatedSession> {
        let script = SessionScript::for_duration(self.config.duration_s)?;
        let mut sensors = Vec::with_capacity(SensorRole::ALL.len());

        for role in SensorRole::ALL {
            if role.is_optional() && !self.config.include_device {
                continue;
            }
            sensors.push(self.generate_sensor(role, &script)?);
        }

        Ok(SimulatedSession { sensors, script })
    }

    /// Generate one sensor's recording on its own clock
    pub fn generate_sensor(&mut self, role: SensorRole, script: &SessionScript) -> GaitResult<SimulatedSensor> {
        let (mounting, axis_map) = match role {
            SensorRole::Pelvis => (pelvis_mounting(), None),
            SensorRole::Shank(_) if self.config.random_mounting => (self.random_rotation(), None),
            SensorRole::Shank(_) => (Matrix3::identity(), None),
            SensorRole::AssistiveDevice => {
                let map = self.random_axis_map()?;
                (signed_permutation(&map).transpose(), Some(map))
            }
        };

        let walking = walking_pattern(role);
        let fs = self.config.sample_rate_hz;
        let step_ms = 1000.0 / fs;
        let max_jitter = step_ms / 4.0;
        let clock_offset = self.rng.gen_range(0.0..=self.config.noise.max_clock_offset_ms);
        let count = (script.duration_s * fs) as usize;

        let mut samples = Vec::with_capacity(count);
        for i in 0..count {
            let t = i as f64 / fs;
            let (pattern, elapsed) = script.pattern_at(role, walking, t);
            let (accel_body, gyro_body) = pattern.body_sample(elapsed);

            let accel = mounting * accel_body;
            let gyro = mounting * gyro_body;
            let jitter = self.jitter.sample(&mut self.rng).clamp(-max_jitter, max_jitter);
            let timestamp = clock_offset + i as f64 * step_ms + jitter;

            samples.push(ImuSample::new(
                timestamp,
                [
                    accel.x + self.accel_noise.sample(&mut self.rng),
                    accel.y + self.accel_noise.sample(&mut self.rng),
                    accel.z + self.accel_noise.sample(&mut self.rng),
                ],
                [
                    gyro.x + self.gyro_noise.sample(&mut self.rng),
                    gyro.y + self.gyro_noise.sample(&mut self.rng),
                    gyro.z + self.gyro_noise.sample(&mut self.rng),
                ],
            ));
        }

        Ok(SimulatedSensor {
            role,
            stream: SensorStream::new(samples, header_for(role))?,
            mounting,
            axis_map,
        })
    }

    fn random_rotation(&mut self) -> Matrix3<f64> {
        let roll = self.rng.gen_range(-PI..PI);
        let pitch = self.rng.gen_range(-PI / 2.0..PI / 2.0);
        let yaw = self.rng.gen_range(-PI..PI);
        Rotation3::from_euler_angles(roll, pitch, yaw).into_inner()
    }

    fn random_axis_map(&mut self) -> GaitResult<AxisMap> {
        let mut sources = Axis::ALL;
        sources.shuffle(&mut self.rng);

        let entries: Vec<AxisMapEntry> = Axis::ALL
            .iter()
            .zip(sources)
            .map(|(&target, source)| AxisMapEntry {
                target,
                source,
                sign: if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 },
            })
            .collect();

        AxisMap::new(&entries)
    }
}

fn walking_pattern(role: SensorRole) -> MotionPattern {
    let (accel_amplitude, gyro_amplitude) = match role {
        SensorRole::Pelvis => (1.5, 15.0),
        SensorRole::Shank(_) => (6.0, 250.0),
        SensorRole::AssistiveDevice => (3.0, 60.0),
    };
    MotionPattern::Walking {
        cadence_hz: 0.9,
        accel_amplitude,
        gyro_amplitude,
    }
}

/// Matrix taking local vectors to body vectors for an axis map
fn signed_permutation(map: &AxisMap) -> Matrix3<f64> {
    let mut matrix = Matrix3::zeros();
    for entry in map.entries() {
        matrix[(entry.target.index(), entry.source.index())] = entry.sign;
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use gait_core::{ChannelStats, Side};
    use nalgebra::Vector3;

    fn seeded(seed: u64) -> SessionConfig {
        SessionConfig {
            seed: Some(seed),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_session_basic() {
        let mut simulator = ImuSimulator::new(seeded(7)).unwrap();
        let session = simulator.generate_session().unwrap();

        assert_eq!(session.sensors.len(), 4);
        for sensor in &session.sensors {
            assert_eq!(sensor.stream.len(), 5120);
            assert_eq!(sensor.stream.header().len(), 4);
            let interval = sensor.stream.median_interval().unwrap();
            assert!((interval - 19.53125).abs() < 1.0);
        }
        assert!(session.sensor(SensorRole::AssistiveDevice).unwrap().axis_map.is_some());
    }

    #[test]
    fn test_without_device() {
        let config = SessionConfig {
            include_device: false,
            ..seeded(1)
        };
        let session = ImuSimulator::new(config).unwrap().generate_session().unwrap();
        assert_eq!(session.sensors.len(), 3);
        assert!(session.sensor(SensorRole::AssistiveDevice).is_none());
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = ImuSimulator::new(seeded(42)).unwrap().generate_session().unwrap();
        let b = ImuSimulator::new(seeded(42)).unwrap().generate_session().unwrap();
        let c = ImuSimulator::new(seeded(43)).unwrap().generate_session().unwrap();

        let role = SensorRole::Shank(Side::Left);
        assert_eq!(a.sensor(role).unwrap().stream, b.sensor(role).unwrap().stream);
        assert_ne!(a.sensor(role).unwrap().stream, c.sensor(role).unwrap().stream);
    }

    #[test]
    fn test_clocks_are_independent() {
        let session = ImuSimulator::new(seeded(3)).unwrap().generate_session().unwrap();
        let left = session.sensor(SensorRole::Shank(Side::Left)).unwrap().stream.timestamps();
        let right = session.sensor(SensorRole::Shank(Side::Right)).unwrap().stream.timestamps();
        assert_ne!(left, right);
    }

    #[test]
    fn test_calibration_poses_read_gravity() {
        let session = ImuSimulator::new(seeded(11)).unwrap().generate_session().unwrap();
        let shank = session.sensor(SensorRole::Shank(Side::Right)).unwrap();

        // Stay clear of clock offsets at the window edges
        let inset = |w: &TimeWindow| TimeWindow::new(w.start + 200.0, w.end - 200.0).unwrap();
        let horizontal = shank.stream.slice(&inset(&session.script.calibration.horizontal)).unwrap();
        let vertical = shank.stream.slice(&inset(&session.script.calibration.vertical)).unwrap();

        let h = horizontal.accel_mean().unwrap();
        let v = vertical.accel_mean().unwrap();
        assert_abs_diff_eq!(h.norm(), GRAVITY, epsilon = 0.05);
        assert_abs_diff_eq!(v.norm(), GRAVITY, epsilon = 0.05);

        // Local readings are the mounted body-frame poses
        let expected_v = shank.mounting * Vector3::new(0.0, GRAVITY, 0.0);
        assert_abs_diff_eq!(v, expected_v, epsilon = 0.05);
        let expected_h = shank.mounting * Vector3::new(-GRAVITY, 0.0, 0.0);
        assert_abs_diff_eq!(h, expected_h, epsilon = 0.05);
    }

    #[test]
    fn test_mountings_are_orthonormal() {
        let session = ImuSimulator::new(seeded(5)).unwrap().generate_session().unwrap();
        for sensor in &session.sensors {
            let m = sensor.mounting;
            assert_abs_diff_eq!(m.transpose() * m, Matrix3::identity(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_device_axis_map_matches_mounting() {
        let session = ImuSimulator::new(seeded(9)).unwrap().generate_session().unwrap();
        let device = session.sensor(SensorRole::AssistiveDevice).unwrap();
        let map = device.axis_map.as_ref().unwrap();
        assert_eq!(signed_permutation(map) * device.mounting, Matrix3::identity());
    }

    #[test]
    fn test_walking_trials_carry_motion() {
        let session = ImuSimulator::new(seeded(2)).unwrap().generate_session().unwrap();
        let shank = session.sensor(SensorRole::Shank(Side::Left)).unwrap();
        let trial = shank.stream.slice(&session.script.trials.first).unwrap();
        let rest = shank.stream.slice(&session.script.calibration.vertical).unwrap();

        let energy = |s: &SensorStream| -> f64 {
            gait_core::Channel::ALL[3..]
                .iter()
                .map(|&c| ChannelStats::calculate(&s.channel_data(c)).std_dev)
                .sum()
        };
        assert!(energy(&trial) > 10.0 * energy(&rest));
    }

    #[test]
    fn test_script_rejects_short_sessions() {
        assert!(SessionScript::for_duration(30.0).is_err());
        let script = SessionScript::for_duration(100.0).unwrap();
        assert_eq!(script.trials.first.start, 20_000.0);
        assert_eq!(script.trials.second.end, 97_000.0);
        assert!(ImuSimulator::new(SessionConfig { duration_s: 10.0, ..seeded(1) }).is_err());
    }

    #[test]
    fn test_header_layout() {
        let header = header_for(SensorRole::Pelvis);
        assert_eq!(header.len(), 4);
        assert!(header[0].starts_with("Shimmer_COM,"));
        assert_eq!(header[1].split(',').count(), 7);
    }
}
