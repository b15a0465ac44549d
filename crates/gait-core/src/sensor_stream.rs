//! SensorStream: timestamped six-channel inertial recording

use crate::error::{GaitError, GaitResult};
use crate::timestamp::TimeWindow;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Number of value channels per sample (accelerometer + gyroscope triplets)
pub const CHANNEL_COUNT: usize = 6;

/// Value channels in file column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    AccelX,
    AccelY,
    AccelZ,
    GyroX,
    GyroY,
    GyroZ,
}

impl Channel {
    pub const ALL: [Channel; CHANNEL_COUNT] = [
        Channel::AccelX,
        Channel::AccelY,
        Channel::AccelZ,
        Channel::GyroX,
        Channel::GyroY,
        Channel::GyroZ,
    ];

    pub fn index(&self) -> usize {
        match self {
            Channel::AccelX => 0,
            Channel::AccelY => 1,
            Channel::AccelZ => 2,
            Channel::GyroX => 3,
            Channel::GyroY => 4,
            Channel::GyroZ => 5,
        }
    }

    pub fn is_accel(&self) -> bool {
        self.index() < 3
    }
}

/// One sample: accelerometer in m/s^2, gyroscope in deg/s
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    pub timestamp: f64,
    pub accel: Vector3<f64>,
    pub gyro: Vector3<f64>,
}

impl ImuSample {
    pub fn new(timestamp: f64, accel: [f64; 3], gyro: [f64; 3]) -> Self {
        ImuSample {
            timestamp,
            accel: Vector3::from(accel),
            gyro: Vector3::from(gyro),
        }
    }

    /// Channel values in file column order
    pub fn values(&self) -> [f64; CHANNEL_COUNT] {
        [
            self.accel.x, self.accel.y, self.accel.z,
            self.gyro.x, self.gyro.y, self.gyro.z,
        ]
    }

    pub fn value(&self, channel: Channel) -> f64 {
        self.values()[channel.index()]
    }
}

/// Ordered, strictly increasing sequence of samples from one sensor.
///
/// Transformations return new streams; the source is never mutated so the
/// raw recording stays available for side-by-side review.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorStream {
    samples: Vec<ImuSample>,
    /// Header lines of the source file, copied verbatim into every artefact
    header: Vec<String>,
}

impl SensorStream {
    /// Create a stream, validating timestamp order and channel values
    pub fn new(samples: Vec<ImuSample>, header: Vec<String>) -> GaitResult<Self> {
        for (idx, pair) in samples.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(GaitError::InvalidStream {
                    reason: format!(
                        "timestamps not strictly increasing at row {} ({} after {})",
                        idx + 1,
                        pair[1].timestamp,
                        pair[0].timestamp
                    ),
                });
            }
        }

        if let Some((idx, _)) = samples
            .iter()
            .enumerate()
            .find(|(_, s)| !s.timestamp.is_finite() || s.values().iter().any(|v| !v.is_finite()))
        {
            return Err(GaitError::InvalidStream {
                reason: format!("non-finite value at row {}", idx),
            });
        }

        Ok(SensorStream { samples, header })
    }

    /// Rebuild a stream with the same timestamps and header but new channel data.
    ///
    /// `channels` is indexed by `Channel::index()`; each must match the sample count.
    pub fn with_channels(&self, channels: &[Vec<f64>; CHANNEL_COUNT]) -> GaitResult<Self> {
        if let Some(bad) = channels.iter().find(|c| c.len() != self.samples.len()) {
            return Err(GaitError::InvalidStream {
                reason: format!(
                    "channel length {} doesn't match {} samples",
                    bad.len(),
                    self.samples.len()
                ),
            });
        }

        let samples = self
            .samples
            .iter()
            .enumerate()
            .map(|(i, s)| ImuSample {
                timestamp: s.timestamp,
                accel: Vector3::new(channels[0][i], channels[1][i], channels[2][i]),
                gyro: Vector3::new(channels[3][i], channels[4][i], channels[5][i]),
            })
            .collect();

        Ok(SensorStream {
            samples,
            header: self.header.clone(),
        })
    }

    /// Apply a per-sample transform to both triplets, keeping timestamps
    pub fn map_triplets<F>(&self, mut f: F) -> SensorStream
    where
        F: FnMut(&Vector3<f64>) -> Vector3<f64>,
    {
        let samples = self
            .samples
            .iter()
            .map(|s| ImuSample {
                timestamp: s.timestamp,
                accel: f(&s.accel),
                gyro: f(&s.gyro),
            })
            .collect();

        SensorStream {
            samples,
            header: self.header.clone(),
        }
    }

    pub fn samples(&self) -> &[ImuSample] {
        &self.samples
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.timestamp).collect()
    }

    pub fn first_timestamp(&self) -> Option<f64> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<f64> {
        self.samples.last().map(|s| s.timestamp)
    }

    /// Values of one channel across all samples
    pub fn channel_data(&self, channel: Channel) -> Vec<f64> {
        self.samples.iter().map(|s| s.value(channel)).collect()
    }

    /// All six channels, indexed by `Channel::index()`
    pub fn all_channels(&self) -> [Vec<f64>; CHANNEL_COUNT] {
        Channel::ALL.map(|c| self.channel_data(c))
    }

    /// Samples with `start <= t <= end` (both bounds inclusive)
    pub fn slice(&self, window: &TimeWindow) -> GaitResult<SensorStream> {
        let samples: Vec<ImuSample> = self
            .samples
            .iter()
            .filter(|s| window.contains(s.timestamp))
            .copied()
            .collect();

        if samples.is_empty() {
            return Err(GaitError::InvalidWindow {
                reason: format!("window {} selects no samples", window),
            });
        }

        Ok(SensorStream {
            samples,
            header: self.header.clone(),
        })
    }

    /// Mean accelerometer vector over the whole stream
    pub fn accel_mean(&self) -> Option<Vector3<f64>> {
        if self.samples.is_empty() {
            return None;
        }
        let sum = self
            .samples
            .iter()
            .fold(Vector3::zeros(), |acc, s| acc + s.accel);
        Some(sum / self.samples.len() as f64)
    }

    /// Median spacing between consecutive timestamps
    pub fn median_interval(&self) -> Option<f64> {
        let mut deltas: Vec<f64> = self
            .samples
            .windows(2)
            .map(|p| p[1].timestamp - p[0].timestamp)
            .collect();
        if deltas.is_empty() {
            return None;
        }
        deltas.sort_by(|a, b| a.total_cmp(b));
        Some(deltas[deltas.len() / 2])
    }

    /// Calculate basic statistics for a channel
    pub fn channel_stats(&self, channel: Channel) -> ChannelStats {
        ChannelStats::calculate(&self.channel_data(channel))
    }
}

/// Basic statistics for a signal channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub rms: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub peak_to_peak: f64,
}

impl ChannelStats {
    pub fn calculate(data: &[f64]) -> Self {
        if data.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                peak_to_peak: 0.0,
            };
        }

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let rms = (data.iter().map(|x| x * x).sum::<f64>() / n).sqrt();
        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        let min = data.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = data.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        Self {
            mean,
            rms,
            std_dev,
            min,
            max,
            peak_to_peak: max - min,
        }
    }
}
