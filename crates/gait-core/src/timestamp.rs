//! Timestamp snapping and time windows
//!
//! Sensor clocks are independent, so every human- or metadata-supplied
//! boundary is resolved against the timestamps a stream actually holds.

use crate::error::{GaitError, GaitResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Return the element of `timestamps` closest to `query`.
///
/// Linear left-to-right scan; on a tie the earlier element wins, so for
/// `[1.0, 3.0]` a query of `2.0` resolves to `1.0`.
pub fn nearest(timestamps: &[f64], query: f64) -> GaitResult<f64> {
    nearest_index(timestamps, query).map(|idx| timestamps[idx])
}

/// Index of the element `nearest` returns
pub fn nearest_index(timestamps: &[f64], query: f64) -> GaitResult<usize> {
    let (&first, _) = timestamps.split_first().ok_or(GaitError::EmptySequence)?;

    let mut best = 0;
    let mut closest = first;
    for (idx, &value) in timestamps.iter().enumerate().skip(1) {
        if (value - query).abs() < (closest - query).abs() {
            closest = value;
            best = idx;
        }
    }

    Ok(best)
}

/// Closed time range `[start, end]` on a stream's own clock
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    /// Create a window, rejecting reversed or non-finite bounds
    pub fn new(start: f64, end: f64) -> GaitResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(GaitError::InvalidWindow {
                reason: format!("non-finite bounds [{}, {}]", start, end),
            });
        }
        if start >= end {
            return Err(GaitError::InvalidWindow {
                reason: format!("start {} is not before end {}", start, end),
            });
        }
        Ok(TimeWindow { start, end })
    }

    /// Snap both bounds onto `timestamps`
    pub fn snapped(&self, timestamps: &[f64]) -> GaitResult<TimeWindow> {
        let start = nearest(timestamps, self.start)?;
        let end = nearest(timestamps, self.end)?;
        TimeWindow::new(start, end)
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.6}:{:.6}]", self.start, self.end)
    }
}

/// Horizontal-rest and vertical-rest windows for one sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationWindows {
    pub horizontal: TimeWindow,
    pub vertical: TimeWindow,
}

impl CalibrationWindows {
    pub fn snapped(&self, timestamps: &[f64]) -> GaitResult<CalibrationWindows> {
        Ok(CalibrationWindows {
            horizontal: self.horizontal.snapped(timestamps)?,
            vertical: self.vertical.snapped(timestamps)?,
        })
    }
}

/// Trial 1 and trial 2 boundaries.
///
/// Ordering of the two trials is by convention only and is not checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialWindows {
    pub first: TimeWindow,
    pub second: TimeWindow,
}

impl TrialWindows {
    pub fn iter(&self) -> impl Iterator<Item = (usize, &TimeWindow)> {
        [(1, &self.first), (2, &self.second)].into_iter()
    }
}
