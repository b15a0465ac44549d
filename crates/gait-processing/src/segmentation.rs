//! Trial segmentation across independently clocked sensors
//!
//! The reference sensor's trial boundaries come from metadata recorded on a
//! third, unsynchronised clock. They are snapped onto the reference stream
//! and then propagated to every dependent sensor's own timestamps.

use crate::config::AcquisitionProfile;
use gait_core::{nearest, GaitResult, SensorStream, TimeWindow, TrialWindows};
use tracing::debug;

/// Sub-streams for trial 1 and trial 2 plus the boundaries that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSegments {
    /// Boundaries snapped onto the segmented stream's own timestamps
    pub windows: TrialWindows,
    pub first: SensorStream,
    pub second: SensorStream,
}

impl TrialSegments {
    pub fn iter(&self) -> impl Iterator<Item = (usize, &TimeWindow, &SensorStream)> {
        [
            (1, &self.windows.first, &self.first),
            (2, &self.windows.second, &self.second),
        ]
        .into_iter()
    }
}

/// Chops filtered streams into trial sub-streams
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialSegmenter {
    offset: f64,
}

impl TrialSegmenter {
    /// `offset` is in timestamp units
    pub fn new(offset: f64) -> Self {
        TrialSegmenter { offset }
    }

    pub fn from_profile(profile: &AcquisitionProfile) -> Self {
        Self::new(profile.trial_offset)
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Snap the reviewer's trial windows onto the reference stream.
    ///
    /// Trial 2's end is pushed later by the offset before snapping; the
    /// other three bounds snap as given.
    pub fn resolve_reference(&self, reference: &SensorStream, requested: &TrialWindows) -> GaitResult<TrialWindows> {
        let timestamps = reference.timestamps();

        let first = TimeWindow::new(
            nearest(&timestamps, requested.first.start)?,
            nearest(&timestamps, requested.first.end)?,
        )?;
        let second = TimeWindow::new(
            nearest(&timestamps, requested.second.start)?,
            nearest(&timestamps, requested.second.end + self.offset)?,
        )?;

        Ok(TrialWindows { first, second })
    }

    /// Propagate resolved reference bounds onto a dependent stream.
    ///
    /// Starts are searched `offset` earlier so a dependent trial never
    /// begins after the reference trial; ends snap unadjusted.
    pub fn resolve_dependent(&self, dependent: &SensorStream, reference: &TrialWindows) -> GaitResult<TrialWindows> {
        let timestamps = dependent.timestamps();
        let propagate = |window: &TimeWindow| -> GaitResult<TimeWindow> {
            TimeWindow::new(
                nearest(&timestamps, window.start - self.offset)?,
                nearest(&timestamps, window.end)?,
            )
        };

        Ok(TrialWindows {
            first: propagate(&reference.first)?,
            second: propagate(&reference.second)?,
        })
    }

    /// Segment the reference sensor from reviewer-supplied windows
    pub fn segment_reference(&self, reference: &SensorStream, requested: &TrialWindows) -> GaitResult<TrialSegments> {
        let windows = self.resolve_reference(reference, requested)?;
        debug!(trial_1 = %windows.first, trial_2 = %windows.second, "reference trials resolved");
        Self::cut(reference, windows)
    }

    /// Segment a dependent sensor from the resolved reference windows
    pub fn segment_dependent(&self, dependent: &SensorStream, reference: &TrialWindows) -> GaitResult<TrialSegments> {
        let windows = self.resolve_dependent(dependent, reference)?;
        debug!(trial_1 = %windows.first, trial_2 = %windows.second, "dependent trials resolved");
        Self::cut(dependent, windows)
    }

    fn cut(stream: &SensorStream, windows: TrialWindows) -> GaitResult<TrialSegments> {
        Ok(TrialSegments {
            first: stream.slice(&windows.first)?,
            second: stream.slice(&windows.second)?,
            windows,
        })
    }
}
