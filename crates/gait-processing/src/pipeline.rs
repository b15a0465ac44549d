//! Session orchestration: review, orient, filter, segment, persist
//!
//! Every sensor role goes through the same states:
//!
//! ```text
//! Loaded -> (CalibrationPending <-> CalibrationReviewed) -> Oriented
//!        -> Filtered -> ReviewedPlot -> Segmented -> Persisted
//! ```
//!
//! Roles with a fixed or table-driven orientation go straight from `Loaded`
//! to `Oriented`. A fatal error ends only the role it happened in, which
//! moves to `Failed`; the other roles carry on. Dependent roles wait on the
//! reference role's trial windows and are skipped if it fails. Human review, plotting and file access sit behind the
//! `Reviewer`, `ReviewPlotter` and `StreamStore` traits so the orchestrator
//! itself only sequences pure stages.

use crate::config::AcquisitionProfile;
use crate::filters::SignalFilterStage;
use crate::orientation::{derive_rotation, RotationMatrix};
use crate::processor::ProcessingChain;
use crate::segmentation::{TrialSegmenter, TrialSegments};
use gait_core::{
    AxisMap, CalibrationWindows, GaitError, GaitResult, OrientationStrategy, SensorRole,
    SensorStream, TimeWindow, TrialWindows,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// Per-role pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineState {
    Loaded,
    CalibrationPending,
    CalibrationReviewed,
    Oriented,
    Filtered,
    ReviewedPlot,
    Segmented,
    Persisted,
    /// Optional sensor not recorded, or no filtered stream to segment
    Skipped,
    /// Fatal error in this role's pipeline
    Failed,
}

impl PipelineState {
    /// Whether `next` is a legal successor of this state
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Persisted, _) | (Skipped, _) | (Failed, _) => false,
            (_, Skipped) | (_, Failed) => true,
            (Loaded, CalibrationPending)
            | (Loaded, Oriented)
            | (CalibrationPending, CalibrationReviewed)
            | (CalibrationReviewed, CalibrationPending)
            | (CalibrationReviewed, Oriented)
            | (Oriented, Filtered)
            | (Filtered, ReviewedPlot)
            | (ReviewedPlot, Segmented)
            | (Segmented, Persisted) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Persisted | PipelineState::Skipped | PipelineState::Failed
        )
    }
}

/// Reviewer answer to a window proposal request
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewDecision<T> {
    Choice(T),
    /// Show the plot again and ask again
    Retry,
}

/// Human in the loop: picks windows from plotted streams and confirms them.
///
/// Calls block until the reviewer answers. A `MalformedReviewInput` error
/// makes the orchestrator ask again instead of aborting.
pub trait Reviewer {
    /// Horizontal and vertical rest windows, in the stream's own time units
    fn propose_calibration(&mut self, role: SensorRole, stream: &SensorStream) -> GaitResult<ReviewDecision<CalibrationWindows>>;

    /// Trial 1 and trial 2 boundaries on the reference stream
    fn propose_trials(&mut self, role: SensorRole, stream: &SensorStream) -> GaitResult<ReviewDecision<TrialWindows>>;

    /// Yes/no question about the windows just plotted
    fn confirm(&mut self, role: SensorRole, question: &str) -> GaitResult<bool>;
}

/// Labelled time span drawn over a review plot
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedSpan {
    pub label: String,
    pub window: TimeWindow,
}

impl AnnotatedSpan {
    pub fn new(label: impl Into<String>, window: TimeWindow) -> Self {
        AnnotatedSpan {
            label: label.into(),
            window,
        }
    }
}

/// Displays streams for review
pub trait ReviewPlotter {
    fn plot_stream(&mut self, role: SensorRole, title: &str, stream: &SensorStream, spans: &[AnnotatedSpan]) -> GaitResult<()>;

    /// Raw, oriented and filtered versions of one recording side by side
    fn plot_comparison(&mut self, role: SensorRole, raw: &SensorStream, oriented: &SensorStream, filtered: &SensorStream) -> GaitResult<()>;
}

/// Streams persisted per role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Artefact {
    Oriented,
    OrientedFiltered,
    CalibrationHorizontal,
    CalibrationVertical,
    /// Trial number, 1 or 2
    Trial(usize),
}

/// Text notes persisted per role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotesKind {
    Calibration,
    Trials,
}

/// Session storage: raw recordings in, artefacts out
pub trait StreamStore {
    /// Raw recording of a role; `MissingInputFile` when not recorded
    fn load_raw(&mut self, role: SensorRole) -> GaitResult<SensorStream>;

    fn load_axis_map(&mut self, role: SensorRole) -> GaitResult<AxisMap>;

    fn exists(&self, role: SensorRole, artefact: Artefact) -> bool;

    fn load(&mut self, role: SensorRole, artefact: Artefact) -> GaitResult<SensorStream>;

    fn save(&mut self, role: SensorRole, artefact: Artefact, stream: &SensorStream) -> GaitResult<()>;

    fn save_notes(&mut self, role: SensorRole, kind: NotesKind, lines: &[String]) -> GaitResult<()>;
}

/// Notes lines for confirmed calibration windows
pub fn calibration_notes(windows: &CalibrationWindows) -> Vec<String> {
    vec![
        format!("Horizontal {}", windows.horizontal),
        format!("Vertical {}", windows.vertical),
    ]
}

/// Notes lines for resolved trial windows
pub fn trial_notes(windows: &TrialWindows) -> Vec<String> {
    windows
        .iter()
        .map(|(n, window)| format!("Trial {} {}", n, window))
        .collect()
}

fn calibration_spans(windows: &CalibrationWindows) -> Vec<AnnotatedSpan> {
    vec![
        AnnotatedSpan::new("Horizontal", windows.horizontal),
        AnnotatedSpan::new("Vertical", windows.vertical),
    ]
}

fn trial_spans(windows: &TrialWindows) -> Vec<AnnotatedSpan> {
    windows
        .iter()
        .map(|(n, window)| AnnotatedSpan::new(format!("Trial {}", n), *window))
        .collect()
}

/// What happened to one sensor role
#[derive(Debug, Clone, PartialEq)]
pub struct RoleReport {
    pub role: SensorRole,
    pub state: PipelineState,
    /// Every state entered, in order
    pub history: Vec<PipelineState>,
    pub calibration: Option<CalibrationWindows>,
    pub rotation: Option<RotationMatrix>,
    /// Calibration magnitudes within tolerance of gravity
    pub gravity_plausible: Option<bool>,
    pub trials: Option<TrialWindows>,
}

impl RoleReport {
    fn new(role: SensorRole) -> Self {
        RoleReport {
            role,
            state: PipelineState::Loaded,
            history: vec![PipelineState::Loaded],
            calibration: None,
            rotation: None,
            gravity_plausible: None,
            trials: None,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(role = %self.role, from = ?self.state, to = ?next, "state transition");
        self.state = next;
        self.history.push(next);
    }
}

/// Outcome of a whole session run
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub run_id: Uuid,
    pub reference: SensorRole,
    /// Trial windows resolved on the reference stream; `None` if it failed
    pub trials: Option<TrialWindows>,
    pub roles: Vec<RoleReport>,
    /// Fatal errors, in the order they happened
    pub failures: Vec<RoleFailure>,
}

impl SessionReport {
    pub fn role(&self, role: SensorRole) -> Option<&RoleReport> {
        self.roles.iter().find(|r| r.role == role)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fatal error of one role's pipeline, with the context to find it
#[derive(Debug, Clone, PartialEq)]
pub struct RoleFailure {
    pub role: SensorRole,
    pub session: String,
    pub error: GaitError,
}

impl fmt::Display for RoleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sensor in session '{}': {}", self.role, self.session, self.error)
    }
}

impl std::error::Error for RoleFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Session in which at least one role failed.
///
/// Holds the full report so the roles that did finish stay visible.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFailure {
    pub report: SessionReport,
}

impl SessionFailure {
    pub fn failures(&self) -> &[RoleFailure] {
        &self.report.failures
    }
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} sensor pipelines failed",
            self.report.failures.len(),
            self.report.roles.len()
        )?;
        for failure in &self.report.failures {
            write!(f, "; {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for SessionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.report
            .failures
            .first()
            .map(|failure| failure as &(dyn std::error::Error + 'static))
    }
}

/// Drives every sensor role of one session through the pipeline
pub struct PipelineOrchestrator<R, P, S> {
    profile: AcquisitionProfile,
    filter_stage: SignalFilterStage,
    segmenter: TrialSegmenter,
    reference: SensorRole,
    session: String,
    run_id: Uuid,
    reviewer: R,
    plotter: P,
    store: S,
}

impl<R: Reviewer, P: ReviewPlotter, S: StreamStore> PipelineOrchestrator<R, P, S> {
    /// Validates the profile and designs every filter up front
    pub fn new(profile: AcquisitionProfile, session: impl Into<String>, reviewer: R, plotter: P, store: S) -> GaitResult<Self> {
        let filter_stage = SignalFilterStage::new(&profile)?;
        let segmenter = TrialSegmenter::from_profile(&profile);

        Ok(PipelineOrchestrator {
            profile,
            filter_stage,
            segmenter,
            reference: SensorRole::Pelvis,
            session: session.into(),
            run_id: Uuid::new_v4(),
            reviewer,
            plotter,
            store,
        })
    }

    /// Segment dependent sensors against `role` instead of the pelvis
    pub fn with_reference(mut self, role: SensorRole) -> Self {
        self.reference = role;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn profile(&self) -> &AcquisitionProfile {
        &self.profile
    }

    pub fn reviewer(&self) -> &R {
        &self.reviewer
    }

    pub fn plotter(&self) -> &P {
        &self.plotter
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Orient and filter every role, then segment all of them.
    ///
    /// Every role is attempted. Fails if any role ended in `Failed` or the
    /// reference windows could not be resolved.
    pub fn run(&mut self) -> Result<SessionReport, SessionFailure> {
        let span = info_span!("session", session = %self.session, run_id = %self.run_id);
        let _guard = span.enter();
        info!(reference = %self.reference, profile = %self.profile.name, "starting session");

        let mut roles = Vec::with_capacity(SensorRole::ALL.len());
        let mut failures = Vec::new();
        for role in SensorRole::ALL {
            let mut report = RoleReport::new(role);
            if let Err(error) = self.process_role(&mut report) {
                failures.push(self.fail(&mut report, error));
            }
            roles.push(report);
        }

        let trials = self.segment_all(&mut roles, &mut failures);
        info!(
            persisted = roles.iter().filter(|r| r.state == PipelineState::Persisted).count(),
            skipped = roles.iter().filter(|r| r.state == PipelineState::Skipped).count(),
            failed = failures.len(),
            "session complete"
        );

        let report = SessionReport {
            run_id: self.run_id,
            reference: self.reference,
            trials,
            roles,
            failures,
        };
        if report.is_complete() {
            Ok(report)
        } else {
            Err(SessionFailure { report })
        }
    }

    /// Load, orient, filter and persist one role, up to `ReviewedPlot`
    pub fn orient_and_filter(&mut self, role: SensorRole) -> GaitResult<RoleReport> {
        let mut report = RoleReport::new(role);
        self.process_role(&mut report)?;
        Ok(report)
    }

    fn process_role(&mut self, report: &mut RoleReport) -> GaitResult<()> {
        let role = report.role;
        let span = info_span!("role", role = %role, stem = role.file_stem());
        let _guard = span.enter();

        let raw = match self.store.load_raw(role) {
            Ok(stream) => stream,
            Err(GaitError::MissingInputFile { path }) if role.is_optional() => {
                warn!(%path, "optional sensor not recorded, skipping");
                report.advance(PipelineState::Skipped);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        info!(samples = raw.len(), "loaded raw stream");

        let rotation = match role.orientation_strategy() {
            OrientationStrategy::Calibration => {
                report.advance(PipelineState::CalibrationPending);
                let windows = self.review_calibration(role, &raw, report)?;

                let horizontal = raw.slice(&windows.horizontal)?;
                let vertical = raw.slice(&windows.vertical)?;
                let outcome = derive_rotation(&horizontal, &vertical)?;
                report.gravity_plausible = Some(
                    outcome.log_gravity_check(self.profile.expected_gravity, self.profile.gravity_tolerance),
                );

                self.store.save(role, Artefact::CalibrationHorizontal, &horizontal)?;
                self.store.save(role, Artefact::CalibrationVertical, &vertical)?;
                self.store.save_notes(role, NotesKind::Calibration, &calibration_notes(&windows))?;
                report.calibration = Some(windows);
                outcome.rotation
            }
            OrientationStrategy::FixedPermutation => RotationMatrix::pelvis_permutation(),
            OrientationStrategy::AxisMapTable => {
                RotationMatrix::from_axis_map(&self.store.load_axis_map(role)?)
            }
        };
        debug!("rotation matrix\n{}", rotation);

        let mut outputs = ProcessingChain::new()
            .then(rotation)
            .then(self.filter_stage.for_class(role.sensor_class()))
            .run(&raw)?
            .into_iter();
        let (Some(oriented), Some(filtered)) = (outputs.next(), outputs.next()) else {
            return Err(GaitError::InvalidStream {
                reason: "processing chain produced too few stages".to_string(),
            });
        };

        report.advance(PipelineState::Oriented);
        self.store.save(role, Artefact::Oriented, &oriented)?;
        report.advance(PipelineState::Filtered);
        self.store.save(role, Artefact::OrientedFiltered, &filtered)?;

        self.plotter.plot_comparison(role, &raw, &oriented, &filtered)?;
        report.advance(PipelineState::ReviewedPlot);
        report.rotation = Some(rotation);

        Ok(())
    }

    /// Ask until the reviewer confirms a pair of calibration windows
    fn review_calibration(&mut self, role: SensorRole, raw: &SensorStream, report: &mut RoleReport) -> GaitResult<CalibrationWindows> {
        let timestamps = raw.timestamps();

        loop {
            self.plotter.plot_stream(role, "calibration", raw, &[])?;
            let proposed = match self.reviewer.propose_calibration(role, raw) {
                Ok(ReviewDecision::Choice(windows)) => windows,
                Ok(ReviewDecision::Retry) => continue,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "calibration input rejected, asking again");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let windows = match proposed.snapped(&timestamps) {
                Ok(windows) => windows,
                Err(e @ GaitError::InvalidWindow { .. }) => {
                    warn!(error = %e, "calibration window unusable, asking again");
                    continue;
                }
                Err(e) => return Err(e),
            };

            report.advance(PipelineState::CalibrationReviewed);
            self.plotter.plot_stream(role, "calibration", raw, &calibration_spans(&windows))?;
            if self.ask(role, "Are these sections correct?")? {
                info!(horizontal = %windows.horizontal, vertical = %windows.vertical, "calibration windows confirmed");
                return Ok(windows);
            }
            report.advance(PipelineState::CalibrationPending);
        }
    }

    /// Confirmation where unreadable answers count as "no"
    fn ask(&mut self, role: SensorRole, question: &str) -> GaitResult<bool> {
        match self.reviewer.confirm(role, question) {
            Ok(answer) => Ok(answer),
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "unreadable confirmation, treating as no");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Segment the reference role, then propagate its windows to the others
    fn segment_all(&mut self, roles: &mut [RoleReport], failures: &mut Vec<RoleFailure>) -> Option<TrialWindows> {
        let reference = self.reference;
        let resolved = match roles.iter_mut().find(|r| r.role == reference) {
            Some(report) if report.state == PipelineState::Failed => None,
            Some(report) => match self.segment_reference() {
                Ok(windows) => {
                    if !report.state.is_terminal() {
                        report.advance(PipelineState::Segmented);
                        report.advance(PipelineState::Persisted);
                        report.trials = Some(windows);
                    }
                    Some(windows)
                }
                Err(error) => {
                    failures.push(self.fail(report, error));
                    None
                }
            },
            None => None,
        };

        let Some(resolved) = resolved else {
            for report in roles.iter_mut().filter(|r| !r.state.is_terminal()) {
                warn!(role = %report.role, reference = %reference, "no reference trial windows, segmentation skipped");
                report.advance(PipelineState::Skipped);
            }
            return None;
        };

        for report in roles.iter_mut() {
            if report.state.is_terminal() {
                continue;
            }
            match self.segment_dependent(report.role, &resolved) {
                Ok(Some(windows)) => {
                    report.advance(PipelineState::Segmented);
                    report.advance(PipelineState::Persisted);
                    report.trials = Some(windows);
                }
                Ok(None) => report.advance(PipelineState::Skipped),
                Err(error) => failures.push(self.fail(report, error)),
            }
        }

        Some(resolved)
    }

    fn segment_reference(&mut self) -> GaitResult<TrialWindows> {
        let role = self.reference;
        let span = info_span!("segment", role = %role, reference = true);
        let _guard = span.enter();

        // Segmentation always works from the persisted filtered stream
        if !self.store.exists(role, Artefact::OrientedFiltered) {
            return Err(GaitError::MissingInputFile {
                path: format!("{} oriented-filtered stream", role.file_stem()),
            });
        }
        let filtered = self.store.load(role, Artefact::OrientedFiltered)?;

        loop {
            self.plotter.plot_stream(role, "trials", &filtered, &[])?;
            let requested = match self.reviewer.propose_trials(role, &filtered) {
                Ok(ReviewDecision::Choice(windows)) => windows,
                Ok(ReviewDecision::Retry) => continue,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "trial input rejected, asking again");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let segments = match self.segmenter.segment_reference(&filtered, &requested) {
                Ok(segments) => segments,
                Err(e @ GaitError::InvalidWindow { .. }) => {
                    warn!(error = %e, "trial window unusable, asking again");
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.plotter.plot_stream(role, "trials", &filtered, &trial_spans(&segments.windows))?;
            if self.ask(role, "Are these trials correct?")? {
                self.persist_trials(role, &segments)?;
                return Ok(segments.windows);
            }
        }
    }

    /// `None` when the role has no filtered stream to segment
    fn segment_dependent(&mut self, role: SensorRole, reference: &TrialWindows) -> GaitResult<Option<TrialWindows>> {
        let span = info_span!("segment", role = %role, reference = false);
        let _guard = span.enter();

        if !self.store.exists(role, Artefact::OrientedFiltered) {
            info!("no oriented-filtered stream, segmentation skipped");
            return Ok(None);
        }
        let filtered = self.store.load(role, Artefact::OrientedFiltered)?;
        let segments = self.segmenter.segment_dependent(&filtered, reference)?;

        self.plotter.plot_stream(role, "trials", &filtered, &trial_spans(&segments.windows))?;
        self.persist_trials(role, &segments)?;
        Ok(Some(segments.windows))
    }

    fn persist_trials(&mut self, role: SensorRole, segments: &TrialSegments) -> GaitResult<()> {
        for (n, window, stream) in segments.iter() {
            self.store.save(role, Artefact::Trial(n), stream)?;
            info!(trial = n, window = %window, samples = stream.len(), "trial persisted");
        }
        self.store.save_notes(role, NotesKind::Trials, &trial_notes(&segments.windows))
    }

    /// Mark a role failed and wrap its error with the session context
    fn fail(&self, report: &mut RoleReport, error: GaitError) -> RoleFailure {
        error!(role = %report.role, state = ?report.state, error = %error, "sensor pipeline failed");
        if !report.state.is_terminal() {
            report.advance(PipelineState::Failed);
        }
        RoleFailure {
            role: report.role,
            session: self.session.clone(),
            error,
        }
    }
}
