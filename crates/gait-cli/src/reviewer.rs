//! Terminal reviewer: window bounds and confirmations typed at a prompt

use gait_core::{CalibrationWindows, GaitError, GaitResult, SensorRole, SensorStream, TimeWindow, TrialWindows};
use gait_processing::{ReviewDecision, Reviewer};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Source of reviewer answers, one line per prompt.
///
/// `Ok(None)` means the input is closed and no further answers will come.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> GaitResult<Option<String>>;
}

/// Interactive line editor with history
pub struct RustylineSource {
    editor: DefaultEditor,
}

impl RustylineSource {
    pub fn new() -> GaitResult<Self> {
        let editor = DefaultEditor::new().map_err(|e| GaitError::io("terminal", e))?;
        Ok(RustylineSource { editor })
    }
}

impl LineSource for RustylineSource {
    fn read_line(&mut self, prompt: &str) -> GaitResult<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                remember(&mut self.editor, &line);
                Ok(Some(line))
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => Ok(None),
            Err(e) => Err(GaitError::io("terminal", e)),
        }
    }
}

/// Keep non-blank answers in the editor history
fn remember(editor: &mut DefaultEditor, line: &str) {
    if line.trim().is_empty() {
        return;
    }
    if let Err(error) = editor.add_history_entry(line) {
        debug!(%error, "answer not added to history");
    }
}

/// Pre-recorded answers, for batch runs and tests
#[derive(Debug, Clone, Default)]
pub struct ScriptedLines {
    lines: VecDeque<String>,
}

impl ScriptedLines {
    pub fn from_text(text: &str) -> Self {
        ScriptedLines {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn from_file(path: &Path) -> GaitResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| GaitError::io(path.display().to_string(), e))?;
        Ok(Self::from_text(&text))
    }
}

impl LineSource for ScriptedLines {
    fn read_line(&mut self, prompt: &str) -> GaitResult<Option<String>> {
        let line = self.lines.pop_front();
        debug!(prompt = prompt.trim_end(), answer = ?line, "scripted answer");
        Ok(line)
    }
}

/// `Reviewer` that asks for each bound in turn.
///
/// An empty answer starts the current proposal over. Text that is not a
/// number, or bounds that don't form a window, are reported as malformed
/// input so the orchestrator asks again. Closed input is fatal.
pub struct ConsoleReviewer<L> {
    lines: L,
}

impl<L: LineSource> ConsoleReviewer<L> {
    pub fn new(lines: L) -> Self {
        ConsoleReviewer { lines }
    }

    fn answer(&mut self, prompt: &str) -> GaitResult<String> {
        match self.lines.read_line(prompt)? {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(GaitError::io("reviewer input", "input closed before the review finished")),
        }
    }

    /// `None` on an empty answer
    fn bound(&mut self, prompt: &str) -> GaitResult<Option<f64>> {
        let text = self.answer(prompt)?;
        if text.is_empty() {
            return Ok(None);
        }
        let value: f64 = text.parse().map_err(|_| GaitError::MalformedReviewInput {
            input: text.clone(),
            reason: "not a number".to_string(),
        })?;
        if !value.is_finite() {
            return Err(GaitError::MalformedReviewInput {
                input: text,
                reason: "not a finite time".to_string(),
            });
        }
        Ok(Some(value))
    }

    fn window(&mut self, role: SensorRole, what: &str) -> GaitResult<Option<TimeWindow>> {
        let stem = role.file_stem();
        let Some(start) = self.bound(&format!("{}: Enter the {} start time: ", stem, what))? else {
            return Ok(None);
        };
        let Some(end) = self.bound(&format!("{}: Enter the {} end time: ", stem, what))? else {
            return Ok(None);
        };
        TimeWindow::new(start, end).map(Some).map_err(|e| GaitError::MalformedReviewInput {
            input: format!("{} {}", start, end),
            reason: e.to_string(),
        })
    }
}

impl<L: LineSource> Reviewer for ConsoleReviewer<L> {
    fn propose_calibration(&mut self, role: SensorRole, _stream: &SensorStream) -> GaitResult<ReviewDecision<CalibrationWindows>> {
        let Some(horizontal) = self.window(role, "leg horizontal")? else {
            return Ok(ReviewDecision::Retry);
        };
        let Some(vertical) = self.window(role, "leg vertical")? else {
            return Ok(ReviewDecision::Retry);
        };
        Ok(ReviewDecision::Choice(CalibrationWindows { horizontal, vertical }))
    }

    fn propose_trials(&mut self, role: SensorRole, _stream: &SensorStream) -> GaitResult<ReviewDecision<TrialWindows>> {
        let Some(first) = self.window(role, "trial 1")? else {
            return Ok(ReviewDecision::Retry);
        };
        let Some(second) = self.window(role, "trial 2")? else {
            return Ok(ReviewDecision::Retry);
        };
        Ok(ReviewDecision::Choice(TrialWindows { first, second }))
    }

    fn confirm(&mut self, role: SensorRole, question: &str) -> GaitResult<bool> {
        let text = self.answer(&format!("{}: {} Y/N\n", role.file_stem(), question))?;
        match text.to_ascii_lowercase().as_str() {
            "y" | "yes" => Ok(true),
            "n" | "no" => Ok(false),
            _ => Err(GaitError::MalformedReviewInput {
                input: text,
                reason: "expected y or n".to_string(),
            }),
        }
    }
}
