//! Write a simulated session to disk in the study layout

use crate::layout::SessionLayout;
use crate::table_io;
use anyhow::{Context, Result};
use gait_core::TimeWindow;
use gait_simulation::SimulatedSession;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SCRIPT_FILE: &str = "session_script.json";
pub const ANSWERS_FILE: &str = "review_answers.txt";

/// Margin kept from pose transitions when writing reviewer answers (ms)
const ANSWER_INSET_MS: f64 = 300.0;

/// Raw recordings, the device axis map, the session timeline and a file of
/// reviewer answers that reproduces the timeline. Returns the files written.
pub fn write_session(session: &SimulatedSession, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let layout = SessionLayout::new(dir);
    let mut written = Vec::new();

    for sensor in &session.sensors {
        let path = layout.raw_path(sensor.role);
        table_io::write_stream(&path, &sensor.stream)
            .with_context(|| format!("writing {} recording", sensor.role))?;
        written.push(path);

        if let Some(map) = &sensor.axis_map {
            let path = layout.axis_map_path(sensor.role);
            table_io::write_axis_map(&path, map)
                .with_context(|| format!("writing {} axis map", sensor.role))?;
            written.push(path);
        }
    }

    let script_path = dir.join(SCRIPT_FILE);
    let json = serde_json::to_string_pretty(&session.script).context("serializing session script")?;
    fs::write(&script_path, json).with_context(|| format!("writing {}", script_path.display()))?;
    written.push(script_path);

    let answers_path = dir.join(ANSWERS_FILE);
    fs::write(&answers_path, review_answers(session))
        .with_context(|| format!("writing {}", answers_path.display()))?;
    written.push(answers_path);

    info!(dir = %dir.display(), files = written.len(), "simulated session written");
    Ok(written)
}

/// Answers in prompt order: each calibrated role's windows and a "y", then
/// the trial windows and a "y"
pub fn review_answers(session: &SimulatedSession) -> String {
    let inset = |w: &TimeWindow| [w.start + ANSWER_INSET_MS, w.end - ANSWER_INSET_MS];
    let mut lines: Vec<String> = Vec::new();

    for sensor in &session.sensors {
        if sensor.role.orientation_strategy() != gait_core::OrientationStrategy::Calibration {
            continue;
        }
        let calibration = &session.script.calibration;
        for bound in inset(&calibration.horizontal).into_iter().chain(inset(&calibration.vertical)) {
            lines.push(bound.to_string());
        }
        lines.push("y".to_string());
    }

    for (_, window) in session.script.trials.iter() {
        lines.push(window.start.to_string());
        lines.push(window.end.to_string());
    }
    lines.push("y".to_string());

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use gait_core::SensorRole;
    use gait_simulation::{ImuSimulator, SessionConfig};
    use uuid::Uuid;

    #[test]
    fn test_write_session() {
        let dir = std::env::temp_dir().join(format!("gait-sim-{}", Uuid::new_v4()));
        let config = SessionConfig {
            seed: Some(3),
            duration_s: 50.0,
            include_device: false,
            ..SessionConfig::default()
        };
        let session = ImuSimulator::new(config).unwrap().generate_session().unwrap();
        let written = write_session(&session, &dir).unwrap();

        assert!(written.iter().all(|p| p.is_file()));
        assert_eq!(written.len(), 3 + 2);
        assert!(!dir.join("DEV_axes.csv").exists());

        let reloaded = table_io::read_stream(&dir.join("COM.csv")).unwrap();
        assert_eq!(reloaded, session.sensor(SensorRole::Pelvis).unwrap().stream);

        let answers = fs::read_to_string(dir.join(ANSWERS_FILE)).unwrap();
        // Two shanks with four bounds and a confirmation, then the trials
        assert_eq!(answers.lines().count(), 5 + 5 + 5);
        assert!(answers.starts_with("2300\n7700\n10300\n15700\ny\n"));
    }
}
