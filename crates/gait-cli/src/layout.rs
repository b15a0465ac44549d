//! Session directory layout and trial file naming

use gait_core::{GaitError, GaitResult, SensorRole};
use gait_processing::{Artefact, NotesKind};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ORIENTED_DIR: &str = "Oriented";
pub const ORIENTED_FILTERED_DIR: &str = "Oriented_Filtered";
pub const PARAMETERS_DIR: &str = "Orientation_Parameters";
pub const TRIALS_DIR: &str = "Trials";

/// Where a session's inputs live and where each artefact goes.
///
/// Raw recordings are `<session>/<stem>.csv`; every output directory sits
/// inside the session directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLayout {
    root: PathBuf,
    axis_map: Option<PathBuf>,
    trial_prefix: Option<String>,
}

impl SessionLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SessionLayout {
            root: root.into(),
            axis_map: None,
            trial_prefix: None,
        }
    }

    /// Use an axis map outside the session directory
    pub fn with_axis_map(mut self, path: impl Into<PathBuf>) -> Self {
        self.axis_map = Some(path.into());
        self
    }

    pub fn with_trial_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.trial_prefix = Some(prefix.into());
        self
    }

    /// Session name for logs and error context
    pub fn label(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    pub fn raw_path(&self, role: SensorRole) -> PathBuf {
        self.root.join(format!("{}.csv", role.file_stem()))
    }

    pub fn axis_map_path(&self, role: SensorRole) -> PathBuf {
        self.axis_map
            .clone()
            .unwrap_or_else(|| self.root.join(format!("{}_axes.csv", role.file_stem())))
    }

    pub fn artefact_path(&self, role: SensorRole, artefact: Artefact) -> PathBuf {
        let stem = role.file_stem();
        match artefact {
            Artefact::Oriented => self.root.join(ORIENTED_DIR).join(format!("{}.csv", stem)),
            Artefact::OrientedFiltered => self
                .root
                .join(ORIENTED_FILTERED_DIR)
                .join(format!("{}.csv", stem)),
            Artefact::CalibrationHorizontal => self
                .root
                .join(PARAMETERS_DIR)
                .join(format!("{}_config_orient_horizontal.csv", stem)),
            Artefact::CalibrationVertical => self
                .root
                .join(PARAMETERS_DIR)
                .join(format!("{}_config_orient_vertical.csv", stem)),
            Artefact::Trial(n) => {
                let name = match &self.trial_prefix {
                    Some(prefix) => format!("{}_{}_T{}.csv", prefix, stem, n),
                    None => format!("{}_T{}.csv", stem, n),
                };
                self.root.join(TRIALS_DIR).join(name)
            }
        }
    }

    pub fn notes_path(&self, role: SensorRole, kind: NotesKind) -> PathBuf {
        let stem = role.file_stem();
        match kind {
            NotesKind::Calibration => self.root.join(PARAMETERS_DIR).join(format!("{}_notes.txt", stem)),
            NotesKind::Trials => self.root.join(TRIALS_DIR).join(format!("{}_trial_notes.txt", stem)),
        }
    }

    pub fn output_dirs(&self) -> [PathBuf; 4] {
        [ORIENTED_DIR, ORIENTED_FILTERED_DIR, PARAMETERS_DIR, TRIALS_DIR].map(|dir| self.root.join(dir))
    }

    pub fn create_output_dirs(&self) -> GaitResult<()> {
        for dir in self.output_dirs() {
            fs::create_dir_all(&dir).map_err(|e| GaitError::io(dir.display().to_string(), e))?;
        }
        Ok(())
    }
}

/// Trial naming discovered from trial-boundary metadata file names.
///
/// Names are split on `_`; the field at `position` starts with `1` or `2`
/// for trial 1 or trial 2, and the fields before it form the prefix for
/// output file names. Names that don't fit are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialNaming {
    pub prefix: Option<String>,
    /// Metadata file names per trial number
    pub trials: BTreeMap<usize, Vec<String>>,
}

impl TrialNaming {
    pub fn discover<'a, I>(names: I, position: usize) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut naming = TrialNaming::default();

        for name in names {
            let stem = Path::new(name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let fields: Vec<&str> = stem.split('_').collect();

            let trial = match fields.get(position).and_then(|f| f.chars().next()) {
                Some('1') => 1,
                Some('2') => 2,
                _ => {
                    debug!(name, position, "no trial field, ignored");
                    continue;
                }
            };

            let prefix = fields[..position].join("_");
            match &naming.prefix {
                None if !prefix.is_empty() => naming.prefix = Some(prefix),
                Some(existing) if *existing != prefix => {
                    warn!(name, existing = %existing, found = %prefix, "conflicting trial prefix, keeping first");
                }
                _ => {}
            }
            naming.trials.entry(trial).or_default().push(name.to_string());
        }

        naming
    }

    /// Discover from the file names in a metadata directory
    pub fn from_dir(dir: &Path, position: usize) -> GaitResult<Self> {
        let entries = fs::read_dir(dir).map_err(|e| GaitError::io(dir.display().to_string(), e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| GaitError::io(dir.display().to_string(), e))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(Self::discover(names.iter().map(String::as_str), position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gait_core::Side;

    #[test]
    fn test_artefact_paths() {
        let layout = SessionLayout::new("/data/031_S1");
        let la = SensorRole::Shank(Side::Left);

        assert_eq!(layout.raw_path(la), PathBuf::from("/data/031_S1/LA.csv"));
        assert_eq!(
            layout.artefact_path(la, Artefact::OrientedFiltered),
            PathBuf::from("/data/031_S1/Oriented_Filtered/LA.csv")
        );
        assert_eq!(
            layout.artefact_path(la, Artefact::CalibrationVertical),
            PathBuf::from("/data/031_S1/Orientation_Parameters/LA_config_orient_vertical.csv")
        );
        assert_eq!(
            layout.notes_path(la, NotesKind::Calibration),
            PathBuf::from("/data/031_S1/Orientation_Parameters/LA_notes.txt")
        );
        assert_eq!(
            layout.artefact_path(SensorRole::Pelvis, Artefact::Trial(2)),
            PathBuf::from("/data/031_S1/Trials/COM_T2.csv")
        );
        assert_eq!(
            layout.axis_map_path(SensorRole::AssistiveDevice),
            PathBuf::from("/data/031_S1/DEV_axes.csv")
        );
        assert_eq!(layout.label(), "031_S1");
    }

    #[test]
    fn test_overrides() {
        let layout = SessionLayout::new("/s")
            .with_axis_map("/maps/cane.csv")
            .with_trial_prefix("031_S1");
        assert_eq!(layout.axis_map_path(SensorRole::AssistiveDevice), PathBuf::from("/maps/cane.csv"));
        assert_eq!(
            layout.artefact_path(SensorRole::AssistiveDevice, Artefact::Trial(1)),
            PathBuf::from("/s/Trials/031_S1_DEV_T1.csv")
        );
    }

    #[test]
    fn test_trial_naming_discovery() {
        let names = [
            "031_S1_1TUG_start.txt",
            "031_S1_2TUG_end.txt",
            "031_S1_1TUG_end.txt",
            "notes.txt",
            "031_S1_xTUG.txt",
        ];
        let naming = TrialNaming::discover(names, 2);

        assert_eq!(naming.prefix.as_deref(), Some("031_S1"));
        assert_eq!(naming.trials[&1].len(), 2);
        assert_eq!(naming.trials[&2], vec!["031_S1_2TUG_end.txt".to_string()]);
    }

    #[test]
    fn test_trial_naming_keeps_first_prefix() {
        let naming = TrialNaming::discover(["A_1.txt", "B_2.txt"], 1);
        assert_eq!(naming.prefix.as_deref(), Some("A"));
        assert_eq!(naming.trials.len(), 2);
    }

    #[test]
    fn test_trial_naming_nothing_found() {
        let naming = TrialNaming::discover(["readme.md"], 2);
        assert_eq!(naming, TrialNaming::default());
    }
}
