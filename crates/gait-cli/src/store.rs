//! Session directory backed `StreamStore`

use crate::layout::SessionLayout;
use crate::table_io;
use gait_core::{AxisMap, GaitError, GaitResult, SensorRole, SensorStream};
use gait_processing::{Artefact, NotesKind, StreamStore};
use std::fs;
use std::path::Path;
use tracing::debug;

pub struct FileStore {
    layout: SessionLayout,
}

impl FileStore {
    pub fn new(layout: SessionLayout) -> Self {
        FileStore { layout }
    }
}

fn ensure_parent(path: &Path) -> GaitResult<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|e| GaitError::io(dir.display().to_string(), e))
        }
        _ => Ok(()),
    }
}

impl StreamStore for FileStore {
    fn load_raw(&mut self, role: SensorRole) -> GaitResult<SensorStream> {
        table_io::read_stream(&self.layout.raw_path(role))
    }

    fn load_axis_map(&mut self, role: SensorRole) -> GaitResult<AxisMap> {
        table_io::read_axis_map(&self.layout.axis_map_path(role))
    }

    fn exists(&self, role: SensorRole, artefact: Artefact) -> bool {
        self.layout.artefact_path(role, artefact).is_file()
    }

    fn load(&mut self, role: SensorRole, artefact: Artefact) -> GaitResult<SensorStream> {
        table_io::read_stream(&self.layout.artefact_path(role, artefact))
    }

    fn save(&mut self, role: SensorRole, artefact: Artefact, stream: &SensorStream) -> GaitResult<()> {
        let path = self.layout.artefact_path(role, artefact);
        ensure_parent(&path)?;
        table_io::write_stream(&path, stream)?;
        debug!(path = %path.display(), samples = stream.len(), "artefact written");
        Ok(())
    }

    fn save_notes(&mut self, role: SensorRole, kind: NotesKind, lines: &[String]) -> GaitResult<()> {
        let path = self.layout.notes_path(role, kind);
        ensure_parent(&path)?;
        table_io::write_notes(&path, lines)
    }
}
