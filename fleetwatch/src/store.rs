//! Persisted run state: exception list, last-known snapshot and the new-occurrences file.
//! Everything lives under one state directory, with the file names the helpdesk tooling
//! already expects.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::diff::OccurrenceSet;
use crate::error::{FleetError, Result};
use crate::exceptions::ExceptionList;
use crate::history::IncidentHistory;

pub const EXCEPTIONS_FILE: &str = "ignorar_maquinas.json";
pub const SNAPSHOT_FILE: &str = "ocorrencias.json";
pub const NEW_OCCURRENCES_FILE: &str = "novas_ocorrencias.json";
pub const REPORTS_DIR: &str = "relatórios";
pub const HISTORY_FILE: &str = "historico-de-chamados.json";

#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn exceptions_path(&self) -> PathBuf {
        self.dir.join(EXCEPTIONS_FILE)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn new_occurrences_path(&self) -> PathBuf {
        self.dir.join(NEW_OCCURRENCES_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(REPORTS_DIR).join(HISTORY_FILE)
    }

    pub fn history(&self) -> IncidentHistory {
        IncidentHistory::new(self.history_path())
    }

    pub fn load_exceptions(&self) -> Result<ExceptionList> {
        read_json_or_default(&self.exceptions_path())
    }

    pub fn load_last_known(&self) -> Result<OccurrenceSet> {
        read_json_or_default(&self.snapshot_path())
    }

    /// Replace the snapshot wholesale with this run's occurrences.
    pub fn store_last_known(&self, current: &OccurrenceSet) -> Result<()> {
        let path = self.snapshot_path();
        write_json_pretty(&path, current)?;
        info!(path = %path.display(), machines = current.len(), "snapshot written");
        Ok(())
    }

    /// Write the diff for downstream consumers, or remove a stale one when
    /// there is nothing new.
    pub fn store_new_occurrences(&self, diff: &OccurrenceSet) -> Result<()> {
        let path = self.new_occurrences_path();
        if diff.is_empty() {
            return match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "removed stale new-occurrences file");
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(FleetError::persistence(path, e)),
            };
        }
        write_json_pretty(&path, diff)?;
        info!(path = %path.display(), machines = diff.len(), "new occurrences saved");
        Ok(())
    }
}

/// Missing file means "nothing persisted yet"; anything unreadable is an error.
pub(crate) fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match fs::read_to_string(path) {
        Ok(s) if s.trim().is_empty() => Ok(T::default()),
        Ok(s) => serde_json::from_str(&s).map_err(|e| FleetError::persistence(path, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(FleetError::persistence(path, e)),
    }
}

pub(crate) fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| FleetError::persistence(parent, e))?;
    }
    let data = serde_json::to_vec_pretty(value).map_err(|e| FleetError::persistence(path, e))?;
    fs::write(path, data).map_err(|e| FleetError::persistence(path, e))
}
