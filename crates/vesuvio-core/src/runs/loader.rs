use super::{LoadedRun, RunLoader};
use crate::common::{IntervalSet, TofWindow};
use crate::domain::{ReductionError, ReductionResult};
use crate::instrument::monitor_spectra;
use crate::workspace::{Spectrum, Workspace, WorkspaceGroup};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// On-disk layout of a raw run: one spectrum table per period.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRunFile {
    #[serde(default)]
    pub run_number: Option<u32>,
    pub periods: Vec<RawPeriod>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawPeriod {
    pub spectra: Vec<Spectrum>,
}

/// Loads raw runs stored as JSON period tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRunLoader;

impl JsonRunLoader {
    pub fn read(path: &Path) -> ReductionResult<RawRunFile> {
        let source = fs::read_to_string(path).map_err(|source| {
            ReductionError::io_system(
                "IO.RUN_READ",
                format!("failed to read run file '{}': {}", path.display(), source),
            )
        })?;
        serde_json::from_str(&source).map_err(|source| {
            ReductionError::io_system(
                "IO.RUN_PARSE",
                format!("failed to parse run file '{}': {}", path.display(), source),
            )
        })
    }
}

impl RunLoader for JsonRunLoader {
    fn load(
        &self,
        path: &Path,
        spectra: &IntervalSet,
        tof_window: TofWindow,
    ) -> ReductionResult<LoadedRun> {
        let raw = Self::read(path)?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "run".to_string());
        let monitors = monitor_spectra();

        let mut spectra_members = Vec::with_capacity(raw.periods.len());
        let mut monitor_members = Vec::with_capacity(raw.periods.len());
        for (index, period) in raw.periods.into_iter().enumerate() {
            let number = index + 1;
            let mut detector_rows = Vec::new();
            let mut monitor_rows = Vec::new();
            for mut row in period.spectra {
                if row.e.is_empty() {
                    row.e = row.y.iter().map(|count| count.abs().sqrt()).collect();
                }
                row.validate()?;
                if monitors.contains(row.spectrum_id) {
                    monitor_rows.push(row.cropped(tof_window));
                } else if spectra.contains(row.spectrum_id) {
                    detector_rows.push(row.cropped(tof_window));
                }
            }
            spectra_members.push(Workspace::new(format!("{name}_{number}"), detector_rows));
            monitor_members.push(Workspace::new(
                format!("{name}_monitors_{number}"),
                monitor_rows,
            ));
        }

        debug!(
            path = %path.display(),
            run_number = raw.run_number,
            periods = spectra_members.len(),
            "loaded raw run"
        );
        Ok(LoadedRun {
            spectra: WorkspaceGroup::new(name.clone(), spectra_members),
            monitors: WorkspaceGroup::new(format!("{name}_monitors"), monitor_members),
        })
    }
}
