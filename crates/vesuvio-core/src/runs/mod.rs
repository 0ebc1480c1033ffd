//! Locating, loading and summing raw Vesuvio runs.

mod loader;
mod locator;

pub use loader::{JsonRunLoader, RawPeriod, RawRunFile};
pub use locator::{DEFAULT_RUN_EXTENSION, DEFAULT_RUN_PREFIX, DirectoryRunLocator};

use crate::common::{IntervalSet, TofWindow};
use crate::domain::{ReductionError, ReductionResult};
use crate::workspace::WorkspaceGroup;
use std::path::{Path, PathBuf};

/// Detector and monitor periods of one run (or of several summed runs).
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRun {
    pub spectra: WorkspaceGroup,
    pub monitors: WorkspaceGroup,
}

pub trait RunLocator {
    fn locate(&self, run: u32) -> ReductionResult<PathBuf>;
}

pub trait RunLoader {
    /// Loads `spectra` plus the monitor spectra of the file at `path`, cropped to `tof_window`.
    fn load(
        &self,
        path: &Path,
        spectra: &IntervalSet,
        tof_window: TofWindow,
    ) -> ReductionResult<LoadedRun>;
}

/// Elementwise sum of the loaded runs. A single run is copied under `name`.
pub fn sum_runs(runs: Vec<LoadedRun>, name: &str) -> ReductionResult<LoadedRun> {
    let monitor_name = format!("{name}_monitors");
    let mut runs = runs.into_iter();
    let first = runs.next().ok_or_else(|| {
        ReductionError::input_validation("INPUT.RANGE_PARSE", "no runs were loaded to sum")
    })?;

    let mut summed = LoadedRun {
        spectra: first.spectra.renamed(name),
        monitors: first.monitors.renamed(&monitor_name),
    };
    for run in runs {
        summed = LoadedRun {
            spectra: summed.spectra.plus(&run.spectra, name)?,
            monitors: summed.monitors.plus(&run.monitors, &monitor_name)?,
        };
    }
    Ok(summed)
}
