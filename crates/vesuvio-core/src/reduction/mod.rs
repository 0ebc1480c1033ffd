//! Foil-state differencing of Vesuvio runs.
//!
//! [`VesuvioReduction`] drives a full reduction: every requested run is
//! located, then loaded and summed, and the summed period group is passed
//! through [`difference_foil_states`].

mod differencing;
mod period;

pub use differencing::{
    FoilAccumulators, IntensityMap, clone_accumulators, cross_normalise, difference,
    difference_foil_states, integrate_intensities, normalise_by_bin_width, normalise_by_monitor,
    sum_periods,
};
pub use period::{PeriodManager, PeriodMapping};

use crate::common::ReductionConfig;
use crate::domain::{ReductionRequest, ReductionResult};
use crate::runs::{RunLoader, RunLocator, sum_runs};
use crate::workspace::Workspace;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct VesuvioReduction<L, R> {
    locator: L,
    loader: R,
    config: ReductionConfig,
}

impl<L: RunLocator, R: RunLoader> VesuvioReduction<L, R> {
    pub fn new(locator: L, loader: R) -> Self {
        Self::with_config(locator, loader, ReductionConfig::default())
    }

    pub fn with_config(locator: L, loader: R, config: ReductionConfig) -> Self {
        Self {
            locator,
            loader,
            config,
        }
    }

    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    /// Runs the reduction; either the differenced workspace is returned or
    /// nothing is.
    pub fn execute(&self, request: &ReductionRequest) -> ReductionResult<Workspace> {
        self.config.validate()?;

        let paths = request
            .runs
            .iter()
            .map(|run| self.locator.locate(run))
            .collect::<ReductionResult<Vec<PathBuf>>>()?;
        info!(runs = %request.runs, files = paths.len(), "located runs");

        let loaded = paths
            .iter()
            .map(|path| {
                self.loader
                    .load(path, &request.spectra, self.config.tof_window)
            })
            .collect::<ReductionResult<Vec<_>>>()?;
        let summed = sum_runs(loaded, &format!("__summed_{}", request.runs))?;

        difference_foil_states(
            summed,
            &request.spectra,
            request.beta,
            &self.config,
            &request.output_name,
        )
    }
}
