pub mod errors;

pub use errors::{ReductionError, ReductionErrorCategory, ReductionResult};

use crate::common::IntervalSet;
use crate::instrument::detector_spectra;

pub const DEFAULT_OUTPUT_NAME: &str = "vesuvio_difference";

/// Parameters of one foil-state differencing reduction.
#[derive(Debug, Clone, PartialEq)]
pub struct ReductionRequest {
    pub runs: IntervalSet,
    pub spectra: IntervalSet,
    pub beta: f64,
    pub output_name: String,
}

impl ReductionRequest {
    /// Parses the `Runs` and `Spectra` range strings and checks them against the
    /// detector catalog; nothing here touches the file system.
    pub fn parse(runs: &str, spectra: &str, beta: f64) -> ReductionResult<Self> {
        let runs = runs.parse::<IntervalSet>()?;
        let spectra = spectra.parse::<IntervalSet>()?;
        Self::new(runs, spectra, beta)
    }

    pub fn new(runs: IntervalSet, spectra: IntervalSet, beta: f64) -> ReductionResult<Self> {
        if runs.is_empty() {
            return Err(ReductionError::input_validation(
                "INPUT.RANGE_PARSE",
                "at least one run number is required",
            ));
        }

        let reducible = detector_spectra();
        if let Some(unmapped) = spectra.iter().find(|&id| !reducible.contains(id)) {
            return Err(ReductionError::input_validation(
                "INPUT.SPECTRUM_NOT_MAPPED",
                format!(
                    "spectrum {unmapped} does not belong to a backward or forward detector grouping ({reducible})"
                ),
            ));
        }

        Ok(Self {
            runs,
            spectra,
            beta,
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
        })
    }

    pub fn with_output_name(mut self, output_name: impl Into<String>) -> Self {
        self.output_name = output_name.into();
        self
    }
}
