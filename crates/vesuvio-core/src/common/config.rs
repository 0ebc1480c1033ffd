//! Numeric constants of the Vesuvio foil-state reduction.
//!
//! Defaults reproduce the instrument's standard reduction; a JSON file with any
//! subset of the camelCase keys overrides them.

use crate::domain::{ReductionError, ReductionResult};
use crate::instrument::DetectorGrouping;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Inclusive `[lower, upper]` window on the time-of-flight axis (microseconds).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TofWindow {
    pub lower: f64,
    pub upper: f64,
}

impl TofWindow {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, tof: f64) -> bool {
        self.lower <= tof && tof <= self.upper
    }

    fn is_valid(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite() && self.lower <= self.upper
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReductionConfig {
    pub tof_window: TofWindow,
    pub monitor_window: TofWindow,
    pub backward_window: TofWindow,
    pub forward_window: TofWindow,
    pub monitor_scale: f64,
    pub zero_monitor_epsilon: f64,
    pub monitor_spectrum: u32,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            tof_window: TofWindow::new(0.0, 700.0),
            monitor_window: TofWindow::new(600.0, 700.0),
            backward_window: TofWindow::new(400.0, 450.0),
            forward_window: TofWindow::new(410.0, 430.0),
            monitor_scale: 1000.0,
            zero_monitor_epsilon: 1.0e-7,
            monitor_spectrum: 1,
        }
    }
}

impl ReductionConfig {
    pub fn validate(&self) -> ReductionResult<()> {
        let windows = [
            ("tofWindow", self.tof_window),
            ("monitorWindow", self.monitor_window),
            ("backwardWindow", self.backward_window),
            ("forwardWindow", self.forward_window),
        ];
        for (field, window) in windows {
            if !window.is_valid() {
                return Err(ReductionError::input_validation(
                    "INPUT.CONFIG",
                    format!(
                        "{field} must be a finite window with lower <= upper, got [{}, {}]",
                        window.lower, window.upper
                    ),
                ));
            }
        }

        if !self.monitor_scale.is_finite() {
            return Err(ReductionError::input_validation(
                "INPUT.CONFIG",
                format!("monitorScale must be finite, got {}", self.monitor_scale),
            ));
        }

        if !(self.zero_monitor_epsilon.is_finite() && self.zero_monitor_epsilon > 0.0) {
            return Err(ReductionError::input_validation(
                "INPUT.CONFIG",
                format!(
                    "zeroMonitorEpsilon must be finite and > 0, got {}",
                    self.zero_monitor_epsilon
                ),
            ));
        }

        if DetectorGrouping::classify(self.monitor_spectrum) != Some(DetectorGrouping::Monitors) {
            return Err(ReductionError::input_validation(
                "INPUT.CONFIG",
                format!(
                    "monitorSpectrum {} is not a monitor spectrum ({})",
                    self.monitor_spectrum,
                    DetectorGrouping::Monitors.intervals()
                ),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReductionConfigError {
    #[error("failed to read reduction config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse reduction config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl From<ReductionConfigError> for ReductionError {
    fn from(error: ReductionConfigError) -> Self {
        match &error {
            ReductionConfigError::Read { .. } => {
                ReductionError::io_system("IO.CONFIG_READ", error.to_string())
            }
            ReductionConfigError::Parse { .. } => {
                ReductionError::input_validation("INPUT.CONFIG", error.to_string())
            }
        }
    }
}

pub fn load_reduction_config(
    config_path: impl AsRef<Path>,
) -> Result<ReductionConfig, ReductionConfigError> {
    let config_path = config_path.as_ref();
    let source =
        fs::read_to_string(config_path).map_err(|source| ReductionConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&source).map_err(|source| ReductionConfigError::Parse {
        path: config_path.to_path_buf(),
        source,
    })
}
