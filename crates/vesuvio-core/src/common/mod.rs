pub mod config;
pub mod intervals;

pub use config::{ReductionConfig, ReductionConfigError, TofWindow, load_reduction_config};
pub use intervals::{IntervalError, IntervalSet};
