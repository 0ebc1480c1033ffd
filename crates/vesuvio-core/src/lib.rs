//! Foil-state period mapping and differencing for the Vesuvio spectrometer.

pub mod common;
pub mod domain;
pub mod instrument;
pub mod numerics;
pub mod reduction;
pub mod runs;
pub mod serialization;
pub mod workspace;

pub use domain::{ReductionError, ReductionErrorCategory, ReductionRequest, ReductionResult};
pub use reduction::VesuvioReduction;
