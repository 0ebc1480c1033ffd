//! Static description of the Vesuvio detector wiring and foil chopper sequence.

mod foil;
mod grouping;

pub use foil::{Foil, FoilMap, GroupingMap, PERIOD_COUNT, PeriodPair, foil_periods};
pub use grouping::{
    DetectorBank, DetectorGrouping, LAST_SPECTRUM_ID, all_spectra, backward_spectra,
    detector_spectra, forward_spectra, monitor_spectra,
};
