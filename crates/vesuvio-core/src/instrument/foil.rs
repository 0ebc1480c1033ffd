//! Foil states and the chopper period sequence that realises them.

use super::grouping::DetectorGrouping;
use crate::domain::{ReductionError, ReductionResult};
use std::fmt::{Display, Formatter};
use std::ops::{Index, IndexMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Foil {
    Out,
    Thin,
    Thick,
}

impl Foil {
    pub const IN: [Self; 2] = [Self::Thin, Self::Thick];
    pub const ANY: [Self; 3] = [Self::Out, Self::Thin, Self::Thick];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Out => "Out",
            Self::Thin => "Thin",
            Self::Thick => "Thick",
        }
    }
}

impl Display for Foil {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// One value per foil state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FoilMap<T> {
    pub out: T,
    pub thin: T,
    pub thick: T,
}

impl<T> FoilMap<T> {
    pub fn from_fn(mut build: impl FnMut(Foil) -> T) -> Self {
        Self {
            out: build(Foil::Out),
            thin: build(Foil::Thin),
            thick: build(Foil::Thick),
        }
    }

    pub fn try_from_fn<E>(mut build: impl FnMut(Foil) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            out: build(Foil::Out)?,
            thin: build(Foil::Thin)?,
            thick: build(Foil::Thick)?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Foil, &T)> {
        Foil::ANY.into_iter().map(move |foil| (foil, &self[foil]))
    }
}

impl<T> Index<Foil> for FoilMap<T> {
    type Output = T;

    fn index(&self, foil: Foil) -> &T {
        match foil {
            Foil::Out => &self.out,
            Foil::Thin => &self.thin,
            Foil::Thick => &self.thick,
        }
    }
}

impl<T> IndexMut<Foil> for FoilMap<T> {
    fn index_mut(&mut self, foil: Foil) -> &mut T {
        match foil {
            Foil::Out => &mut self.out,
            Foil::Thin => &mut self.thin,
            Foil::Thick => &mut self.thick,
        }
    }
}

/// Number of periods in one Vesuvio run.
pub const PERIOD_COUNT: usize = 6;

/// 1-based period numbers for a grouping's spectra and for its monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodPair {
    pub spectra: &'static [usize],
    pub monitors: &'static [usize],
}

const fn pair(spectra: &'static [usize], monitors: &'static [usize]) -> Option<PeriodPair> {
    Some(PeriodPair { spectra, monitors })
}

/// Chopper timing sequence: which periods had `foil` in the beam for `grouping`.
///
/// Only BACKWARD_1/Out and FORWARD_A/Thin are fixed by the instrument's
/// documented sequence. Every other entry is a configuration assumption that
/// follows the same pattern: the backward banks see each foil state for two
/// consecutive periods, rotated by two periods from bank to bank, and the
/// forward banks alternate foil in and foil out on odd and even periods, with
/// Thick repeating the Out sequence.
pub const fn foil_periods(foil: Foil, grouping: DetectorGrouping) -> Option<PeriodPair> {
    use DetectorGrouping::{Backward1, Backward2, Backward3, ForwardA, ForwardB, Monitors};

    match (foil, grouping) {
        (_, Monitors) => None,

        (Foil::Out, Backward1) => pair(&[3, 4], &[3, 4]),
        (Foil::Out, Backward2) => pair(&[5, 6], &[5, 6]),
        (Foil::Out, Backward3) => pair(&[1, 2], &[1, 2]),
        (Foil::Out, ForwardA) => pair(&[2, 4, 6], &[1, 3]),
        (Foil::Out, ForwardB) => pair(&[1, 3, 5], &[4, 6]),

        (Foil::Thin, Backward1) => pair(&[1, 2], &[1, 2]),
        (Foil::Thin, Backward2) => pair(&[3, 4], &[3, 4]),
        (Foil::Thin, Backward3) => pair(&[5, 6], &[5, 6]),
        (Foil::Thin, ForwardA) => pair(&[1, 3, 5], &[5, 2]),
        (Foil::Thin, ForwardB) => pair(&[2, 4, 6], &[3, 1]),

        (Foil::Thick, Backward1) => pair(&[5, 6], &[5, 6]),
        (Foil::Thick, Backward2) => pair(&[1, 2], &[1, 2]),
        (Foil::Thick, Backward3) => pair(&[3, 4], &[3, 4]),
        (Foil::Thick, ForwardA) => pair(&[2, 4, 6], &[1, 3]),
        (Foil::Thick, ForwardB) => pair(&[1, 3, 5], &[4, 6]),
    }
}

/// Foil-period table for one foil state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingMap {
    foil: Foil,
}

impl GroupingMap {
    pub const fn for_foil(foil: Foil) -> Self {
        Self { foil }
    }

    pub const fn foil(&self) -> Foil {
        self.foil
    }

    pub fn entries(&self) -> impl Iterator<Item = (DetectorGrouping, PeriodPair)> + '_ {
        DetectorGrouping::DETECTORS
            .into_iter()
            .filter_map(|grouping| foil_periods(self.foil, grouping).map(|pair| (grouping, pair)))
    }

    /// Periods of the grouping that owns `spectrum_id`.
    ///
    /// Groupings are disjoint, so the answer does not depend on scan order.
    pub fn lookup(&self, spectrum_id: u32) -> ReductionResult<PeriodPair> {
        DetectorGrouping::classify(spectrum_id)
            .and_then(|grouping| foil_periods(self.foil, grouping))
            .ok_or_else(|| {
                ReductionError::input_validation(
                    "INPUT.SPECTRUM_NOT_MAPPED",
                    format!(
                        "spectrum {spectrum_id} does not belong to any detector grouping of the {} foil table",
                        self.foil
                    ),
                )
            })
    }
}
