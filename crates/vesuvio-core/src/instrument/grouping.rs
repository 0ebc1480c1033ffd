use crate::common::IntervalSet;
use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

/// Highest spectrum ID wired on the instrument.
pub const LAST_SPECTRUM_ID: u32 = 198;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DetectorGrouping {
    Monitors,
    Backward1,
    Backward2,
    Backward3,
    ForwardA,
    ForwardB,
}

/// Physical detector bank; selects the integration window and difference formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorBank {
    Backward,
    Forward,
}

struct DetectorCatalog {
    monitors: IntervalSet,
    backward_1: IntervalSet,
    backward_2: IntervalSet,
    backward_3: IntervalSet,
    forward_a: IntervalSet,
    forward_b: IntervalSet,
    backward: IntervalSet,
    forward: IntervalSet,
    any: IntervalSet,
}

impl DetectorCatalog {
    fn build() -> Self {
        match Self::try_build() {
            Ok(catalog) => catalog,
            Err(reason) => panic!("detector grouping tables are inconsistent: {reason}"),
        }
    }

    fn try_build() -> Result<Self, String> {
        let table = |ranges: &[(u32, u32)]| {
            IntervalSet::from_ranges(ranges.iter().copied()).map_err(|error| error.to_string())
        };

        let monitors = table(&[(1, 2)])?;
        let backward_1 = table(&[(3, 46)])?;
        let backward_2 = table(&[(47, 90)])?;
        let backward_3 = table(&[(91, 134)])?;
        let forward_a = table(&[(135, 142), (151, 158), (167, 174), (183, 190)])?;
        let forward_b = table(&[(143, 150), (159, 166), (175, 182), (191, 198)])?;
        let backward = backward_1.union(&backward_2).union(&backward_3);
        let forward = forward_a.union(&forward_b);
        let any = monitors.union(&backward).union(&forward);

        let catalog = Self {
            monitors,
            backward_1,
            backward_2,
            backward_3,
            forward_a,
            forward_b,
            backward,
            forward,
            any,
        };
        catalog.verify_partition()?;
        Ok(catalog)
    }

    fn primitive(&self, grouping: DetectorGrouping) -> &IntervalSet {
        match grouping {
            DetectorGrouping::Monitors => &self.monitors,
            DetectorGrouping::Backward1 => &self.backward_1,
            DetectorGrouping::Backward2 => &self.backward_2,
            DetectorGrouping::Backward3 => &self.backward_3,
            DetectorGrouping::ForwardA => &self.forward_a,
            DetectorGrouping::ForwardB => &self.forward_b,
        }
    }

    /// Every spectrum in `1..=LAST_SPECTRUM_ID` must sit in exactly one primitive grouping.
    fn verify_partition(&self) -> Result<(), String> {
        let groupings = DetectorGrouping::PRIMITIVE;
        for (position, &lhs) in groupings.iter().enumerate() {
            for &rhs in &groupings[position + 1..] {
                if self.primitive(lhs).intersects(self.primitive(rhs)) {
                    return Err(format!("{lhs} overlaps {rhs}"));
                }
            }
        }

        let expected = IntervalSet::from_ranges([(1, LAST_SPECTRUM_ID)])
            .map_err(|error| error.to_string())?;
        if self.any != expected {
            return Err(format!("groupings cover {} instead of {expected}", self.any));
        }
        Ok(())
    }
}

fn catalog() -> &'static DetectorCatalog {
    static CATALOG: OnceLock<DetectorCatalog> = OnceLock::new();
    CATALOG.get_or_init(DetectorCatalog::build)
}

impl DetectorGrouping {
    pub const PRIMITIVE: [Self; 6] = [
        Self::Monitors,
        Self::Backward1,
        Self::Backward2,
        Self::Backward3,
        Self::ForwardA,
        Self::ForwardB,
    ];

    /// Groupings that carry foil-period tables.
    pub const DETECTORS: [Self; 5] = [
        Self::Backward1,
        Self::Backward2,
        Self::Backward3,
        Self::ForwardA,
        Self::ForwardB,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monitors => "MONITORS",
            Self::Backward1 => "BACKWARD_1",
            Self::Backward2 => "BACKWARD_2",
            Self::Backward3 => "BACKWARD_3",
            Self::ForwardA => "FORWARD_A",
            Self::ForwardB => "FORWARD_B",
        }
    }

    pub fn intervals(self) -> &'static IntervalSet {
        catalog().primitive(self)
    }

    pub fn contains(self, spectrum_id: u32) -> bool {
        self.intervals().contains(spectrum_id)
    }

    /// The unique primitive grouping holding `spectrum_id`, if any.
    pub fn classify(spectrum_id: u32) -> Option<Self> {
        Self::PRIMITIVE
            .into_iter()
            .find(|grouping| grouping.contains(spectrum_id))
    }

    pub const fn bank(self) -> Option<DetectorBank> {
        match self {
            Self::Monitors => None,
            Self::Backward1 | Self::Backward2 | Self::Backward3 => Some(DetectorBank::Backward),
            Self::ForwardA | Self::ForwardB => Some(DetectorBank::Forward),
        }
    }
}

impl Display for DetectorGrouping {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl DetectorBank {
    pub fn of(spectrum_id: u32) -> Option<Self> {
        if backward_spectra().contains(spectrum_id) {
            Some(Self::Backward)
        } else if forward_spectra().contains(spectrum_id) {
            Some(Self::Forward)
        } else {
            None
        }
    }

    pub fn spectra(self) -> &'static IntervalSet {
        match self {
            Self::Backward => backward_spectra(),
            Self::Forward => forward_spectra(),
        }
    }
}

pub fn monitor_spectra() -> &'static IntervalSet {
    &catalog().monitors
}

pub fn backward_spectra() -> &'static IntervalSet {
    &catalog().backward
}

pub fn forward_spectra() -> &'static IntervalSet {
    &catalog().forward
}

/// Every spectrum wired on the instrument, monitors included.
pub fn all_spectra() -> &'static IntervalSet {
    &catalog().any
}

/// Spectra that can be reduced: backward and forward detectors.
pub fn detector_spectra() -> IntervalSet {
    backward_spectra().union(forward_spectra())
}

#[cfg(test)]
mod tests {
    use super::{
        DetectorBank, DetectorCatalog, DetectorGrouping, LAST_SPECTRUM_ID, all_spectra,
        backward_spectra, forward_spectra, monitor_spectra,
    };

    #[test]
    fn catalog_tables_build_and_verify() {
        let catalog = DetectorCatalog::try_build().expect("literal tables should be consistent");
        assert_eq!(catalog.any.ranges(), &[(1, LAST_SPECTRUM_ID)]);
        catalog
            .verify_partition()
            .expect("groupings should partition every spectrum");
    }

    #[test]
    fn primitive_groupings_partition_every_spectrum() {
        for spectrum_id in 1..=LAST_SPECTRUM_ID {
            let owners = DetectorGrouping::PRIMITIVE
                .into_iter()
                .filter(|grouping| grouping.contains(spectrum_id))
                .count();
            assert_eq!(owners, 1, "spectrum {spectrum_id} has {owners} owners");
        }
        assert_eq!(DetectorGrouping::classify(0), None);
        assert_eq!(DetectorGrouping::classify(LAST_SPECTRUM_ID + 1), None);
    }

    #[test]
    fn catalog_ranges_match_instrument_wiring() {
        assert_eq!(monitor_spectra().ranges(), &[(1, 2)]);
        assert_eq!(DetectorGrouping::Backward1.intervals().ranges(), &[(3, 46)]);
        assert_eq!(DetectorGrouping::Backward2.intervals().ranges(), &[(47, 90)]);
        assert_eq!(DetectorGrouping::Backward3.intervals().ranges(), &[(91, 134)]);
        assert_eq!(
            DetectorGrouping::ForwardA.intervals().ranges(),
            &[(135, 142), (151, 158), (167, 174), (183, 190)]
        );
        assert_eq!(
            DetectorGrouping::ForwardB.intervals().ranges(),
            &[(143, 150), (159, 166), (175, 182), (191, 198)]
        );
        assert_eq!(backward_spectra().ranges(), &[(3, 134)]);
        assert_eq!(forward_spectra().ranges(), &[(135, 198)]);
        assert_eq!(all_spectra().ranges(), &[(1, 198)]);
    }

    #[test]
    fn classification_resolves_groupings_and_banks() {
        assert_eq!(DetectorGrouping::classify(2), Some(DetectorGrouping::Monitors));
        assert_eq!(DetectorGrouping::classify(10), Some(DetectorGrouping::Backward1));
        assert_eq!(DetectorGrouping::classify(90), Some(DetectorGrouping::Backward2));
        assert_eq!(DetectorGrouping::classify(143), Some(DetectorGrouping::ForwardB));
        assert_eq!(DetectorGrouping::classify(151), Some(DetectorGrouping::ForwardA));

        assert_eq!(DetectorBank::of(1), None);
        assert_eq!(DetectorBank::of(134), Some(DetectorBank::Backward));
        assert_eq!(DetectorBank::of(135), Some(DetectorBank::Forward));
        assert_eq!(DetectorGrouping::Monitors.bank(), None);
        assert_eq!(
            DetectorGrouping::ForwardB.bank(),
            Some(DetectorBank::Forward)
        );
    }
}
