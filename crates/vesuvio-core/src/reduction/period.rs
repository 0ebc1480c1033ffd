use crate::common::IntervalSet;
use crate::domain::{ReductionError, ReductionResult};
use crate::instrument::{Foil, FoilMap, GroupingMap, PERIOD_COUNT};
use crate::workspace::{SpectrumIndex, WorkspaceGroup};
use std::collections::BTreeMap;
use tracing::debug;

/// 1-based period numbers to sum for each foil state.
pub type PeriodMapping = FoilMap<&'static [usize]>;

/// Resolves every requested spectrum to the periods holding each foil state.
///
/// Built once per reduction from period 1 of the run group, which stands in
/// for the layout of every period.
#[derive(Debug, Clone)]
pub struct PeriodManager {
    index: SpectrumIndex,
    mappings: BTreeMap<usize, PeriodMapping>,
    monitor_mappings: BTreeMap<usize, PeriodMapping>,
}

impl PeriodManager {
    pub fn new(periods: &WorkspaceGroup, spectra: &IntervalSet) -> ReductionResult<Self> {
        if periods.len() != PERIOD_COUNT {
            return Err(ReductionError::input_validation(
                "INPUT.PERIOD_COUNT",
                format!(
                    "'{}' has {} periods but the foil sequence needs {}",
                    periods.name(),
                    periods.len(),
                    PERIOD_COUNT
                ),
            ));
        }
        ensure_identical_layout(periods)?;

        let index = SpectrumIndex::build(periods.period(1)?);
        let mut mappings = BTreeMap::new();
        let mut monitor_mappings = BTreeMap::new();

        for spectrum_id in spectra.iter() {
            let workspace_index = index.workspace_index(spectrum_id)?;
            let pairs =
                FoilMap::try_from_fn(|foil| GroupingMap::for_foil(foil).lookup(spectrum_id))?;

            let mapping = FoilMap::from_fn(|foil| pairs[foil].spectra);
            let monitor_mapping = FoilMap::from_fn(|foil| pairs[foil].monitors);
            debug!(
                spectrum_id,
                workspace_index,
                out = ?mapping[Foil::Out],
                thin = ?mapping[Foil::Thin],
                thick = ?mapping[Foil::Thick],
                "resolved foil periods"
            );

            mappings.insert(workspace_index, mapping);
            monitor_mappings.insert(workspace_index, monitor_mapping);
        }

        Ok(Self {
            index,
            mappings,
            monitor_mappings,
        })
    }

    pub fn mappings(&self) -> &BTreeMap<usize, PeriodMapping> {
        &self.mappings
    }

    pub fn monitor_mappings(&self) -> &BTreeMap<usize, PeriodMapping> {
        &self.monitor_mappings
    }

    /// Workspace indices of the requested spectra, ascending.
    pub fn workspace_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.mappings.keys().copied()
    }

    pub fn spectrum_index(&self) -> &SpectrumIndex {
        &self.index
    }

    pub fn spectrum_id(&self, workspace_index: usize) -> ReductionResult<u32> {
        self.index.spectrum_id(workspace_index).ok_or_else(|| {
            ReductionError::internal(
                "SYS.WORKSPACE_INDEX",
                format!(
                    "workspace index {} is out of range for '{}'",
                    workspace_index,
                    self.index.workspace_name()
                ),
            )
        })
    }
}

fn ensure_identical_layout(periods: &WorkspaceGroup) -> ReductionResult<()> {
    let reference = periods.period(1)?;
    for member in &periods.members()[1..] {
        let same_ids = member.len() == reference.len()
            && member
                .spectra()
                .iter()
                .zip(reference.spectra())
                .all(|(lhs, rhs)| lhs.spectrum_id == rhs.spectrum_id);
        if !same_ids {
            return Err(ReductionError::computation(
                "RUN.SHAPE_MISMATCH",
                format!(
                    "period workspace '{}' does not share the spectrum layout of '{}'",
                    member.name(),
                    reference.name()
                ),
            ));
        }
    }
    Ok(())
}
