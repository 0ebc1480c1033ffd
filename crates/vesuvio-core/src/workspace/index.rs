use super::Workspace;
use crate::domain::{ReductionError, ReductionResult};
use std::collections::HashMap;

/// Spectrum ID <-> workspace index resolver built from one scan of a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrumIndex {
    workspace_name: String,
    spectrum_ids: Vec<u32>,
    by_spectrum: HashMap<u32, usize>,
}

impl SpectrumIndex {
    pub fn build(workspace: &Workspace) -> Self {
        let spectrum_ids = workspace
            .spectra()
            .iter()
            .map(|spectrum| spectrum.spectrum_id)
            .collect::<Vec<_>>();
        let mut by_spectrum = HashMap::with_capacity(spectrum_ids.len());
        for (workspace_index, &spectrum_id) in spectrum_ids.iter().enumerate() {
            // first occurrence wins for duplicated IDs
            by_spectrum.entry(spectrum_id).or_insert(workspace_index);
        }

        Self {
            workspace_name: workspace.name().to_string(),
            spectrum_ids,
            by_spectrum,
        }
    }

    pub fn workspace_name(&self) -> &str {
        &self.workspace_name
    }

    pub fn len(&self) -> usize {
        self.spectrum_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectrum_ids.is_empty()
    }

    pub fn workspace_index(&self, spectrum_id: u32) -> ReductionResult<usize> {
        self.by_spectrum.get(&spectrum_id).copied().ok_or_else(|| {
            ReductionError::input_validation(
                "INPUT.SPECTRUM_NOT_FOUND",
                format!(
                    "spectrum {} was not found in workspace '{}'",
                    spectrum_id, self.workspace_name
                ),
            )
        })
    }

    pub fn spectrum_id(&self, workspace_index: usize) -> Option<u32> {
        self.spectrum_ids.get(workspace_index).copied()
    }
}
