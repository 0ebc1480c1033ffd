//! In-memory time-of-flight workspaces.
//!
//! A [`Workspace`] is a named table of spectra, each row holding the X axis
//! (bin boundaries or points), counts `y` and errors `e`. Periods of a run are
//! kept as the members of a [`WorkspaceGroup`].

mod cells;
mod index;

pub use index::SpectrumIndex;

use crate::common::TofWindow;
use crate::domain::{ReductionError, ReductionResult};
use crate::numerics::bin_positions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Spectrum {
    pub spectrum_id: u32,
    pub x: Vec<f64>,
    #[serde(with = "cells")]
    pub y: Vec<f64>,
    /// Raw files may omit errors; loaders fill in counting statistics.
    #[serde(default, with = "cells")]
    pub e: Vec<f64>,
}

impl Spectrum {
    pub fn new(spectrum_id: u32, x: Vec<f64>, y: Vec<f64>, e: Vec<f64>) -> ReductionResult<Self> {
        let spectrum = Self {
            spectrum_id,
            x,
            y,
            e,
        };
        spectrum.validate()?;
        Ok(spectrum)
    }

    pub fn validate(&self) -> ReductionResult<()> {
        let axis_ok = self.x.len() == self.y.len() || self.x.len() == self.y.len() + 1;
        if !axis_ok || self.e.len() != self.y.len() {
            return Err(ReductionError::computation(
                "RUN.SHAPE_MISMATCH",
                format!(
                    "spectrum {} has inconsistent lengths: x={}, y={}, e={}",
                    self.spectrum_id,
                    self.x.len(),
                    self.y.len(),
                    self.e.len()
                ),
            ));
        }
        Ok(())
    }

    pub fn is_histogram(&self) -> bool {
        self.x.len() == self.y.len() + 1
    }

    pub fn bin_count(&self) -> usize {
        self.y.len()
    }

    pub fn scale(&mut self, factor: f64) {
        self.y.iter_mut().for_each(|value| *value *= factor);
        self.e.iter_mut().for_each(|error| *error *= factor.abs());
    }

    /// Keeps the bins lying entirely inside `window`.
    pub fn cropped(&self, window: TofWindow) -> Self {
        if self.is_histogram() {
            let kept = (0..self.y.len())
                .filter(|&bin| window.contains(self.x[bin]) && window.contains(self.x[bin + 1]))
                .collect::<Vec<_>>();
            let mut x = kept.iter().map(|&bin| self.x[bin]).collect::<Vec<_>>();
            if let Some(&last) = kept.last() {
                x.push(self.x[last + 1]);
            }
            Self {
                spectrum_id: self.spectrum_id,
                x,
                y: kept.iter().map(|&bin| self.y[bin]).collect(),
                e: kept.iter().map(|&bin| self.e[bin]).collect(),
            }
        } else {
            let kept = (0..self.y.len())
                .filter(|&point| window.contains(self.x[point]))
                .collect::<Vec<_>>();
            Self {
                spectrum_id: self.spectrum_id,
                x: kept.iter().map(|&point| self.x[point]).collect(),
                y: kept.iter().map(|&point| self.y[point]).collect(),
                e: kept.iter().map(|&point| self.e[point]).collect(),
            }
        }
    }

    pub fn positions(&self) -> Vec<f64> {
        bin_positions(&self.x, self.y.len()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Workspace {
    name: String,
    spectra: Vec<Spectrum>,
}

impl Workspace {
    pub fn new(name: impl Into<String>, spectra: Vec<Spectrum>) -> Self {
        Self {
            name: name.into(),
            spectra,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spectra(&self) -> &[Spectrum] {
        &self.spectra
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }

    pub fn spectrum(&self, workspace_index: usize) -> ReductionResult<&Spectrum> {
        self.spectra
            .get(workspace_index)
            .ok_or_else(|| self.index_error(workspace_index))
    }

    pub fn spectrum_mut(&mut self, workspace_index: usize) -> ReductionResult<&mut Spectrum> {
        let error = self.index_error(workspace_index);
        self.spectra.get_mut(workspace_index).ok_or(error)
    }

    fn index_error(&self, workspace_index: usize) -> ReductionError {
        ReductionError::internal(
            "SYS.WORKSPACE_INDEX",
            format!(
                "workspace index {} is out of range for '{}' with {} spectra",
                workspace_index,
                self.name,
                self.spectra.len()
            ),
        )
    }

    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spectra: self.spectra.clone(),
        }
    }

    pub fn validate(&self) -> ReductionResult<()> {
        self.spectra.iter().try_for_each(Spectrum::validate)
    }

    /// Bin-by-bin sum; errors add in quadrature. Layouts must match exactly.
    pub fn plus(&self, other: &Self, name: impl Into<String>) -> ReductionResult<Self> {
        self.ensure_same_layout(other)?;
        let spectra = self
            .spectra
            .iter()
            .zip(&other.spectra)
            .map(|(lhs, rhs)| Spectrum {
                spectrum_id: lhs.spectrum_id,
                x: lhs.x.clone(),
                y: lhs.y.iter().zip(&rhs.y).map(|(a, b)| a + b).collect(),
                e: lhs
                    .e
                    .iter()
                    .zip(&rhs.e)
                    .map(|(a, b)| a.hypot(*b))
                    .collect(),
            })
            .collect();
        Ok(Self::new(name, spectra))
    }

    /// Divides row `i` bin-by-bin by `divisors[i]`.
    pub fn divide_by_rows(&mut self, divisors: &[Vec<f64>]) -> ReductionResult<()> {
        if divisors.len() != self.spectra.len() {
            return Err(ReductionError::computation(
                "RUN.SHAPE_MISMATCH",
                format!(
                    "'{}' has {} spectra but {} divisor rows were given",
                    self.name,
                    self.spectra.len(),
                    divisors.len()
                ),
            ));
        }
        for (spectrum, divisor) in self.spectra.iter().zip(divisors) {
            if spectrum.y.len() != divisor.len() {
                return Err(ReductionError::computation(
                    "RUN.SHAPE_MISMATCH",
                    format!(
                        "spectrum {} of '{}' has {} bins but the divisor has {}",
                        spectrum.spectrum_id,
                        self.name,
                        spectrum.y.len(),
                        divisor.len()
                    ),
                ));
            }
        }

        for (spectrum, divisor) in self.spectra.iter_mut().zip(divisors) {
            for ((value, error), denominator) in
                spectrum.y.iter_mut().zip(&mut spectrum.e).zip(divisor)
            {
                *value /= denominator;
                *error /= denominator.abs();
            }
        }
        Ok(())
    }

    pub fn cropped(&self, window: TofWindow) -> Self {
        Self {
            name: self.name.clone(),
            spectra: self
                .spectra
                .iter()
                .map(|spectrum| spectrum.cropped(window))
                .collect(),
        }
    }

    fn ensure_same_layout(&self, other: &Self) -> ReductionResult<()> {
        let mismatch = |detail: String| {
            ReductionError::computation(
                "RUN.SHAPE_MISMATCH",
                format!(
                    "workspaces '{}' and '{}' differ: {}",
                    self.name, other.name, detail
                ),
            )
        };

        if self.spectra.len() != other.spectra.len() {
            return Err(mismatch(format!(
                "{} vs {} spectra",
                self.spectra.len(),
                other.spectra.len()
            )));
        }

        for (lhs, rhs) in self.spectra.iter().zip(&other.spectra) {
            if lhs.spectrum_id != rhs.spectrum_id {
                return Err(mismatch(format!(
                    "spectrum {} is paired with spectrum {}",
                    lhs.spectrum_id, rhs.spectrum_id
                )));
            }
            if lhs.y.len() != rhs.y.len() || lhs.x.len() != rhs.x.len() {
                return Err(mismatch(format!(
                    "spectrum {} has {} vs {} bins",
                    lhs.spectrum_id,
                    lhs.y.len(),
                    rhs.y.len()
                )));
            }
        }
        Ok(())
    }
}

/// Ordered workspaces, one per period.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkspaceGroup {
    name: String,
    members: Vec<Workspace>,
}

impl WorkspaceGroup {
    pub fn new(name: impl Into<String>, members: Vec<Workspace>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Workspace] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut [Workspace] {
        &mut self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member for a 1-based period number.
    pub fn period(&self, period: usize) -> ReductionResult<&Workspace> {
        period
            .checked_sub(1)
            .and_then(|index| self.members.get(index))
            .ok_or_else(|| {
                ReductionError::input_validation(
                    "INPUT.PERIOD_COUNT",
                    format!(
                        "period {} is not available in '{}' with {} periods",
                        period,
                        self.name,
                        self.members.len()
                    ),
                )
            })
    }

    pub fn renamed(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        let members = self
            .members
            .iter()
            .enumerate()
            .map(|(index, member)| member.renamed(format!("{}_{}", name, index + 1)))
            .collect();
        Self { name, members }
    }

    pub fn plus(&self, other: &Self, name: impl Into<String>) -> ReductionResult<Self> {
        if self.members.len() != other.members.len() {
            return Err(ReductionError::computation(
                "RUN.SHAPE_MISMATCH",
                format!(
                    "groups '{}' and '{}' have {} vs {} periods",
                    self.name,
                    other.name,
                    self.members.len(),
                    other.members.len()
                ),
            ));
        }

        let name = name.into();
        let members = self
            .members
            .iter()
            .zip(&other.members)
            .enumerate()
            .map(|(index, (lhs, rhs))| lhs.plus(rhs, format!("{}_{}", name, index + 1)))
            .collect::<ReductionResult<Vec<_>>>()?;
        Ok(Self { name, members })
    }
}

#[cfg(test)]
mod tests {
    use super::{Spectrum, Workspace, WorkspaceGroup};
    use crate::common::TofWindow;
    use crate::domain::ReductionErrorCategory;

    fn histogram(spectrum_id: u32, y: &[f64]) -> Spectrum {
        let x = (0..=y.len()).map(|bin| bin as f64 * 10.0).collect();
        Spectrum::new(spectrum_id, x, y.to_vec(), vec![1.0; y.len()])
            .expect("histogram should be valid")
    }

    #[test]
    fn spectrum_rejects_inconsistent_lengths() {
        let error = Spectrum::new(3, vec![0.0, 1.0], vec![1.0, 2.0, 3.0], vec![0.0; 3])
            .expect_err("short x axis should fail");
        assert_eq!(error.placeholder(), "RUN.SHAPE_MISMATCH");
        assert_eq!(error.category(), ReductionErrorCategory::ComputationError);
    }

    #[test]
    fn plus_adds_counts_and_combines_errors_in_quadrature() {
        let lhs = Workspace::new("lhs", vec![histogram(3, &[1.0, 2.0])]);
        let mut rhs = Workspace::new("rhs", vec![histogram(3, &[10.0, 20.0])]);
        rhs.spectrum_mut(0).expect("row exists").e = vec![0.0, 3.0_f64.sqrt()];

        let sum = lhs.plus(&rhs, "sum").expect("layouts match");
        let row = sum.spectrum(0).expect("row exists");
        assert_eq!(sum.name(), "sum");
        assert_eq!(row.y, vec![11.0, 22.0]);
        assert!((row.e[0] - 1.0).abs() < 1.0e-12);
        assert!((row.e[1] - 2.0).abs() < 1.0e-12);
    }

    #[test]
    fn plus_rejects_mismatched_layouts() {
        let lhs = Workspace::new("lhs", vec![histogram(3, &[1.0, 2.0])]);
        let rhs = Workspace::new("rhs", vec![histogram(4, &[1.0, 2.0])]);
        let error = lhs.plus(&rhs, "sum").expect_err("ids differ");
        assert!(error.message().contains("spectrum 3 is paired with spectrum 4"));
    }

    #[test]
    fn divide_by_rows_scales_each_row_by_its_own_divisor() {
        let mut workspace = Workspace::new(
            "ws",
            vec![histogram(3, &[8.0, 9.0]), histogram(4, &[8.0, 9.0])],
        );
        workspace
            .divide_by_rows(&[vec![2.0, 3.0], vec![4.0, 9.0]])
            .expect("shapes match");
        assert_eq!(workspace.spectrum(0).expect("row").y, vec![4.0, 3.0]);
        assert_eq!(workspace.spectrum(0).expect("row").e, vec![0.5, 1.0 / 3.0]);
        assert_eq!(workspace.spectrum(1).expect("row").y, vec![2.0, 1.0]);

        assert!(workspace.divide_by_rows(&[vec![1.0, 1.0]]).is_err());
        assert!(workspace.divide_by_rows(&[vec![1.0], vec![1.0, 1.0]]).is_err());
    }

    #[test]
    fn crop_keeps_bins_inside_window() {
        let spectrum = histogram(5, &[1.0, 2.0, 3.0, 4.0]);
        let cropped = spectrum.cropped(TofWindow::new(10.0, 30.0));
        assert_eq!(cropped.x, vec![10.0, 20.0, 30.0]);
        assert_eq!(cropped.y, vec![2.0, 3.0]);

        let points = Spectrum::new(6, vec![0.0, 5.0, 10.0], vec![1.0, 2.0, 3.0], vec![0.0; 3])
            .expect("point data");
        assert_eq!(points.cropped(TofWindow::new(4.0, 10.0)).y, vec![2.0, 3.0]);
    }

    #[test]
    fn group_periods_are_one_based() {
        let group = WorkspaceGroup::new(
            "run",
            vec![
                Workspace::new("p1", vec![histogram(3, &[1.0])]),
                Workspace::new("p2", vec![histogram(3, &[2.0])]),
            ],
        );
        assert_eq!(group.period(1).expect("period 1").name(), "p1");
        assert_eq!(group.period(2).expect("period 2").name(), "p2");
        assert!(group.period(0).is_err());
        assert_eq!(
            group.period(3).expect_err("no period 3").placeholder(),
            "INPUT.PERIOD_COUNT"
        );

        let renamed = group.renamed("summed");
        assert_eq!(renamed.members()[1].name(), "summed_2");
    }
}
