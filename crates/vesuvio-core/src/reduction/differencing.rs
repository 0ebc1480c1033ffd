//! Foil-state period summation, normalisation and single/double differencing.

use super::period::PeriodManager;
use crate::common::{IntervalSet, ReductionConfig, TofWindow};
use crate::domain::{ReductionError, ReductionResult};
use crate::instrument::{DetectorBank, Foil, FoilMap};
use crate::numerics::{bin_widths, integrate_window, quadrature_sum, stable_sum};
use crate::runs::LoadedRun;
use crate::workspace::{Spectrum, SpectrumIndex, Workspace, WorkspaceGroup};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Per-foil working copies of the run, one for detector spectra and one for
/// the monitor counts that normalise them. Row `i` of either workspace belongs
/// to workspace index `i` of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct FoilAccumulators {
    pub spectra: FoilMap<Workspace>,
    pub monitors: FoilMap<Workspace>,
}

/// Integrated spectrum intensity per `(workspace index, foil)`.
pub type IntensityMap = BTreeMap<(usize, Foil), f64>;

/// Runs the full differencing of a loaded (and run-summed) period group.
pub fn difference_foil_states(
    run: LoadedRun,
    spectra: &IntervalSet,
    beta: f64,
    config: &ReductionConfig,
    output_name: &str,
) -> ReductionResult<Workspace> {
    let LoadedRun {
        spectra: mut periods,
        monitors: mut monitor_periods,
    } = run;

    let manager = PeriodManager::new(&periods, spectra)?;
    let template = periods.period(1)?.clone();
    let monitor_index = SpectrumIndex::build(monitor_periods.period(1)?)
        .workspace_index(config.monitor_spectrum)?;

    info!(
        run = periods.name(),
        spectra = manager.mappings().len(),
        "cloning foil accumulators"
    );
    let mut accumulators = clone_accumulators(&template);

    info!("normalising periods by bin width");
    normalise_by_bin_width(&mut periods, &mut monitor_periods)?;

    info!("summing periods per foil state");
    sum_periods(
        &manager,
        &periods,
        &monitor_periods,
        monitor_index,
        &mut accumulators,
    )?;
    drop(periods);
    drop(monitor_periods);

    info!("normalising by monitor and foil-out intensity");
    normalise_by_monitor(&manager, &mut accumulators, config)?;
    let intensities = integrate_intensities(&manager, &accumulators, config)?;
    cross_normalise(&manager, &mut accumulators, &intensities)?;

    info!(beta, output = output_name, "differencing foil states");
    difference(&manager, &accumulators, &template, beta, output_name)
}

pub fn clone_accumulators(template: &Workspace) -> FoilAccumulators {
    FoilAccumulators {
        spectra: FoilMap::from_fn(|foil| template.renamed(format!("__{foil}"))),
        monitors: FoilMap::from_fn(|foil| template.renamed(format!("__{foil}_monitors"))),
    }
}

/// Divides every period row by the bin widths of the same row in period 1,
/// turning counts per bin into counts per microsecond. Monitor periods use the
/// axes of monitor period 1.
pub fn normalise_by_bin_width(
    periods: &mut WorkspaceGroup,
    monitor_periods: &mut WorkspaceGroup,
) -> ReductionResult<()> {
    divide_by_reference_widths(periods)?;
    divide_by_reference_widths(monitor_periods)
}

fn divide_by_reference_widths(group: &mut WorkspaceGroup) -> ReductionResult<()> {
    let reference = group.period(1)?;
    let widths = reference
        .spectra()
        .iter()
        .map(|spectrum| {
            if spectrum.is_histogram() {
                Ok(bin_widths(&spectrum.x))
            } else {
                Err(ReductionError::computation(
                    "RUN.SHAPE_MISMATCH",
                    format!(
                        "spectrum {} of '{}' is point data; bin widths need histogram boundaries",
                        spectrum.spectrum_id,
                        reference.name()
                    ),
                ))
            }
        })
        .collect::<ReductionResult<Vec<_>>>()?;

    for workspace in group.members_mut() {
        workspace.divide_by_rows(&widths)?;
    }
    Ok(())
}

/// Sums the mapped periods of every requested spectrum, and of the monitor
/// row, into the accumulator of each foil state.
pub fn sum_periods(
    manager: &PeriodManager,
    periods: &WorkspaceGroup,
    monitor_periods: &WorkspaceGroup,
    monitor_index: usize,
    accumulators: &mut FoilAccumulators,
) -> ReductionResult<()> {
    for (&workspace_index, mapping) in manager.mappings() {
        let monitor_mapping = &manager.monitor_mappings()[&workspace_index];
        for foil in Foil::ANY {
            let (y, e) = sum_period_rows(periods, mapping[foil], workspace_index)?;
            let target = accumulators.spectra[foil].spectrum_mut(workspace_index)?;
            target.y = y;
            target.e = e;

            let monitor_x = monitor_periods
                .period(1)?
                .spectrum(monitor_index)?
                .x
                .clone();
            let (y, e) = sum_period_rows(monitor_periods, monitor_mapping[foil], monitor_index)?;
            let target = accumulators.monitors[foil].spectrum_mut(workspace_index)?;
            target.x = monitor_x;
            target.y = y;
            target.e = e;
        }
    }
    Ok(())
}

fn sum_period_rows(
    group: &WorkspaceGroup,
    period_numbers: &[usize],
    workspace_index: usize,
) -> ReductionResult<(Vec<f64>, Vec<f64>)> {
    let rows = period_numbers
        .iter()
        .map(|&period| group.period(period)?.spectrum(workspace_index))
        .collect::<ReductionResult<Vec<&Spectrum>>>()?;
    let bins = rows.first().map_or(0, |row| row.bin_count());
    if let Some(row) = rows.iter().find(|row| row.bin_count() != bins) {
        return Err(ReductionError::computation(
            "RUN.SHAPE_MISMATCH",
            format!(
                "spectrum {} has {} bins in one period of '{}' and {} in another",
                row.spectrum_id,
                row.bin_count(),
                group.name(),
                bins
            ),
        ));
    }

    let y = (0..bins)
        .map(|bin| stable_sum(rows.iter().map(|row| row.y[bin])))
        .collect();
    let e = (0..bins)
        .map(|bin| quadrature_sum(rows.iter().map(|row| row.e[bin])))
        .collect();
    Ok((y, e))
}

/// Scales each spectrum by `monitor_scale / monitor integral`; a zero monitor
/// integral is replaced by `zero_monitor_epsilon`.
pub fn normalise_by_monitor(
    manager: &PeriodManager,
    accumulators: &mut FoilAccumulators,
    config: &ReductionConfig,
) -> ReductionResult<()> {
    for workspace_index in manager.workspace_indices() {
        for foil in Foil::ANY {
            let monitor = accumulators.monitors[foil].spectrum(workspace_index)?;
            let mut monitor_sum = window_integral(monitor, config.monitor_window)?;
            if monitor_sum == 0.0 {
                warn!(
                    workspace_index,
                    foil = foil.as_str(),
                    epsilon = config.zero_monitor_epsilon,
                    "monitor integral is zero; substituting epsilon"
                );
                monitor_sum = config.zero_monitor_epsilon;
            }

            accumulators.spectra[foil]
                .spectrum_mut(workspace_index)?
                .scale(config.monitor_scale / monitor_sum);
        }
    }
    Ok(())
}

/// Integrates every accumulator spectrum over its bank's reference window.
pub fn integrate_intensities(
    manager: &PeriodManager,
    accumulators: &FoilAccumulators,
    config: &ReductionConfig,
) -> ReductionResult<IntensityMap> {
    let mut intensities = IntensityMap::new();
    for workspace_index in manager.workspace_indices() {
        let spectrum_id = manager.spectrum_id(workspace_index)?;
        let window = match DetectorBank::of(spectrum_id) {
            Some(DetectorBank::Backward) => config.backward_window,
            Some(DetectorBank::Forward) => config.forward_window,
            None => {
                return Err(ReductionError::internal(
                    "SYS.DETECTOR_CLASSIFICATION",
                    format!(
                        "spectrum {spectrum_id} at workspace index {workspace_index} is neither a backward nor a forward detector"
                    ),
                ));
            }
        };

        for foil in Foil::ANY {
            let spectrum = accumulators.spectra[foil].spectrum(workspace_index)?;
            intensities.insert((workspace_index, foil), window_integral(spectrum, window)?);
        }
    }
    Ok(intensities)
}

/// Rescales Thin and Thick spectra to the integrated intensity of Out.
///
/// A zero intensity is not guarded; the resulting non-finite values are kept.
pub fn cross_normalise(
    manager: &PeriodManager,
    accumulators: &mut FoilAccumulators,
    intensities: &IntensityMap,
) -> ReductionResult<()> {
    for foil in Foil::IN {
        for workspace_index in manager.workspace_indices() {
            let out = intensity(intensities, workspace_index, Foil::Out)?;
            let factor = out / intensity(intensities, workspace_index, foil)?;
            if !factor.is_finite() {
                warn!(
                    workspace_index,
                    foil = foil.as_str(),
                    factor,
                    "non-finite foil-state normalisation factor"
                );
            }
            accumulators.spectra[foil]
                .spectrum_mut(workspace_index)?
                .scale(factor);
        }
    }
    Ok(())
}

fn intensity(intensities: &IntensityMap, workspace_index: usize, foil: Foil) -> ReductionResult<f64> {
    intensities
        .get(&(workspace_index, foil))
        .copied()
        .ok_or_else(|| {
            ReductionError::internal(
                "SYS.INTENSITY_MISSING",
                format!("no integrated intensity for workspace index {workspace_index} ({foil})"),
            )
        })
}

/// Backward detectors: `out * (1 - beta) - thin + beta * thick`.
/// Forward detectors: `thin - out`.
pub fn difference(
    manager: &PeriodManager,
    accumulators: &FoilAccumulators,
    template: &Workspace,
    beta: f64,
    output_name: &str,
) -> ReductionResult<Workspace> {
    let mut output = template.renamed(output_name);
    for workspace_index in manager.workspace_indices() {
        // resolved per index so the bank can never leak between iterations
        let spectrum_id = manager.spectrum_id(workspace_index)?;
        let out = accumulators.spectra[Foil::Out].spectrum(workspace_index)?;
        let thin = accumulators.spectra[Foil::Thin].spectrum(workspace_index)?;
        let thick = accumulators.spectra[Foil::Thick].spectrum(workspace_index)?;

        let (y, e): (Vec<f64>, Vec<f64>) = match DetectorBank::of(spectrum_id) {
            Some(DetectorBank::Backward) => (0..out.bin_count())
                .map(|bin| {
                    let value = out.y[bin] * (1.0 - beta) - thin.y[bin] + beta * thick.y[bin];
                    let error = quadrature_sum([
                        (1.0 - beta) * out.e[bin],
                        thin.e[bin],
                        beta * thick.e[bin],
                    ]);
                    (value, error)
                })
                .unzip(),
            Some(DetectorBank::Forward) => (0..out.bin_count())
                .map(|bin| (thin.y[bin] - out.y[bin], thin.e[bin].hypot(out.e[bin])))
                .unzip(),
            None => {
                debug!(spectrum_id, "spectrum outside both banks left unchanged");
                continue;
            }
        };

        let target = output.spectrum_mut(workspace_index)?;
        target.y = y;
        target.e = e;
    }
    Ok(output)
}

fn window_integral(spectrum: &Spectrum, window: TofWindow) -> ReductionResult<f64> {
    integrate_window(&spectrum.x, &spectrum.y, window).ok_or_else(|| {
        ReductionError::computation(
            "RUN.SHAPE_MISMATCH",
            format!(
                "spectrum {} has {} x values for {} counts",
                spectrum.spectrum_id,
                spectrum.x.len(),
                spectrum.y.len()
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::{
        clone_accumulators, cross_normalise, difference, difference_foil_states,
        integrate_intensities, normalise_by_bin_width, normalise_by_monitor, sum_periods,
    };
    use crate::common::{IntervalSet, ReductionConfig};
    use crate::instrument::{Foil, PERIOD_COUNT};
    use crate::reduction::PeriodManager;
    use crate::runs::LoadedRun;
    use crate::workspace::{Spectrum, Workspace, WorkspaceGroup};

    /// TOF boundaries 0, 10, ..., 700.
    fn boundaries() -> Vec<f64> {
        (0..=70).map(|bin| bin as f64 * 10.0).collect()
    }

    fn constant_row(spectrum_id: u32, value: f64) -> Spectrum {
        Spectrum::new(spectrum_id, boundaries(), vec![value; 70], vec![0.0; 70])
            .expect("row should be valid")
    }

    /// Period `p` holds the constant `p` in every bin of every row.
    fn period_group(name: &str, ids: &[u32]) -> WorkspaceGroup {
        WorkspaceGroup::new(
            name,
            (1..=PERIOD_COUNT)
                .map(|period| {
                    Workspace::new(
                        format!("{name}_{period}"),
                        ids.iter()
                            .map(|&id| constant_row(id, period as f64))
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    fn spectra(source: &str) -> IntervalSet {
        source.parse().expect("spectra should parse")
    }

    #[test]
    fn period_summation_adds_the_mapped_periods() {
        let periods = period_group("run", &[10, 135]);
        let monitors = period_group("run_monitors", &[1, 2]);
        let manager = PeriodManager::new(&periods, &spectra("10,135")).expect("manager");
        let mut accumulators = clone_accumulators(periods.period(1).expect("period 1"));

        sum_periods(&manager, &periods, &monitors, 0, &mut accumulators).expect("sum");

        let backward_out = accumulators.spectra[Foil::Out].spectrum(0).expect("row");
        assert!(backward_out.y.iter().all(|&value| value == 7.0));
        let backward_out_monitor = accumulators.monitors[Foil::Out].spectrum(0).expect("row");
        assert!(backward_out_monitor.y.iter().all(|&value| value == 7.0));

        let forward_thin = accumulators.spectra[Foil::Thin].spectrum(1).expect("row");
        assert!(forward_thin.y.iter().all(|&value| value == 1.0 + 3.0 + 5.0));
        let forward_thin_monitor = accumulators.monitors[Foil::Thin].spectrum(1).expect("row");
        assert!(forward_thin_monitor.y.iter().all(|&value| value == 5.0 + 2.0));
    }

    #[test]
    fn bin_width_normalisation_uses_period_one_axis() {
        let mut periods = period_group("run", &[10]);
        let mut monitors = period_group("run_monitors", &[1]);
        normalise_by_bin_width(&mut periods, &mut monitors).expect("normalise");

        let row = periods.period(4).expect("period 4").spectrum(0).expect("row");
        assert!(row.y.iter().all(|&value| (value - 0.4).abs() < 1.0e-12));
        let monitor = monitors.period(2).expect("period 2").spectrum(0).expect("row");
        assert!(monitor.y.iter().all(|&value| (value - 0.2).abs() < 1.0e-12));
    }

    #[test]
    fn bin_width_normalisation_uses_each_row_axis() {
        let row = |spectrum_id: u32, x: Vec<f64>| {
            Spectrum::new(spectrum_id, x, vec![10.0, 10.0], vec![0.0, 0.0]).expect("valid row")
        };
        let group = |name: &str, rows: Vec<Spectrum>| {
            WorkspaceGroup::new(
                name,
                (1..=PERIOD_COUNT)
                    .map(|period| Workspace::new(format!("{name}_{period}"), rows.clone()))
                    .collect(),
            )
        };
        let mut periods = group(
            "run",
            vec![
                row(10, vec![0.0, 10.0, 20.0]),
                row(140, vec![0.0, 20.0, 40.0]),
            ],
        );
        let mut monitors = group("run_monitors", vec![row(1, vec![0.0, 5.0, 10.0])]);

        normalise_by_bin_width(&mut periods, &mut monitors).expect("normalise");

        let period = periods.period(3).expect("period 3");
        assert_eq!(period.spectrum(0).expect("row").y, vec![1.0, 1.0]);
        assert_eq!(period.spectrum(1).expect("row").y, vec![0.5, 0.5]);
        let monitor = monitors.period(6).expect("period 6");
        assert_eq!(monitor.spectrum(0).expect("row").y, vec![2.0, 2.0]);
    }

    #[test]
    fn bin_width_normalisation_rejects_point_data() {
        let points = Spectrum::new(10, vec![0.0, 10.0], vec![1.0, 1.0], vec![0.0, 0.0])
            .expect("point row");
        let mut periods = WorkspaceGroup::new(
            "run",
            vec![Workspace::new("run_1", vec![points])],
        );
        let mut monitors = period_group("run_monitors", &[1]);
        let error = normalise_by_bin_width(&mut periods, &mut monitors).expect_err("point data");
        assert_eq!(error.placeholder(), "RUN.SHAPE_MISMATCH");
    }

    #[test]
    fn zero_monitor_integral_uses_epsilon_instead_of_infinity() {
        let periods = period_group("run", &[10]);
        let manager = PeriodManager::new(&periods, &spectra("10")).expect("manager");
        let mut accumulators = clone_accumulators(periods.period(1).expect("period 1"));
        for foil in Foil::ANY {
            let monitor = accumulators.monitors[foil].spectrum_mut(0).expect("row");
            monitor.y.iter_mut().for_each(|value| *value = 0.0);
        }
        let config = ReductionConfig::default();

        normalise_by_monitor(&manager, &mut accumulators, &config).expect("normalise");

        let row = accumulators.spectra[Foil::Out].spectrum(0).expect("row");
        let expected = 1.0 * (1000.0 / 1.0e-7);
        assert!(row.y.iter().all(|&value| value.is_finite()));
        assert!(row.y.iter().all(|&value| (value - expected).abs() <= 1.0e-6 * expected));
    }

    #[test]
    fn monitor_normalisation_scales_by_window_integral() {
        let periods = period_group("run", &[10]);
        let manager = PeriodManager::new(&periods, &spectra("10")).expect("manager");
        let mut accumulators = clone_accumulators(periods.period(1).expect("period 1"));
        let config = ReductionConfig::default();

        normalise_by_monitor(&manager, &mut accumulators, &config).expect("normalise");

        // bin centres 605..695 give ten monitor bins of value 1 inside [600, 700]
        let row = accumulators.spectra[Foil::Thin].spectrum(0).expect("row");
        assert!(row.y.iter().all(|&value| (value - 100.0).abs() < 1.0e-9));
    }

    #[test]
    fn cross_normalisation_matches_out_intensity() {
        let periods = period_group("run", &[10, 140]);
        let manager = PeriodManager::new(&periods, &spectra("10,140")).expect("manager");
        let mut accumulators = clone_accumulators(periods.period(1).expect("period 1"));
        for (foil, value) in [(Foil::Out, 2.0), (Foil::Thin, 4.0), (Foil::Thick, 8.0)] {
            for index in 0..2 {
                accumulators.spectra[foil].spectrum_mut(index).expect("row").scale(value);
            }
        }
        let config = ReductionConfig::default();

        let intensities =
            integrate_intensities(&manager, &accumulators, &config).expect("intensities");
        // backward window [400, 450] holds 5 bin centres, forward [410, 430] holds 2
        assert_eq!(intensities[&(0, Foil::Out)], 10.0);
        assert_eq!(intensities[&(1, Foil::Thick)], 16.0);

        cross_normalise(&manager, &mut accumulators, &intensities).expect("cross");
        for foil in Foil::ANY {
            for index in 0..2 {
                let row = accumulators.spectra[foil].spectrum(index).expect("row");
                assert!(row.y.iter().all(|&value| value == 2.0), "{foil} index {index}");
            }
        }
    }

    #[test]
    fn zero_foil_intensity_propagates_non_finite_values() {
        let periods = period_group("run", &[10]);
        let manager = PeriodManager::new(&periods, &spectra("10")).expect("manager");
        let mut accumulators = clone_accumulators(periods.period(1).expect("period 1"));
        accumulators.spectra[Foil::Thin].spectrum_mut(0).expect("row").scale(0.0);
        let config = ReductionConfig::default();

        let intensities =
            integrate_intensities(&manager, &accumulators, &config).expect("intensities");
        cross_normalise(&manager, &mut accumulators, &intensities).expect("cross");

        let thin = accumulators.spectra[Foil::Thin].spectrum(0).expect("row");
        assert!(thin.y.iter().all(|value| value.is_nan()));
    }

    #[test]
    fn difference_applies_bank_formulas() {
        let periods = period_group("run", &[10, 140]);
        let manager = PeriodManager::new(&periods, &spectra("10,140")).expect("manager");
        let template = periods.period(1).expect("period 1").clone();
        let mut accumulators = clone_accumulators(&template);
        for (foil, backward, forward) in [
            (Foil::Out, 10.0, 3.0),
            (Foil::Thin, 4.0, 5.0),
            (Foil::Thick, 6.0, 100.0),
        ] {
            accumulators.spectra[foil].spectrum_mut(0).expect("row").scale(backward);
            accumulators.spectra[foil].spectrum_mut(1).expect("row").scale(forward);
        }

        let output = difference(&manager, &accumulators, &template, 0.5, "diff").expect("diff");
        assert_eq!(output.name(), "diff");
        assert!(output.spectra()[0].y.iter().all(|&value| value == 4.0));
        assert!(output.spectra()[1].y.iter().all(|&value| value == 2.0));
        assert_eq!(output.spectra()[1].x, boundaries());
    }

    #[test]
    fn full_pipeline_on_constant_periods() {
        let run = LoadedRun {
            spectra: period_group("run", &[10, 140]),
            monitors: period_group("run_monitors", &[1, 2]),
        };
        let config = ReductionConfig::default();

        let output = difference_foil_states(run, &spectra("10,140"), 0.5, &config, "diff")
            .expect("pipeline should succeed");

        // after cross-normalisation every foil state carries the Out intensity
        let backward = &output.spectra()[0];
        let forward = &output.spectra()[1];
        assert_eq!(backward.spectrum_id, 10);
        assert_eq!(forward.spectrum_id, 140);
        let backward_out = 1000.0 / 7.0 * 7.0 / 10.0;
        let expected_backward = backward_out * 0.5 - backward_out + 0.5 * backward_out;
        assert!(backward.y.iter().all(|&value| (value - expected_backward).abs() < 1.0e-9));
        assert!(forward.y.iter().all(|&value| value.abs() < 1.0e-9));
    }

    #[test]
    fn missing_monitor_spectrum_is_reported() {
        let run = LoadedRun {
            spectra: period_group("run", &[10]),
            monitors: period_group("run_monitors", &[2]),
        };
        let error = difference_foil_states(
            run,
            &spectra("10"),
            0.5,
            &ReductionConfig::default(),
            "diff",
        )
        .expect_err("monitor 1 is absent");
        assert_eq!(error.placeholder(), "INPUT.SPECTRUM_NOT_FOUND");
        assert!(error.message().contains("run_monitors_1"));
    }
}
