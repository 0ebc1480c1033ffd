use crate::common::TofWindow;

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

/// `sqrt(sum(v^2))`, the error of a sum of independent values.
pub fn quadrature_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    stable_sum(values.into_iter().map(|value| value * value)).sqrt()
}

/// Width of every bin of a histogram boundary axis: `x[i + 1] - x[i]`.
pub fn bin_widths(boundaries: &[f64]) -> Vec<f64> {
    boundaries
        .windows(2)
        .map(|window| window[1] - window[0])
        .collect()
}

/// Position of each Y value on the X axis: bin centres for histogram data
/// (`x.len() == y_len + 1`), the points themselves for point data.
pub fn bin_positions(x: &[f64], y_len: usize) -> Option<Vec<f64>> {
    if x.len() == y_len + 1 {
        Some(
            x.windows(2)
                .map(|window| 0.5 * (window[0] + window[1]))
                .collect(),
        )
    } else if x.len() == y_len {
        Some(x.to_vec())
    } else {
        None
    }
}

/// Sum of the Y values whose position lies inside `window` (inclusive).
pub fn integrate_window(x: &[f64], y: &[f64], window: TofWindow) -> Option<f64> {
    let positions = bin_positions(x, y.len())?;
    Some(stable_sum(
        positions
            .iter()
            .zip(y)
            .filter(|(position, _)| window.contains(**position))
            .map(|(_, value)| *value),
    ))
}

#[cfg(test)]
mod tests {
    use super::{bin_positions, bin_widths, integrate_window, quadrature_sum, stable_sum};
    use crate::common::TofWindow;

    #[test]
    fn stable_sum_reduces_order_loss_for_large_and_small_values() {
        assert_eq!(stable_sum([1.0e16, 1.0, -1.0e16]), 0.0);
        assert_eq!(stable_sum(Vec::<f64>::new()), 0.0);
    }

    #[test]
    fn quadrature_sum_combines_independent_errors() {
        assert!((quadrature_sum([3.0, 4.0]) - 5.0).abs() < 1.0e-12);
    }

    #[test]
    fn bin_widths_follow_non_uniform_boundaries() {
        assert_eq!(bin_widths(&[0.0, 1.0, 3.0, 6.0]), vec![1.0, 2.0, 3.0]);
        assert!(bin_widths(&[5.0]).is_empty());
    }

    #[test]
    fn bin_positions_handle_histogram_and_point_data() {
        assert_eq!(bin_positions(&[0.0, 2.0, 4.0], 2), Some(vec![1.0, 3.0]));
        assert_eq!(bin_positions(&[1.0, 2.0], 2), Some(vec![1.0, 2.0]));
        assert_eq!(bin_positions(&[1.0, 2.0, 3.0, 4.0], 2), None);
    }

    #[test]
    fn window_integration_is_inclusive_on_both_ends() {
        let x = [590.0, 600.0, 650.0, 700.0, 710.0];
        let y = [1.0, 2.0, 4.0, 8.0, 16.0];
        let sum = integrate_window(&x, &y, TofWindow::new(600.0, 700.0)).expect("point data");
        assert_eq!(sum, 14.0);

        let boundaries = [395.0, 405.0, 445.0, 455.0];
        let counts = [1.0, 10.0, 100.0];
        let sum = integrate_window(&boundaries, &counts, TofWindow::new(400.0, 450.0))
            .expect("histogram data");
        assert_eq!(sum, 1.0 + 10.0 + 100.0);
    }
}
