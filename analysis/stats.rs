//! Descriptive statistics over `ndarray` columns.

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// Arithmetic mean; NaN for an empty input.
pub fn mean(values: ArrayView1<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.sum() / values.len() as f64
}

/// Population standard deviation (ddof = 0).
pub fn population_std(values: ArrayView1<f64>) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mu = mean(values);
    let ss = values.iter().map(|&v| (v - mu) * (v - mu)).sum::<f64>();
    (ss / values.len() as f64).sqrt()
}

/// Pairwise Pearson correlations between the columns of `data`
/// (rows are observations). Zero-variance columns correlate as NaN with
/// everything, themselves included.
pub fn correlation_matrix(data: ArrayView2<f64>) -> Array2<f64> {
    let n_cols = data.ncols();
    let means = data
        .mean_axis(Axis(0))
        .unwrap_or_else(|| ndarray::Array1::from_elem(n_cols, f64::NAN));
    let centered = &data - &means;
    let sums_of_squares: Vec<f64> = centered
        .columns()
        .into_iter()
        .map(|column| column.dot(&column))
        .collect();

    let mut corr = Array2::from_elem((n_cols, n_cols), f64::NAN);
    for i in 0..n_cols {
        for j in i..n_cols {
            let sab = centered.column(i).dot(&centered.column(j));
            let r = ratio(sab, sums_of_squares[i], sums_of_squares[j]);
            corr[[i, j]] = r;
            corr[[j, i]] = r;
        }
    }
    corr
}

// Computing sqrt(saa * sbb) rather than sqrt(saa) * sqrt(sbb) keeps the
// correlation of identical columns at exactly 1.
fn ratio(sab: f64, saa: f64, sbb: f64) -> f64 {
    if saa <= 0.0 || sbb <= 0.0 {
        return f64::NAN;
    }
    (sab / (saa * sbb).sqrt()).clamp(-1.0, 1.0)
}
