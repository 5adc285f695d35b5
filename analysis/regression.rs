//! Ordinary least squares with an intercept, plus the degree-2 polynomial
//! basis expansion used by the polynomial candidates.

use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, s};
use ndarray_linalg::LeastSquaresSvd;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegressionError {
    #[error("Least-squares solve failed: {0}")]
    LinalgError(#[from] ndarray_linalg::error::LinalgError),
    #[error("Design matrix has {rows} rows, but the response has {len} values.")]
    DimensionMismatch { rows: usize, len: usize },
    #[error("Cannot fit a regression on zero rows.")]
    EmptyDesign,
    #[error("Model was fitted on {expected} features, but {found} were supplied for prediction.")]
    FeatureCountMismatch { expected: usize, found: usize },
}

/// How a feature tier is turned into a design matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Basis {
    Linear,
    /// Full degree-2 expansion with a bias column.
    Polynomial,
}

impl Basis {
    pub fn code(self) -> &'static str {
        match self {
            Self::Linear => "Lin",
            Self::Polynomial => "Poly",
        }
    }

    pub fn expand(self, x: ArrayView2<f64>) -> Array2<f64> {
        match self {
            Self::Linear => x.to_owned(),
            Self::Polynomial => polynomial_features(x),
        }
    }
}

/// Degree-2 polynomial expansion: a bias column, the original columns, then
/// every product `x_i * x_j` with `i <= j` in lexicographic order. A matrix
/// with `p` columns expands to `1 + p + p(p+1)/2` columns.
pub fn polynomial_features(x: ArrayView2<f64>) -> Array2<f64> {
    let p = x.ncols();
    let pairs: Vec<Vec<usize>> = (0..p).combinations_with_replacement(2).collect();
    let mut expanded = Array2::<f64>::zeros((x.nrows(), 1 + p + pairs.len()));

    expanded.column_mut(0).fill(1.0);
    expanded.slice_mut(s![.., 1..=p]).assign(&x);
    for (offset, pair) in pairs.iter().enumerate() {
        let product = &x.column(pair[0]) * &x.column(pair[1]);
        expanded.column_mut(1 + p + offset).assign(&product);
    }
    expanded
}

/// A fitted linear model `y = intercept + x . coefficients`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Array1<f64>,
}

impl LinearModel {
    /// Fits by least squares on `[1 | x]`. The SVD solver returns the
    /// minimum-norm solution when the design is rank deficient, e.g. when a
    /// polynomial basis already carries a bias column or features coincide.
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<Self, RegressionError> {
        if x.nrows() != y.len() {
            return Err(RegressionError::DimensionMismatch {
                rows: x.nrows(),
                len: y.len(),
            });
        }
        if x.nrows() == 0 {
            return Err(RegressionError::EmptyDesign);
        }

        let design = with_intercept(x);
        let response: Array1<f64> = y.to_owned();
        let result = design.least_squares(&response)?;
        let solution = result.solution;

        Ok(Self {
            intercept: solution[0],
            coefficients: solution.slice(s![1..]).to_owned(),
        })
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, RegressionError> {
        if x.ncols() != self.coefficients.len() {
            return Err(RegressionError::FeatureCountMismatch {
                expected: self.coefficients.len(),
                found: x.ncols(),
            });
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }
}

fn with_intercept(x: ArrayView2<f64>) -> Array2<f64> {
    let mut design = Array2::<f64>::ones((x.nrows(), x.ncols() + 1));
    design.slice_mut(s![.., 1..]).assign(&x);
    design
}

/// Root mean squared error.
pub fn rmse(truth: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    let n = truth.len();
    if n == 0 {
        return f64::NAN;
    }
    let sse: f64 = truth
        .iter()
        .zip(predicted.iter())
        .map(|(&t, &p)| (t - p) * (t - p))
        .sum();
    (sse / n as f64).sqrt()
}

/// Coefficient of determination. A constant truth vector scores 1 when
/// predicted perfectly and 0 otherwise.
pub fn r2_score(truth: ArrayView1<f64>, predicted: ArrayView1<f64>) -> f64 {
    let n = truth.len();
    if n == 0 {
        return f64::NAN;
    }
    let mean = truth.sum() / n as f64;
    let ss_res: f64 = truth
        .iter()
        .zip(predicted.iter())
        .map(|(&t, &p)| (t - p) * (t - p))
        .sum();
    let ss_tot: f64 = truth.iter().map(|&t| (t - mean) * (t - mean)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
