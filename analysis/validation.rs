//! K-fold cross-validation and the diagnostic train/test split.

use crate::regression::{LinearModel, RegressionError, rmse};
use ndarray::{ArrayView1, ArrayView2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::ops::Range;
use thiserror::Error;

pub const DEFAULT_FOLDS: usize = 10;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Cross-validation needs at least 2 folds, but {0} were requested.")]
    InvalidFoldCount(usize),
    #[error("Cannot split {rows} rows into {folds} folds; every fold needs at least one row.")]
    TooFewRows { rows: usize, folds: usize },
    #[error("Test fraction must lie strictly between 0 and 1, but was {0}.")]
    InvalidTestFraction(f64),
    #[error("A train/test split of {rows} rows leaves one side empty.")]
    SplitTooSmall { rows: usize },
    #[error(transparent)]
    Regression(#[from] RegressionError),
}

/// Contiguous, unshuffled k-fold partitioning. The first `n mod k` folds hold
/// one extra row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFold {
    folds: usize,
}

impl KFold {
    pub fn new(folds: usize) -> Result<Self, ValidationError> {
        if folds < 2 {
            return Err(ValidationError::InvalidFoldCount(folds));
        }
        Ok(Self { folds })
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    /// Row ranges of the validation block of each fold, in fold order.
    pub fn test_ranges(&self, n_rows: usize) -> Result<Vec<Range<usize>>, ValidationError> {
        if n_rows < self.folds {
            return Err(ValidationError::TooFewRows {
                rows: n_rows,
                folds: self.folds,
            });
        }
        let base = n_rows / self.folds;
        let extra = n_rows % self.folds;
        let mut ranges = Vec::with_capacity(self.folds);
        let mut start = 0;
        for fold in 0..self.folds {
            let size = base + usize::from(fold < extra);
            ranges.push(start..start + size);
            start += size;
        }
        Ok(ranges)
    }
}

impl Default for KFold {
    fn default() -> Self {
        Self {
            folds: DEFAULT_FOLDS,
        }
    }
}

/// Cross-validated negative RMSE of an OLS fit, one score per fold in fold
/// order. Folds are fitted in parallel; the collected order is the fold order.
pub fn cross_val_scores(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    kfold: &KFold,
) -> Result<Vec<f64>, ValidationError> {
    if x.nrows() != y.len() {
        return Err(RegressionError::DimensionMismatch {
            rows: x.nrows(),
            len: y.len(),
        }
        .into());
    }
    let n_rows = x.nrows();
    let ranges = kfold.test_ranges(n_rows)?;

    ranges
        .into_par_iter()
        .map(|test| {
            let train: Vec<usize> = (0..n_rows).filter(|i| !test.contains(i)).collect();
            let test: Vec<usize> = test.collect();
            score_split(x, y, &train, &test)
        })
        .collect()
}

fn score_split(
    x: ArrayView2<f64>,
    y: ArrayView1<f64>,
    train: &[usize],
    test: &[usize],
) -> Result<f64, ValidationError> {
    let x_train = x.select(Axis(0), train);
    let y_train = y.select(Axis(0), train);
    let model = LinearModel::fit(x_train.view(), y_train.view())?;

    let x_test = x.select(Axis(0), test);
    let y_test = y.select(Axis(0), test);
    let predicted = model.predict(x_test.view())?;
    Ok(-rmse(y_test.view(), predicted.view()))
}

/// Row indices of a random train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffles the rows and holds out `ceil(test_fraction * n)` of them. Without
/// a seed the split is drawn from OS entropy and differs on every call.
pub fn train_test_split(
    n_rows: usize,
    test_fraction: f64,
    seed: Option<u64>,
) -> Result<TrainTestSplit, ValidationError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ValidationError::InvalidTestFraction(test_fraction));
    }
    let n_test = (test_fraction * n_rows as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_rows {
        return Err(ValidationError::SplitTooSmall { rows: n_rows });
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut permutation: Vec<usize> = (0..n_rows).collect();
    permutation.shuffle(&mut rng);

    let train = permutation.split_off(n_test);
    Ok(TrainTestSplit {
        train,
        test: permutation,
    })
}
