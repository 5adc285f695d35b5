//! # Correlation-Based Feature Selection
//!
//! A greedy multicollinearity filter. Candidates are the features with a
//! non-zero, non-unit correlation to the target, visited from the most
//! positively to the most negatively correlated. Each candidate not yet
//! discarded is accepted, and every other feature whose correlation with it
//! exceeds the threshold is discarded.
//!
//! The collinearity test is one-sided: a feature correlated at -0.95 with an
//! accepted feature survives.

use crate::normalize::FeatureTable;
use crate::stats::correlation_matrix;
use ndarray::{Array2, ArrayView2, s};
use std::fmt;

pub const DEFAULT_COLLINEARITY_THRESHOLD: f64 = 0.9;

/// Result of feature selection. `NoResults` is a distinguished value, not an
/// empty list: callers must branch on it before indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Accepted features in acceptance order.
    Features(Vec<String>),
    NoResults,
}

impl Selection {
    /// The accepted features; empty for `NoResults`.
    pub fn features(&self) -> &[String] {
        match self {
            Self::Features(names) => names,
            Self::NoResults => &[],
        }
    }

    pub fn is_no_results(&self) -> bool {
        matches!(self, Self::NoResults)
    }

    pub fn len(&self) -> usize {
        self.features().len()
    }

    pub fn is_empty(&self) -> bool {
        self.features().is_empty()
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Features(names) => write!(f, "{}", names.join(", ")),
            Self::NoResults => f.write_str("No results"),
        }
    }
}

/// Runs selection on a standardized table, correlating every feature with the
/// table's target.
pub fn select_features(table: &FeatureTable, threshold: f64) -> Selection {
    let n_features = table.ncols();
    let mut joined = Array2::<f64>::zeros((table.nrows(), n_features + 1));
    joined
        .slice_mut(s![.., ..n_features])
        .assign(&table.features());
    joined.column_mut(n_features).assign(&table.target());
    let corr = correlation_matrix(joined.view());
    select_from_correlations(&table.column_names(), corr.view(), threshold)
}

/// Runs selection on a precomputed correlation matrix. `corr` is square of
/// size `names.len() + 1`; the last row/column belongs to the target.
///
/// The feature-feature block is read once and reused for every acceptance,
/// which is equivalent to recomputing it since candidate identities never
/// change.
pub fn select_from_correlations(
    names: &[String],
    corr: ArrayView2<f64>,
    threshold: f64,
) -> Selection {
    let target = names.len();
    debug_assert_eq!(corr.nrows(), target + 1);
    debug_assert_eq!(corr.ncols(), target + 1);

    // NaN correlations fail both comparisons and never become candidates.
    let mut candidates: Vec<usize> = (0..target)
        .filter(|&f| {
            let r = corr[[f, target]];
            r.abs() > 0.0 && r != 1.0
        })
        .collect();
    // Stable sort: ties keep column order.
    candidates.sort_by(|&a, &b| corr[[b, target]].total_cmp(&corr[[a, target]]));

    let mut discard = vec![false; target];
    let mut answer = Vec::new();

    for &candidate in &candidates {
        if discard[candidate] {
            log::debug!(
                "Skipping '{}' (collinear with an accepted feature)",
                names[candidate]
            );
            continue;
        }
        log::debug!(
            "Accepting '{}' (r = {:.4} with target)",
            names[candidate],
            corr[[candidate, target]]
        );
        answer.push(names[candidate].clone());

        for other in 0..target {
            if other != candidate && corr[[other, candidate]] > threshold {
                discard[other] = true;
            }
        }
    }

    if answer.is_empty() {
        Selection::NoResults
    } else {
        Selection::Features(answer)
    }
}
