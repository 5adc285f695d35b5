//! # Feature Coercion, Missing-Value Handling and Standardization
//!
//! Turns the augmented table of raw text cells into a rectangular numeric
//! [`FeatureTable`]:
//!
//! - Any cell containing a sentinel token is treated as missing.
//! - Remaining cells are coerced to `f64`; cells that do not parse are missing
//!   as well, and are counted separately because they point at export damage
//!   rather than deliberate suppression.
//! - Rows with a missing target are always dropped. Rows with a missing
//!   feature are dropped or mean-imputed according to [`MissingPolicy`].
//! - Every feature column is standardized to mean 0 and population standard
//!   deviation 1. The target keeps its original scale.

use crate::catalog::{FeatureCatalog, FeatureGroup, FeatureSpec};
use crate::config::MissingPolicy;
use crate::stats::{mean, population_std};
use crate::types::{AugmentedTable, DistrictYear, DropLedger, parse_real};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error(
        "The required feature column '{0}' was not found in the merged table. Please check that the profile export contains it."
    )]
    ColumnNotFound(String),
    #[error(
        "No rows remain after removing rows with missing values ({dropped} dropped). Nothing can be standardized."
    )]
    NoRowsRetained { dropped: usize },
    #[error("Feature column '{0}' has no observed values, so its mean cannot be imputed.")]
    NoObservedValues(String),
    #[error(
        "Feature matrix has shape {rows}x{cols}, but {expected_cols} feature names and {target_len} target values were given."
    )]
    ShapeMismatch {
        rows: usize,
        cols: usize,
        expected_cols: usize,
        target_len: usize,
    },
}

/// Outcome of coercing one raw cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    Value(f64),
    /// The cell was empty.
    Missing,
    /// The cell contained a sentinel token.
    Sentinel,
    /// The cell held text that is not a finite number.
    Unparseable,
}

impl Coerced {
    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

pub fn coerce_cell(raw: Option<&str>, sentinel_tokens: &[String]) -> Coerced {
    let Some(text) = raw else {
        return Coerced::Missing;
    };
    if sentinel_tokens
        .iter()
        .any(|token| !token.is_empty() && text.contains(token.as_str()))
    {
        return Coerced::Sentinel;
    }
    if text.trim().is_empty() {
        return Coerced::Missing;
    }
    match parse_real(text) {
        Some(v) => Coerced::Value(v),
        None => Coerced::Unparseable,
    }
}

/// A standardized feature matrix plus the raw target of the retained rows.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    specs: Vec<FeatureSpec>,
    features: Array2<f64>,
    target: Array1<f64>,
    keys: Vec<DistrictYear>,
}

impl FeatureTable {
    /// Standardizes `raw` column by column and wraps it with its names and
    /// target. Rows of `raw` are observations, columns follow `specs`.
    pub fn standardize(
        specs: Vec<FeatureSpec>,
        mut raw: Array2<f64>,
        target: Array1<f64>,
    ) -> Result<Self, NormalizeError> {
        if raw.ncols() != specs.len() || raw.nrows() != target.len() {
            return Err(NormalizeError::ShapeMismatch {
                rows: raw.nrows(),
                cols: raw.ncols(),
                expected_cols: specs.len(),
                target_len: target.len(),
            });
        }
        for mut column in raw.axis_iter_mut(Axis(1)) {
            let first = column.first().copied();
            let is_constant = column.iter().all(|&v| Some(v) == first);
            if is_constant {
                // A constant column carries no information; center it exactly.
                column.fill(0.0);
                continue;
            }
            let mu = mean(column.view());
            let sigma = population_std(column.view());
            column.mapv_inplace(|v| (v - mu) / sigma);
        }
        Ok(Self {
            specs,
            features: raw,
            target,
            keys: Vec::new(),
        })
    }

    /// Attaches the keys of the retained rows, in row order.
    pub fn with_keys(mut self, keys: Vec<DistrictYear>) -> Self {
        debug_assert!(keys.len() == self.target.len());
        self.keys = keys;
        self
    }

    /// Keys of the retained rows; empty when the table was built directly
    /// from a matrix.
    pub fn keys(&self) -> &[DistrictYear] {
        &self.keys
    }

    pub fn specs(&self) -> &[FeatureSpec] {
        &self.specs
    }

    pub fn column_names(&self) -> Vec<String> {
        self.specs.iter().map(|spec| spec.column.clone()).collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|spec| spec.column == name)
    }

    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    pub fn target(&self) -> ArrayView1<'_, f64> {
        self.target.view()
    }

    pub fn nrows(&self) -> usize {
        self.features.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.features.ncols()
    }

    /// Copies the named columns, in the order given, into a new matrix.
    /// Unknown names are skipped.
    pub fn select_columns(&self, names: &[String]) -> Array2<f64> {
        let indices: Vec<usize> = names
            .iter()
            .filter_map(|name| self.column_index(name))
            .collect();
        self.features.select(Axis(1), &indices)
    }
}

/// Coerces, filters and standardizes the catalog features of `table`.
pub fn build_feature_table(
    table: &AugmentedTable,
    catalog: &FeatureCatalog,
    sentinel_tokens: &[String],
    policy: MissingPolicy,
    ledger: &mut DropLedger,
) -> Result<FeatureTable, NormalizeError> {
    // Resolve every profile feature up front: a missing column is a schema
    // mismatch and aborts the run.
    let mut sources: Vec<Option<usize>> = Vec::with_capacity(catalog.len());
    for spec in catalog.features() {
        if spec.group == FeatureGroup::Prior {
            sources.push(None);
        } else {
            let index = table
                .column_index(&spec.column)
                .ok_or_else(|| NormalizeError::ColumnNotFound(spec.column.clone()))?;
            sources.push(Some(index));
        }
    }

    let n_features = catalog.len();
    let mut rows: Vec<Vec<Option<f64>>> = Vec::with_capacity(table.len());
    let mut targets: Vec<f64> = Vec::with_capacity(table.len());
    let mut keys: Vec<DistrictYear> = Vec::with_capacity(table.len());
    let mut dropped = 0usize;

    for augmented in &table.records {
        let mut values = Vec::with_capacity(n_features);
        for source in &sources {
            let value = match source {
                None => augmented.prior_achievement,
                Some(index) => {
                    let raw = augmented.record.cells[*index].as_deref();
                    let coerced = coerce_cell(raw, sentinel_tokens);
                    match coerced {
                        Coerced::Sentinel => ledger.sentinel_cells += 1,
                        Coerced::Unparseable => {
                            ledger.unparseable_cells += 1;
                            log::warn!(
                                "Unparseable value {:?} for '{}' at {}; treating it as missing.",
                                raw.unwrap_or_default(),
                                table.columns[*index],
                                augmented.record.key
                            );
                        }
                        Coerced::Value(_) | Coerced::Missing => {}
                    }
                    coerced.value()
                }
            };
            values.push(value);
        }

        let Some(target) = augmented.record.target else {
            dropped += 1;
            continue;
        };
        if policy == MissingPolicy::Drop && values.iter().any(Option::is_none) {
            dropped += 1;
            continue;
        }
        rows.push(values);
        targets.push(target);
        keys.push(augmented.record.key);
    }

    ledger.rows_missing_values += dropped;
    if rows.is_empty() {
        return Err(NormalizeError::NoRowsRetained { dropped });
    }
    log::info!(
        "Retained {} of {} rows for standardization ({} dropped for missing values).",
        rows.len(),
        table.len(),
        dropped
    );

    let mut raw = Array2::<f64>::zeros((rows.len(), n_features));
    for (j, spec) in catalog.features().iter().enumerate() {
        let observed: Vec<f64> = rows.iter().filter_map(|row| row[j]).collect();
        let fill = if observed.len() < rows.len() {
            if observed.is_empty() {
                return Err(NormalizeError::NoObservedValues(spec.column.clone()));
            }
            let column_mean = observed.iter().sum::<f64>() / observed.len() as f64;
            ledger.imputed_cells += rows.len() - observed.len();
            column_mean
        } else {
            0.0
        };
        for (i, row) in rows.iter().enumerate() {
            raw[[i, j]] = row[j].unwrap_or(fill);
        }
    }

    Ok(
        FeatureTable::standardize(catalog.features().to_vec(), raw, Array1::from_vec(targets))?
            .with_keys(keys),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PRIOR_ACHIEVEMENT;
    use crate::config::default_sentinel_tokens;
    use crate::types::{AugmentedRecord, DistrictYear, DistrictYearRecord};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn record(
        id: i64,
        target: Option<f64>,
        cells: [&str; 2],
        prior: Option<f64>,
    ) -> AugmentedRecord {
        AugmentedRecord {
            record: DistrictYearRecord {
                key: DistrictYear::new(id, 2012),
                district_name: format!("District {id}"),
                target,
                cells: cells
                    .iter()
                    .map(|c| if c.is_empty() { None } else { Some(c.to_string()) })
                    .collect(),
            },
            prior_achievement: prior,
        }
    }

    fn catalog() -> FeatureCatalog {
        FeatureCatalog::new(vec![
            FeatureSpec::new("revenue_district_finance", FeatureGroup::Finance),
            FeatureSpec::new("students_district", FeatureGroup::Demographic),
        ])
    }

    fn table(records: Vec<AugmentedRecord>) -> AugmentedTable {
        AugmentedTable {
            columns: vec![
                "revenue_district_finance".to_string(),
                "students_district".to_string(),
            ],
            records,
        }
    }

    #[test]
    fn sentinel_tokens_become_missing() {
        let tokens = default_sentinel_tokens();
        assert_eq!(coerce_cell(Some("†"), &tokens), Coerced::Sentinel);
        assert_eq!(coerce_cell(Some("12‡"), &tokens), Coerced::Sentinel);
        assert_eq!(coerce_cell(Some("–"), &tokens), Coerced::Sentinel);
        assert_eq!(coerce_cell(Some("\u{FFFD}"), &tokens), Coerced::Sentinel);
        assert_eq!(coerce_cell(Some("-3.5"), &tokens), Coerced::Value(-3.5));
        assert_eq!(coerce_cell(Some("1,250"), &tokens), Coerced::Value(1250.0));
        assert_eq!(coerce_cell(Some("abc"), &tokens), Coerced::Unparseable);
        assert_eq!(coerce_cell(None, &tokens), Coerced::Missing);
    }

    #[test]
    fn drop_policy_removes_incomplete_rows() {
        let table = table(vec![
            record(1, Some(40.0), ["100", "10"], Some(38.0)),
            record(2, Some(50.0), ["†", "20"], Some(45.0)),
            record(3, None, ["300", "30"], Some(55.0)),
            record(4, Some(70.0), ["400", "40"], None),
            record(5, Some(60.0), ["500", "50"], Some(58.0)),
            record(6, Some(65.0), ["650", "55"], Some(61.0)),
        ]);
        let mut ledger = DropLedger::default();
        let features = build_feature_table(
            &table,
            &catalog(),
            &default_sentinel_tokens(),
            MissingPolicy::Drop,
            &mut ledger,
        )
        .unwrap();

        assert_eq!(features.nrows(), 3);
        assert_eq!(features.ncols(), 3);
        assert_eq!(features.target(), array![40.0, 60.0, 65.0].view());
        let ids: Vec<i64> = features.keys().iter().map(|k| k.district_id).collect();
        assert_eq!(ids, vec![1, 5, 6]);
        assert_eq!(ledger.rows_missing_values, 3);
        assert_eq!(ledger.sentinel_cells, 1);
        assert_eq!(
            features.column_names().last().map(String::as_str),
            Some(PRIOR_ACHIEVEMENT)
        );
    }

    #[test]
    fn impute_policy_fills_with_observed_mean() {
        let table = table(vec![
            record(1, Some(40.0), ["100", "10"], Some(30.0)),
            record(2, Some(50.0), ["", "20"], Some(50.0)),
            record(3, Some(60.0), ["300", "30"], None),
        ]);
        let mut ledger = DropLedger::default();
        let features = build_feature_table(
            &table,
            &catalog(),
            &default_sentinel_tokens(),
            MissingPolicy::ImputeMean,
            &mut ledger,
        )
        .unwrap();

        assert_eq!(features.nrows(), 3);
        assert_eq!(ledger.imputed_cells, 2);
        // Revenue becomes [100, 200, 300] after imputation: the middle row is
        // the column mean and standardizes to 0.
        assert_abs_diff_eq!(features.features()[[1, 0]], 0.0, epsilon = 1e-12);
        // Prior becomes [30, 50, 40].
        assert_abs_diff_eq!(features.features()[[2, 2]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn missing_catalog_column_is_fatal() {
        let mut bad = table(vec![record(1, Some(40.0), ["100", "10"], Some(30.0))]);
        bad.columns[1] = "something_else".to_string();
        let mut ledger = DropLedger::default();
        let err = build_feature_table(
            &bad,
            &catalog(),
            &default_sentinel_tokens(),
            MissingPolicy::Drop,
            &mut ledger,
        )
        .unwrap_err();
        match err {
            NormalizeError::ColumnNotFound(col) => assert_eq!(col, "students_district"),
            other => panic!("Expected ColumnNotFound, got {other:?}"),
        }
    }

    #[test]
    fn no_surviving_rows_is_fatal() {
        let table = table(vec![record(1, Some(40.0), ["†", "10"], Some(30.0))]);
        let mut ledger = DropLedger::default();
        let err = build_feature_table(
            &table,
            &catalog(),
            &default_sentinel_tokens(),
            MissingPolicy::Drop,
            &mut ledger,
        )
        .unwrap_err();
        assert!(matches!(err, NormalizeError::NoRowsRetained { dropped: 1 }));
    }

    #[test]
    fn standardized_columns_have_zero_mean_unit_std() {
        let raw = array![
            [1.0, 200.0, 5.0],
            [2.0, 150.0, 5.0],
            [4.0, 990.0, 5.0],
            [8.0, 10.0, 5.0],
            [16.0, 330.0, 5.0]
        ];
        let specs = vec![
            FeatureSpec::new("a", FeatureGroup::Finance),
            FeatureSpec::new("b", FeatureGroup::Demographic),
            FeatureSpec::new("c", FeatureGroup::School),
        ];
        let table =
            FeatureTable::standardize(specs, raw, array![1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        for j in 0..2 {
            let column = table.features().column(j).to_owned();
            assert_abs_diff_eq!(mean(column.view()), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(population_std(column.view()), 1.0, epsilon = 1e-12);
        }
        assert!(table.features().column(2).iter().all(|&v| v == 0.0));
        assert_eq!(table.target()[4], 5.0);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let specs = vec![FeatureSpec::new("a", FeatureGroup::Finance)];
        let err = FeatureTable::standardize(specs, Array2::zeros((3, 2)), Array1::zeros(3))
            .unwrap_err();
        assert!(matches!(err, NormalizeError::ShapeMismatch { .. }));
    }
}
