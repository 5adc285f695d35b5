//! # Candidate Model Comparison
//!
//! Builds the six candidate design matrices (three nested feature tiers, each
//! with a linear and a degree-2 polynomial basis), cross-validates an OLS fit
//! on each, and summarizes the per-fold scores. A separate random train/test
//! fit over all selected features provides a predicted-vs-actual diagnostic.

use crate::catalog::{FeatureGroup, PRIOR_ACHIEVEMENT};
use crate::normalize::FeatureTable;
use crate::regression::{Basis, LinearModel, r2_score};
use crate::select::Selection;
use crate::validation::{KFold, ValidationError, cross_val_scores, train_test_split};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use std::fmt;

/// Nested feature groupings, from finance alone up to finance, demographics
/// and prior-year achievement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureTier {
    Finance,
    FinanceDemographics,
    FinanceDemographicsPrior,
}

impl FeatureTier {
    pub const ALL: [FeatureTier; 3] = [
        Self::Finance,
        Self::FinanceDemographics,
        Self::FinanceDemographicsPrior,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Finance => "F",
            Self::FinanceDemographics => "FD",
            Self::FinanceDemographicsPrior => "FDP",
        }
    }

    /// Feature columns of this tier: selected finance features, then selected
    /// demographic features, then prior achievement, each group in selection
    /// order. Prior achievement is taken from the table whether or not the
    /// selector accepted it.
    pub fn columns(self, table: &FeatureTable, selection: &Selection) -> Vec<String> {
        let selected_in = |group: FeatureGroup| -> Vec<String> {
            selection
                .features()
                .iter()
                .filter(|name| {
                    table
                        .column_index(name)
                        .is_some_and(|idx| table.specs()[idx].group == group)
                })
                .cloned()
                .collect()
        };

        let mut columns = selected_in(FeatureGroup::Finance);
        if self != Self::Finance {
            columns.extend(selected_in(FeatureGroup::Demographic));
        }
        if self == Self::FinanceDemographicsPrior && table.column_index(PRIOR_ACHIEVEMENT).is_some() {
            columns.push(PRIOR_ACHIEVEMENT.to_string());
        }
        columns
    }
}

/// One named tier/basis combination with its own input matrix.
#[derive(Debug, Clone)]
pub struct CandidateModel {
    pub name: String,
    pub tier: FeatureTier,
    pub basis: Basis,
    pub columns: Vec<String>,
    pub inputs: Array2<f64>,
}

/// Builds the six candidates in canonical order:
/// `Lin_F`, `Lin_FD`, `Lin_FDP`, `Poly_F`, `Poly_FD`, `Poly_FDP`.
pub fn build_candidates(table: &FeatureTable, selection: &Selection) -> Vec<CandidateModel> {
    let mut candidates = Vec::with_capacity(6);
    for basis in [Basis::Linear, Basis::Polynomial] {
        for tier in FeatureTier::ALL {
            let columns = tier.columns(table, selection);
            let inputs = basis.expand(table.select_columns(&columns).view());
            candidates.push(CandidateModel {
                name: format!("{}_{}", basis.code(), tier.code()),
                tier,
                basis,
                columns,
                inputs,
            });
        }
    }
    candidates
}

/// Summary statistics over per-fold scores. `std` is the population
/// standard deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
}

impl ScoreSummary {
    pub fn from_scores(scores: &[f64]) -> Self {
        let values = ArrayView1::from(scores);
        Self {
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean: crate::stats::mean(values),
            std: crate::stats::population_std(values),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelScores {
    pub name: String,
    /// Negative RMSE per fold, in fold order.
    pub fold_scores: Vec<f64>,
    pub summary: ScoreSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub models: Vec<ModelScores>,
}

impl Comparison {
    pub fn get(&self, name: &str) -> Option<&ModelScores> {
        self.models.iter().find(|m| m.name == name)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<10} {:>12} {:>12} {:>12} {:>12}",
            "Model", "Score (Min)", "Score (Max)", "Score (Mean)", "Score (Std)"
        )?;
        for model in &self.models {
            let s = &model.summary;
            writeln!(
                f,
                "{:<10} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
                model.name, s.min, s.max, s.mean, s.std
            )?;
        }
        Ok(())
    }
}

/// Cross-validates every candidate against `target`.
pub fn compare_candidates(
    candidates: &[CandidateModel],
    target: ArrayView1<f64>,
    kfold: &KFold,
) -> Result<Comparison, ValidationError> {
    let mut models = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let fold_scores = cross_val_scores(candidate.inputs.view(), target, kfold)?;
        let summary = ScoreSummary::from_scores(&fold_scores);
        log::info!(
            "{}: {} input columns, mean score {:.4} (std {:.4}) over {} folds",
            candidate.name,
            candidate.inputs.ncols(),
            summary.mean,
            summary.std,
            fold_scores.len()
        );
        models.push(ModelScores {
            name: candidate.name.clone(),
            fold_scores,
            summary,
        });
    }
    Ok(Comparison { models })
}

/// Predicted-vs-actual values from one random train/test fit.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticFit {
    pub r2: f64,
    pub truth: Array1<f64>,
    pub predictions: Array1<f64>,
    pub train_rows: usize,
}

/// Fits OLS on a random train split of all selected features and scores the
/// held-out rows. Not part of the cross-validated comparison.
pub fn diagnostic_fit(
    table: &FeatureTable,
    selection: &Selection,
    test_fraction: f64,
    seed: Option<u64>,
) -> Result<DiagnosticFit, ValidationError> {
    let x = table.select_columns(selection.features());
    let y = table.target();
    let split = train_test_split(table.nrows(), test_fraction, seed)?;

    let model = LinearModel::fit(
        x.select(Axis(0), &split.train).view(),
        y.select(Axis(0), &split.train).view(),
    )?;
    let truth = y.select(Axis(0), &split.test);
    let predictions = model.predict(x.select(Axis(0), &split.test).view())?;
    let r2 = r2_score(truth.view(), predictions.view());
    log::info!(
        "Diagnostic fit: R² = {:.4} on {} held-out rows",
        r2,
        split.test.len()
    );

    Ok(DiagnosticFit {
        r2,
        truth,
        predictions,
        train_rows: split.train.len(),
    })
}
