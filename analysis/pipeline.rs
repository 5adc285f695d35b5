//! # Analysis Pipeline
//!
//! Runs every stage once, in order, from a validated [`RunConfig`]:
//! load → merge → prior achievement → normalize → select → compare → report.
//! Each stage consumes the previous stage's table; no stage is re-entered.

use crate::catalog::FeatureCatalog;
use crate::compare::{Comparison, DiagnosticFit, build_candidates, compare_candidates, diagnostic_fit};
use crate::config::{ConfigError, RunConfig};
use crate::ingest::{IngestError, load_assessments, load_profile};
use crate::merge::merge_tables;
use crate::normalize::{FeatureTable, NormalizeError, build_feature_table};
use crate::report::{ReportError, ReportPaths, write_report};
use crate::select::{Selection, select_features};
use crate::temporal::attach_prior_achievement;
use crate::types::DropLedger;
use crate::validation::{KFold, ValidationError};
use ahash::AHashSet;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to load input data: {0}")]
    Ingest(#[from] IngestError),
    #[error("Failed to prepare features: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("Model comparison failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("Failed to write the report: {0}")]
    Report(#[from] ReportError),
}

/// Stages reported while the pipeline runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    LoadAssessments,
    LoadProfile,
    Merge,
    PriorAchievement,
    Normalize,
    Select,
    Compare,
    Diagnostic,
    Report,
}

impl Stage {
    pub fn describe(self) -> &'static str {
        match self {
            Self::LoadAssessments => "assessment loading",
            Self::LoadProfile => "profile loading and reshaping",
            Self::Merge => "district-year merge",
            Self::PriorAchievement => "prior-year achievement",
            Self::Normalize => "coercion and standardization",
            Self::Select => "feature selection",
            Self::Compare => "cross-validated model comparison",
            Self::Diagnostic => "diagnostic train/test fit",
            Self::Report => "report writing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Observer for stage boundaries.
pub trait StageObserver {
    fn on_stage_start(&mut self, stage: Stage) {
        let _ = stage;
    }
    fn on_stage_finish(&mut self, stage: Stage) {
        let _ = stage;
    }
}

#[derive(Default)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {}

fn in_stage<T>(observer: &mut impl StageObserver, stage: Stage, work: impl FnOnce() -> T) -> T {
    log::info!("Starting {stage}");
    observer.on_stage_start(stage);
    let result = work();
    observer.on_stage_finish(stage);
    result
}

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub ledger: DropLedger,
    pub rows: usize,
    pub selection: Selection,
    pub comparison: Comparison,
    pub diagnostic: DiagnosticFit,
    pub report: ReportPaths,
}

/// Selection, comparison and diagnostic results for one feature table.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub selection: Selection,
    pub comparison: Comparison,
    pub diagnostic: DiagnosticFit,
}

/// Runs the full pipeline with the built-in ELSi catalog.
pub fn run(config: &RunConfig) -> Result<AnalysisOutcome, PipelineError> {
    run_with_catalog(config, &FeatureCatalog::elsi(), &mut NoopObserver)
}

pub fn run_with_catalog(
    config: &RunConfig,
    catalog: &FeatureCatalog,
    observer: &mut impl StageObserver,
) -> Result<AnalysisOutcome, PipelineError> {
    config.validate()?;

    let mut ledger = DropLedger::default();
    let table = prepare_features(config, catalog, &mut ledger, observer)?;
    log::info!("Exclusions so far: {ledger}");

    let analysis = analyze_features(&table, config, observer)?;
    let report = in_stage(observer, Stage::Report, || {
        write_report(
            &config.output_dir,
            &analysis.comparison,
            &analysis.diagnostic,
            &analysis.selection,
            config,
        )
    })?;

    Ok(AnalysisOutcome {
        ledger,
        rows: table.nrows(),
        selection: analysis.selection,
        comparison: analysis.comparison,
        diagnostic: analysis.diagnostic,
        report,
    })
}

/// Loading through standardization: produces the feature table the models
/// are fitted on.
pub fn prepare_features(
    config: &RunConfig,
    catalog: &FeatureCatalog,
    ledger: &mut DropLedger,
    observer: &mut impl StageObserver,
) -> Result<FeatureTable, PipelineError> {
    let assessments = in_stage(observer, Stage::LoadAssessments, || {
        load_assessments(&config.assessments_dir, &config.stratum, ledger)
    })?;
    let profile = in_stage(observer, Stage::LoadProfile, || {
        load_profile(&config.profile_path, ledger)
    })?;
    let merged = in_stage(observer, Stage::Merge, || {
        merge_tables(assessments, profile, ledger)
    });
    let augmented = in_stage(observer, Stage::PriorAchievement, || {
        attach_prior_achievement(merged, ledger)
    });
    let table = in_stage(observer, Stage::Normalize, || {
        build_feature_table(
            &augmented,
            catalog,
            &config.sentinel_tokens,
            config.missing_policy,
            ledger,
        )
    })?;
    let districts: AHashSet<i64> = table.keys().iter().map(|key| key.district_id).collect();
    log::info!(
        "Feature table holds {} district-years from {} districts",
        table.nrows(),
        districts.len()
    );
    Ok(table)
}

/// Selection, candidate comparison and the diagnostic fit on a prepared table.
pub fn analyze_features(
    table: &FeatureTable,
    config: &RunConfig,
    observer: &mut impl StageObserver,
) -> Result<Analysis, PipelineError> {
    let selection = in_stage(observer, Stage::Select, || {
        select_features(table, config.collinearity_threshold)
    });
    match &selection {
        Selection::Features(names) => {
            log::info!("Selected {} features: {}", names.len(), selection)
        }
        Selection::NoResults => {
            log::warn!("Feature selection returned no results; only the prior-achievement tier has inputs.")
        }
    }

    let kfold = KFold::new(config.folds)?;
    let comparison = in_stage(observer, Stage::Compare, || {
        let candidates = build_candidates(table, &selection);
        compare_candidates(&candidates, table.target(), &kfold)
    })?;
    let diagnostic = in_stage(observer, Stage::Diagnostic, || {
        diagnostic_fit(table, &selection, config.test_fraction, config.split_seed)
    })?;

    Ok(Analysis {
        selection,
        comparison,
        diagnostic,
    })
}
