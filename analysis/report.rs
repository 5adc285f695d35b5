//! # Report Artifacts
//!
//! Writes the end-of-run files to the output directory:
//!
//! - `overall_score_comparison.csv`: per-model summary of the fold scores.
//! - `cv_score_distribution.tsv`: every fold score, one row per model and fold.
//! - `cv_score_boxplot.png`: a box plot of those scores per model.
//! - `predicted_vs_actual.tsv`: the held-out pairs of the diagnostic fit.
//! - `predicted_vs_actual.png`: the same pairs as a scatter plot against the
//!   identity line.
//! - `selected_features.txt`: accepted features in acceptance order.
//! - `run_config.toml`: the resolved configuration of the run.
//!
//! The tabular files are required; a plot that cannot be rendered (for
//! example when no system font is available) is logged and skipped.

use crate::compare::{Comparison, DiagnosticFit};
use crate::config::{ConfigError, RunConfig};
use crate::select::Selection;
use plotters::prelude::*;
use std::error::Error as StdError;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SCORE_COMPARISON_FILE: &str = "overall_score_comparison.csv";
pub const SCORE_DISTRIBUTION_FILE: &str = "cv_score_distribution.tsv";
pub const PREDICTED_VS_ACTUAL_FILE: &str = "predicted_vs_actual.tsv";
pub const SCORE_BOXPLOT_FILE: &str = "cv_score_boxplot.png";
pub const PREDICTED_VS_ACTUAL_PLOT_FILE: &str = "predicted_vs_actual.png";
pub const SELECTED_FEATURES_FILE: &str = "selected_features.txt";
pub const RUN_CONFIG_FILE: &str = "run_config.toml";

pub const SCORE_COMPARISON_HEADER: [&str; 5] = [
    "Model",
    "Score (Min)",
    "Score (Max)",
    "Score (Mean)",
    "Score (Std)",
];

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to write the run configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Locations of the written artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub score_comparison: PathBuf,
    pub score_distribution: PathBuf,
    pub predicted_vs_actual: PathBuf,
    pub selected_features: PathBuf,
    pub run_config: PathBuf,
    /// `None` when the plot could not be rendered.
    pub score_boxplot: Option<PathBuf>,
    pub predicted_vs_actual_plot: Option<PathBuf>,
}

impl ReportPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            score_comparison: dir.join(SCORE_COMPARISON_FILE),
            score_distribution: dir.join(SCORE_DISTRIBUTION_FILE),
            predicted_vs_actual: dir.join(PREDICTED_VS_ACTUAL_FILE),
            selected_features: dir.join(SELECTED_FEATURES_FILE),
            run_config: dir.join(RUN_CONFIG_FILE),
            score_boxplot: Some(dir.join(SCORE_BOXPLOT_FILE)),
            predicted_vs_actual_plot: Some(dir.join(PREDICTED_VS_ACTUAL_PLOT_FILE)),
        }
    }
}

/// Writes every artifact into `dir`, creating it if needed.
pub fn write_report(
    dir: &Path,
    comparison: &Comparison,
    diagnostic: &DiagnosticFit,
    selection: &Selection,
    config: &RunConfig,
) -> Result<ReportPaths, ReportError> {
    fs::create_dir_all(dir)?;
    let mut paths = ReportPaths::in_dir(dir);

    write_score_comparison(&paths.score_comparison, comparison)?;
    write_score_distribution(&paths.score_distribution, comparison)?;
    write_predicted_vs_actual(&paths.predicted_vs_actual, diagnostic)?;
    write_selected_features(&paths.selected_features, selection)?;
    config.save(&paths.run_config)?;

    paths.score_boxplot = paths
        .score_boxplot
        .take()
        .filter(|path| rendered(path, draw_score_boxplot(path, comparison)));
    paths.predicted_vs_actual_plot = paths
        .predicted_vs_actual_plot
        .take()
        .filter(|path| rendered(path, draw_predicted_vs_actual(path, diagnostic)));

    log::info!("Wrote report artifacts to '{}'", dir.display());
    Ok(paths)
}

pub fn write_score_comparison(path: &Path, comparison: &Comparison) -> Result<(), ReportError> {
    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    writer.write_record(SCORE_COMPARISON_HEADER)?;
    for model in &comparison.models {
        let s = &model.summary;
        writer.write_record([
            model.name.clone(),
            s.min.to_string(),
            s.max.to_string(),
            s.mean.to_string(),
            s.std.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_score_distribution(path: &Path, comparison: &Comparison) -> Result<(), ReportError> {
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(["model", "fold", "score"])?;
    for model in &comparison.models {
        for (fold, score) in model.fold_scores.iter().enumerate() {
            writer.write_record([model.name.clone(), fold.to_string(), score.to_string()])?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_predicted_vs_actual(path: &Path, diagnostic: &DiagnosticFit) -> Result<(), ReportError> {
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?;
    writer.write_record(["true_value", "prediction"])?;
    for (truth, prediction) in diagnostic.truth.iter().zip(diagnostic.predictions.iter()) {
        writer.write_record([truth.to_string(), prediction.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

fn rendered(path: &Path, result: Result<(), Box<dyn StdError>>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Skipping plot '{}': {e}", path.display());
            false
        }
    }
}

/// Padded `(low, high)` bounds over the finite values, or `None` if there
/// are none.
fn axis_range(values: impl IntoIterator<Item = f64>) -> Option<(f64, f64)> {
    let (low, high) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |bounds: Option<(f64, f64)>, v| match bounds {
            Some((low, high)) => Some((low.min(v), high.max(v))),
            None => Some((v, v)),
        })?;
    let pad = if high > low { 0.05 * (high - low) } else { 1.0 };
    Some((low - pad, high + pad))
}

/// One box per model over its fold scores.
pub fn draw_score_boxplot(path: &Path, comparison: &Comparison) -> Result<(), Box<dyn StdError>> {
    let models: Vec<_> = comparison
        .models
        .iter()
        .filter(|model| !model.fold_scores.is_empty())
        .collect();
    let names: Vec<String> = models.iter().map(|model| model.name.clone()).collect();
    let (low, high) = axis_range(models.iter().flat_map(|model| model.fold_scores.iter().copied()))
        .ok_or("no finite fold scores to plot")?;

    let root = BitMapBackend::new(path, (1024, 640)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Cross-validated score by model", ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(names[..].into_segmented(), low as f32..high as f32)?;
    chart
        .configure_mesh()
        .x_desc("Model")
        .y_desc("Score (negative RMSE)")
        .draw()?;
    chart.draw_series(names.iter().zip(&models).map(|(name, model)| {
        Boxplot::new_vertical(SegmentValue::CenterOf(name), &Quartiles::new(&model.fold_scores))
            .width(30)
            .style(BLUE)
    }))?;
    root.present()?;
    Ok(())
}

/// Held-out truth against prediction, with the identity line for reference.
pub fn draw_predicted_vs_actual(path: &Path, diagnostic: &DiagnosticFit) -> Result<(), Box<dyn StdError>> {
    let (low, high) = axis_range(
        diagnostic
            .truth
            .iter()
            .chain(diagnostic.predictions.iter())
            .copied(),
    )
    .ok_or("no finite predictions to plot")?;

    let root = BitMapBackend::new(path, (800, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Predicted vs actual (R² = {:.3})", diagnostic.r2),
            ("sans-serif", 24),
        )
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(low..high, low..high)?;
    chart
        .configure_mesh()
        .x_desc("Actual % proficient")
        .y_desc("Predicted % proficient")
        .draw()?;
    chart.draw_series(LineSeries::new([(low, low), (high, high)], &RED))?;
    chart.draw_series(
        diagnostic
            .truth
            .iter()
            .zip(diagnostic.predictions.iter())
            .map(|(&truth, &prediction)| Circle::new((truth, prediction), 4, BLUE.filled())),
    )?;
    root.present()?;
    Ok(())
}

fn write_selected_features(path: &Path, selection: &Selection) -> Result<(), ReportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    match selection {
        Selection::Features(names) => {
            for name in names {
                writeln!(writer, "{name}")?;
            }
        }
        Selection::NoResults => writeln!(writer, "{selection}")?,
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{ModelScores, ScoreSummary};
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use tempfile::tempdir;

    fn comparison() -> Comparison {
        let scores = vec![-2.0, -1.0, -3.0];
        Comparison {
            models: vec![
                ModelScores {
                    name: "Lin_F".to_string(),
                    summary: ScoreSummary::from_scores(&scores),
                    fold_scores: scores,
                },
                ModelScores {
                    name: "Poly_F".to_string(),
                    summary: ScoreSummary::from_scores(&[-4.0, -4.0, -4.0]),
                    fold_scores: vec![-4.0, -4.0, -4.0],
                },
            ],
        }
    }

    fn diagnostic() -> DiagnosticFit {
        DiagnosticFit {
            r2: 0.5,
            truth: array![40.0, 55.5],
            predictions: array![42.0, 50.0],
            train_rows: 8,
        }
    }

    #[test]
    fn writes_every_artifact() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested").join("report");
        let selection = Selection::Features(vec!["a".to_string(), "b".to_string()]);
        let paths = write_report(
            &out,
            &comparison(),
            &diagnostic(),
            &selection,
            &RunConfig::default(),
        )
        .unwrap();

        let summary = fs::read_to_string(&paths.score_comparison).unwrap();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "Model,Score (Min),Score (Max),Score (Mean),Score (Std)");
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("Lin_F,-3,-1,-2,"));
        assert_eq!(lines[2], "Poly_F,-4,-4,-4,0");

        let distribution = fs::read_to_string(&paths.score_distribution).unwrap();
        let lines: Vec<&str> = distribution.lines().collect();
        assert_eq!(lines[0], "model\tfold\tscore");
        assert_eq!(lines.len(), 7);
        assert_eq!(lines[2], "Lin_F\t1\t-1");

        let scatter = fs::read_to_string(&paths.predicted_vs_actual).unwrap();
        assert_eq!(scatter, "true_value\tprediction\n40\t42\n55.5\t50\n");

        let features = fs::read_to_string(&paths.selected_features).unwrap();
        assert_eq!(features, "a\nb\n");

        let saved = RunConfig::load(&paths.run_config).unwrap();
        assert_eq!(saved.folds, RunConfig::default().folds);

        for plot in [&paths.score_boxplot, &paths.predicted_vs_actual_plot]
            .into_iter()
            .flatten()
        {
            let bytes = fs::read(plot).unwrap();
            assert!(bytes.starts_with(b"\x89PNG"), "{} is not a PNG", plot.display());
        }
    }

    #[test]
    fn plots_are_png_files() {
        let dir = tempdir().unwrap();
        let boxplot = dir.path().join(SCORE_BOXPLOT_FILE);
        let scatter = dir.path().join(PREDICTED_VS_ACTUAL_PLOT_FILE);

        // Text rendering needs a system font; without one the plot is skipped.
        if draw_score_boxplot(&boxplot, &comparison()).is_ok() {
            assert!(fs::read(&boxplot).unwrap().starts_with(b"\x89PNG"));
        }
        if draw_predicted_vs_actual(&scatter, &diagnostic()).is_ok() {
            assert!(fs::read(&scatter).unwrap().starts_with(b"\x89PNG"));
        }
    }

    #[test]
    fn axis_range_pads_and_skips_non_finite() {
        let (low, high) = axis_range([-4.0, f64::NAN, -1.0, -2.0]).unwrap();
        assert_abs_diff_eq!(low, -4.15, epsilon = 1e-12);
        assert_abs_diff_eq!(high, -0.85, epsilon = 1e-12);

        assert_eq!(axis_range([3.0, 3.0]), Some((2.0, 4.0)));
        assert_eq!(axis_range([f64::NAN]), None);
        assert_eq!(axis_range(Vec::new()), None);
    }

    #[test]
    fn no_results_selection_is_written_as_sentinel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SELECTED_FEATURES_FILE);
        write_selected_features(&path, &Selection::NoResults).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "No results\n");
    }
}
