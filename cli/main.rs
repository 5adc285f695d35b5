#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::time::Instant;

use proficiency::catalog::FeatureCatalog;
use proficiency::config::{MissingPolicy, RunConfig};
use proficiency::pipeline::{AnalysisOutcome, Stage, StageObserver, run_with_catalog};

#[derive(Args)]
pub struct RunArgs {
    /// Directory of annual assessment CSV files (one per school year)
    #[arg(long, value_name = "DIR")]
    pub assessments: Option<PathBuf>,

    /// Wide district profile export (CSV)
    #[arg(long, value_name = "CSV")]
    pub profile: Option<PathBuf>,

    /// Directory the report artifacts are written to
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// TOML run configuration; flags given here override it
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Number of cross-validation folds
    #[arg(long, value_name = "N")]
    pub folds: Option<usize>,

    /// Seed for the diagnostic train/test split (random when omitted)
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Impute missing feature cells with the column mean instead of dropping rows
    #[arg(long)]
    pub impute_mean: bool,
}

impl RunArgs {
    /// Defaults, then the TOML file, then flags.
    fn resolve(self) -> Result<RunConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => RunConfig::read(path)?,
            None => RunConfig::default(),
        };
        if let Some(dir) = self.assessments {
            config.assessments_dir = dir;
        }
        if let Some(path) = self.profile {
            config.profile_path = path;
        }
        if let Some(dir) = self.output {
            config.output_dir = dir;
        }
        if let Some(folds) = self.folds {
            config.folds = folds;
        }
        if self.seed.is_some() {
            config.split_seed = self.seed;
        }
        if self.impute_mean {
            config.missing_policy = MissingPolicy::ImputeMean;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Parser)]
#[command(
    name = "proficiency",
    about = "District fourth-grade math proficiency analysis",
    long_about = "Merges annual assessment results with district finance and demographic \
                 profiles, screens features for collinearity, and compares linear and \
                 polynomial regressions under k-fold cross-validation."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and write the report artifacts
    #[command(about = "Run the analysis (outputs: overall_score_comparison.csv and plot data)")]
    Run(RunArgs),

    /// List the candidate feature columns and their groups
    #[command(about = "Print the feature catalog")]
    Features,

    /// Display version information
    #[command(about = "Display version information")]
    Version,
}

/// Logs the wall-clock time of each stage.
#[derive(Default)]
struct StageTimer {
    started: Option<Instant>,
}

impl StageObserver for StageTimer {
    fn on_stage_start(&mut self, _stage: Stage) {
        self.started = Some(Instant::now());
    }

    fn on_stage_finish(&mut self, stage: Stage) {
        if let Some(start) = self.started.take() {
            log::debug!("Finished {stage} in {:.2?}", start.elapsed());
        }
    }
}

fn run_analysis(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.resolve()?;
    let mut timer = StageTimer::default();
    let outcome = run_with_catalog(&config, &FeatureCatalog::elsi(), &mut timer)?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &AnalysisOutcome) {
    println!("Rows analysed: {}", outcome.rows);
    println!("Selected features: {}", outcome.selection);
    println!();
    print!("{}", outcome.comparison);
    println!();
    println!("Diagnostic fit R²: {:.4}", outcome.diagnostic.r2);
    println!("Exclusions: {}", outcome.ledger);
    println!(
        "Score comparison written to {}",
        outcome.report.score_comparison.display()
    );
}

fn print_features() {
    let catalog = FeatureCatalog::elsi();
    for spec in catalog.features() {
        println!("{}\t{}", spec.group, spec.column);
    }
}

fn print_version_info() {
    println!("proficiency {}", env!("CARGO_PKG_VERSION"));
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Run(args)) => run_analysis(args),
        Some(Commands::Features) => {
            print_features();
            Ok(())
        }
        Some(Commands::Version) => {
            print_version_info();
            Ok(())
        }
        None => {
            let mut command = Cli::command();
            command.print_help().map_err(Into::into)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
