#![deny(dead_code)]
#![deny(unused_imports)]

pub mod catalog;
pub mod compare;
pub mod config;
pub mod ingest;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod regression;
pub mod report;
pub mod select;
pub mod stats;
pub mod temporal;
pub mod types;
pub mod validation;

pub use config::RunConfig;
pub use pipeline::{AnalysisOutcome, PipelineError, run};
