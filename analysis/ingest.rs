//! # Tabular Loading
//!
//! Reads the two flat sources of the analysis into typed tables:
//!
//! - [`assessments::load_assessments`]: one CSV per school year, filtered to the
//!   grade-4, all-students stratum.
//! - [`profile::load_profile`]: the wide district profile export, reshaped to
//!   one row per district-year.
//!
//! Every column is read as text. Coercion to integers and reals happens in
//! this crate so that suppression markers and malformed cells can be counted
//! instead of being silently nulled by the CSV reader.

pub mod assessments;
pub mod profile;

use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use assessments::load_assessments;
pub use profile::load_profile;

/// A comprehensive error type for all loading failures. Every variant is fatal.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("The input directory '{0}' does not exist or is not a directory.")]
    DirectoryNotFound(PathBuf),
    #[error("No .csv files were found in directory '{0}'.")]
    NoInputFiles(PathBuf),
    #[error(
        "The required column '{column}' was not found in '{path}'. Please check that the export has the expected schema."
    )]
    ColumnNotFound { column: String, path: PathBuf },
    #[error("Cannot derive a school year from the file name '{0}'; it must end in a four-digit year.")]
    InvalidFileName(PathBuf),
    #[error("No year-suffixed columns (e.g. 'Total Students 2015-16') were found in '{0}'.")]
    NoYearColumns(PathBuf),
}

/// Reads a comma-separated file with a header row, every column as text.
/// Empty fields come back as nulls. Invalid UTF-8 bytes are replaced with
/// U+FFFD so that one mis-encoded cell cannot fail the whole file.
fn read_text_frame(path: &Path) -> Result<DataFrame, IngestError> {
    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(0))
                .with_parse_options(
                    CsvParseOptions::default().with_encoding(CsvEncoding::LossyUtf8),
                ),
        )
        .finish()?;
    Ok(df)
}

/// Extracts one column as owned text cells, failing with the column and file
/// name when it is absent.
fn text_column(
    df: &DataFrame,
    name: &str,
    path: &Path,
) -> Result<Vec<Option<String>>, IngestError> {
    if !df.get_column_names().iter().any(|c| c.as_str() == name) {
        return Err(IngestError::ColumnNotFound {
            column: name.to_string(),
            path: path.to_path_buf(),
        });
    }
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let cells = series
        .str()?
        .into_iter()
        .map(|cell| cell.map(str::to_string))
        .collect();
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn every_column_is_read_as_text() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,value,code").unwrap();
        writeln!(file, "0100005,12.50,†").unwrap();
        writeln!(file, "0100006,,99").unwrap();
        file.flush().unwrap();

        let df = read_text_frame(file.path()).unwrap();
        assert_eq!(df.height(), 2);
        let ids = text_column(&df, "id", file.path()).unwrap();
        // Leading zeros survive because nothing is inferred.
        assert_eq!(ids[0].as_deref(), Some("0100005"));
        let values = text_column(&df, "value", file.path()).unwrap();
        assert_eq!(values, vec![Some("12.50".to_string()), None]);
        let codes = text_column(&df, "code", file.path()).unwrap();
        assert_eq!(codes[0].as_deref(), Some("†"));
    }

    #[test]
    fn invalid_utf8_cell_is_replaced_not_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"id,value\n1,\x86\n2,7.5\n").unwrap();
        file.flush().unwrap();

        let df = read_text_frame(file.path()).unwrap();
        assert_eq!(df.height(), 2);
        let values = text_column(&df, "value", file.path()).unwrap();
        assert_eq!(values[0].as_deref(), Some("\u{FFFD}"));
        assert_eq!(values[1].as_deref(), Some("7.5"));
    }

    #[test]
    fn absent_column_names_the_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a,b").unwrap();
        writeln!(file, "1,2").unwrap();
        file.flush().unwrap();

        let df = read_text_frame(file.path()).unwrap();
        match text_column(&df, "c", file.path()) {
            Err(IngestError::ColumnNotFound { column, path }) => {
                assert_eq!(column, "c");
                assert_eq!(path, file.path());
            }
            other => panic!("Expected ColumnNotFound, got {other:?}"),
        }
    }
}
