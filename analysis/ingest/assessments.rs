//! Annual district assessment files.

use super::{IngestError, read_text_frame, text_column};
use crate::catalog::TARGET_COLUMN;
use crate::config::StratumFilter;
use crate::types::{
    AssessmentRecord, AssessmentTable, DistrictYear, DropLedger, parse_integral, parse_real,
};
use natord::compare;
use std::fs;
use std::path::{Path, PathBuf};

pub const DISTRICT_ID_COLUMN: &str = "leaid_num";
pub const DISTRICT_NAME_COLUMN: &str = "lea_name";
pub const GRADE_COLUMN: &str = "grade_edfacts";

/// Disaggregation flags; a row describes all students only when every one of
/// them holds the reserved all-students code.
pub const DISAGGREGATION_COLUMNS: [&str; 9] = [
    "race",
    "sex",
    "lep",
    "homeless",
    "migrant",
    "disability",
    "econ_disadvantaged",
    "foster_care",
    "military_connected",
];

/// Loads every `*.csv` in `dir`, in natural file-name order, and concatenates
/// the stratum rows of each file.
pub fn load_assessments(
    dir: &Path,
    stratum: &StratumFilter,
    ledger: &mut DropLedger,
) -> Result<AssessmentTable, IngestError> {
    let files = assessment_files(dir)?;
    log::info!(
        "Loading {} assessment files from '{}'",
        files.len(),
        dir.display()
    );

    let mut tables = Vec::with_capacity(files.len());
    for path in &files {
        let table = load_assessment_file(path, stratum, ledger)?;
        log::info!(
            "  {}: {} rows in stratum",
            path.file_name().unwrap_or_default().to_string_lossy(),
            table.len()
        );
        tables.push(table);
    }
    Ok(AssessmentTable::concat(tables))
}

fn assessment_files(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound(dir.to_path_buf()));
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "csv"))
        .collect();

    if files.is_empty() {
        return Err(IngestError::NoInputFiles(dir.to_path_buf()));
    }
    files.sort_by(|a, b| compare(&a.to_string_lossy(), &b.to_string_lossy()));
    Ok(files)
}

/// The school year a file covers: the last four characters of its stem,
/// e.g. `edfacts_assessments_2016.csv` is 2016.
pub fn school_year_from_path(path: &Path) -> Result<i32, IngestError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let chars: Vec<char> = stem.chars().collect();
    if chars.len() < 4 {
        return Err(IngestError::InvalidFileName(path.to_path_buf()));
    }
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    if !suffix.chars().all(|c| c.is_ascii_digit()) {
        return Err(IngestError::InvalidFileName(path.to_path_buf()));
    }
    suffix
        .parse()
        .map_err(|_| IngestError::InvalidFileName(path.to_path_buf()))
}

/// Reads one file into an immutable per-file table.
pub fn load_assessment_file(
    path: &Path,
    stratum: &StratumFilter,
    ledger: &mut DropLedger,
) -> Result<AssessmentTable, IngestError> {
    let school_year = school_year_from_path(path)?;
    let df = read_text_frame(path)?;

    // Resolve every required column before touching any row.
    let grades = text_column(&df, GRADE_COLUMN, path)?;
    let flags = DISAGGREGATION_COLUMNS
        .iter()
        .map(|name| text_column(&df, name, path))
        .collect::<Result<Vec<_>, _>>()?;
    let ids = text_column(&df, DISTRICT_ID_COLUMN, path)?;
    let names = text_column(&df, DISTRICT_NAME_COLUMN, path)?;
    let targets = text_column(&df, TARGET_COLUMN, path)?;

    let is_code = |cell: &Option<String>, code: i64| {
        cell.as_deref().and_then(parse_integral) == Some(code)
    };

    let mut records = Vec::new();
    for row in 0..df.height() {
        let in_stratum = is_code(&grades[row], stratum.grade)
            && flags
                .iter()
                .all(|column| is_code(&column[row], stratum.all_students_code));
        if !in_stratum {
            ledger.outside_stratum += 1;
            continue;
        }

        let Some(key) = DistrictYear::parse(ids[row].as_deref(), school_year) else {
            ledger.invalid_keys += 1;
            log::warn!(
                "Skipping row {} of '{}': district id {:?} is not an integer.",
                row + 1,
                path.display(),
                ids[row].as_deref().unwrap_or_default()
            );
            continue;
        };

        records.push(AssessmentRecord {
            key,
            district_name: names[row].clone().unwrap_or_default(),
            target: targets[row].as_deref().and_then(parse_real),
        });
    }
    Ok(AssessmentTable { records })
}
