//! # Core Record Types
//!
//! Row-level structures shared by every stage of the analysis. Each stage
//! consumes the table produced by the previous one and hands a new, owned table
//! to the next; nothing is mutated in place across stage boundaries.

use std::fmt;

/// The composite key of one observation: a school district in one school year.
///
/// `school_year` is the spring year of the academic year (2015-16 is 2016).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DistrictYear {
    pub district_id: i64,
    pub school_year: i32,
}

impl DistrictYear {
    pub fn new(district_id: i64, school_year: i32) -> Self {
        Self {
            district_id,
            school_year,
        }
    }

    /// The key of the same district one school year earlier.
    pub fn previous_year(self) -> Self {
        Self {
            district_id: self.district_id,
            school_year: self.school_year - 1,
        }
    }

    /// Coerces a raw district-id cell into a key for `school_year`. Returns
    /// `None` when the id is absent or not an integral number; invalid keys
    /// are never zero-filled.
    pub fn parse(district_id: Option<&str>, school_year: i32) -> Option<Self> {
        let district_id = parse_integral(district_id?)?;
        Some(Self::new(district_id, school_year))
    }
}

impl fmt::Display for DistrictYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "district {} / {}", self.district_id, self.school_year)
    }
}

/// Parses integer text, also accepting integral decimal text such as `"4.0"`
/// (flat-file exports frequently write integer codes as floats).
pub fn parse_integral(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }
    let value = trimmed.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// Parses a real-valued cell. Thousands separators are tolerated; anything
/// else that is not a finite number yields `None`.
pub fn parse_real(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: String = trimmed.chars().filter(|&c| c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// One assessment observation for the grade-4, all-students stratum.
#[derive(Debug, Clone, PartialEq)]
pub struct AssessmentRecord {
    pub key: DistrictYear,
    pub district_name: String,
    /// Percentage of fourth-graders scoring proficient in math.
    pub target: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssessmentTable {
    pub records: Vec<AssessmentRecord>,
}

impl AssessmentTable {
    /// Concatenates per-file tables in the order given.
    pub fn concat(tables: impl IntoIterator<Item = AssessmentTable>) -> Self {
        Self {
            records: tables.into_iter().flat_map(|t| t.records).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One district-year of the long-format finance/demographic profile.
/// Cells hold the raw exported text; coercion happens at normalization time.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub key: DistrictYear,
    pub cells: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileTable {
    pub columns: Vec<String>,
    pub records: Vec<ProfileRecord>,
}

impl ProfileTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A merged row: profile cells joined with the assessment target.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictYearRecord {
    pub key: DistrictYear,
    pub district_name: String,
    pub target: Option<f64>,
    pub cells: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTable {
    pub columns: Vec<String>,
    pub records: Vec<DistrictYearRecord>,
}

impl MergedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A merged row extended with the district's target from the previous year.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedRecord {
    pub record: DistrictYearRecord,
    pub prior_achievement: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AugmentedTable {
    pub columns: Vec<String>,
    pub records: Vec<AugmentedRecord>,
}

impl AugmentedTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Counts of every row or cell the pipeline excluded or altered silently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropLedger {
    /// Rows whose district id or year failed integer coercion.
    pub invalid_keys: usize,
    /// Assessment rows outside the grade-4, all-students stratum.
    pub outside_stratum: usize,
    /// Later occurrences of a key already seen in the same source.
    pub duplicate_keys: usize,
    pub unmatched_assessments: usize,
    pub unmatched_profiles: usize,
    /// Merged rows with no record for the previous year.
    pub missing_prior: usize,
    pub sentinel_cells: usize,
    pub unparseable_cells: usize,
    /// Rows dropped for a missing feature or target.
    pub rows_missing_values: usize,
    pub imputed_cells: usize,
}

impl fmt::Display for DropLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid keys: {}, outside stratum: {}, duplicate keys: {}, unmatched assessments: {}, \
             unmatched profiles: {}, missing prior year: {}, sentinel cells: {}, \
             unparseable cells: {}, rows dropped for missing values: {}, imputed cells: {}",
            self.invalid_keys,
            self.outside_stratum,
            self.duplicate_keys,
            self.unmatched_assessments,
            self.unmatched_profiles,
            self.missing_prior,
            self.sentinel_cells,
            self.unparseable_cells,
            self.rows_missing_values,
            self.imputed_cells
        )
    }
}
