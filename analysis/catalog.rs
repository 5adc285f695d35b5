//! The fixed list of designated feature columns and their groupings.
//!
//! Column names are stored in normalized form (see [`normalize_column_name`]),
//! which is how the profile loader names the reshaped columns.

use std::fmt;

/// Name of the assessment field used as the regression target.
pub const TARGET_COLUMN: &str = "math_test_pct_prof_midpt";

/// Name of the engineered prior-year feature.
pub const PRIOR_ACHIEVEMENT: &str = "prior_achievement";

/// The source grouping of a feature, which decides its model tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureGroup {
    /// Per-pupil and total district finance amounts.
    Finance,
    /// District enrollment counts by subgroup.
    Demographic,
    /// Public-school counts; screened, but part of no tier.
    School,
    /// The engineered prior-year achievement.
    Prior,
}

impl FeatureGroup {
    /// Infers the group from the bracketed source tag that ends each
    /// normalized export column name.
    pub fn infer(column: &str) -> Self {
        if column == PRIOR_ACHIEVEMENT {
            Self::Prior
        } else if column.ends_with("_district_finance") {
            Self::Finance
        } else if column.ends_with("_district") {
            Self::Demographic
        } else {
            Self::School
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Finance => "finance",
            Self::Demographic => "demographic",
            Self::School => "school",
            Self::Prior => "prior achievement",
        }
    }
}

impl fmt::Display for FeatureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpec {
    pub column: String,
    pub group: FeatureGroup,
}

impl FeatureSpec {
    pub fn new(column: impl Into<String>, group: FeatureGroup) -> Self {
        Self {
            column: column.into(),
            group,
        }
    }

    pub fn inferred(column: impl Into<String>) -> Self {
        let column = column.into();
        let group = FeatureGroup::infer(&column);
        Self { column, group }
    }
}

/// An ordered list of designated features. The prior-achievement feature is
/// always the last entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureCatalog {
    features: Vec<FeatureSpec>,
}

const ELSI_FEATURES: [&str; 42] = [
    "total_number_of_public_schools_public_school",
    "total_students_all_grades_excludes_ae_district",
    "limited_english_proficient_lep_english_language_learners_ell_district",
    "individualized_education_program_students_district",
    "free_lunch_eligible_public_school",
    "grades_1_8_students_district",
    "grades_9_12_students_district",
    "grade_4_students_district",
    "american_indian_alaska_native_students_district",
    "asian_or_asian_pacific_islander_students_district",
    "hispanic_students_district",
    "black_students_district",
    "white_students_district",
    "hawaiian_nat_pacific_isl_students_district",
    "two_or_more_races_students_district",
    "total_revenue_totalrev_per_pupil_v33_district_finance",
    "total_revenue_local_sources_tlocrev_per_pupil_v33_district_finance",
    "total_revenue_state_sources_tstrev_per_pupil_v33_district_finance",
    "total_revenue_federal_sources_tfedrev_per_pupil_v33_district_finance",
    "total_current_expenditures_instruction_tcurinst_per_pupil_v33_district_finance",
    "total_current_expenditures_support_services_tcurssvc_per_pupil_v33_district_finance",
    "total_current_expenditures_other_elsec_programs_tcuroth_per_pupil_v33_district_finance",
    "total_current_expenditures_salary_z32_per_pupil_v33_district_finance",
    "total_current_expenditures_benefits_z34_per_pupil_v33_district_finance",
    "total_expenditures_totalexp_per_pupil_v33_district_finance",
    "total_expenditures_capital_outlay_tcapout_per_pupil_v33_district_finance",
    "total_current_expenditures_non_elsec_programs_tnonelse_per_pupil_v33_district_finance",
    "total_current_expenditures_tcurelsc_per_pupil_v33_district_finance",
    "instructional_expenditures_e13_per_pupil_v33_district_finance",
    "teacher_salaries_special_education_programs_z36_district_finance",
    "teacher_salaries_regular_education_programs_z35_district_finance",
    "teacher_salaries_vocational_education_programs_z37_district_finance",
    "total_general_revenue_totalrev_district_finance",
    "total_revenue_local_sources_tlocrev_district_finance",
    "total_revenue_state_sources_tstrev_district_finance",
    "total_revenue_federal_sources_tfedrev_district_finance",
    "total_current_expenditures_elsec_education_tcurelsc_district_finance",
    "total_current_expenditures_instruction_tcurinst_district_finance",
    "total_current_expenditures_support_services_tcurssvc_district_finance",
    "total_current_expenditures_other_elsec_programs_tcuroth_district_finance",
    "total_current_expenditures_salary_z32_district_finance",
    "total_current_expenditures_benefits_z34_district_finance",
];

impl FeatureCatalog {
    /// Builds a catalog from profile features; `prior_achievement` is appended.
    pub fn new(profile_features: Vec<FeatureSpec>) -> Self {
        let mut features: Vec<FeatureSpec> = profile_features
            .into_iter()
            .filter(|spec| spec.column != PRIOR_ACHIEVEMENT)
            .collect();
        features.push(FeatureSpec::new(PRIOR_ACHIEVEMENT, FeatureGroup::Prior));
        Self { features }
    }

    /// The designated feature list of the ELSi district export.
    pub fn elsi() -> Self {
        Self::new(ELSI_FEATURES.iter().map(|&c| FeatureSpec::inferred(c)).collect())
    }

    pub fn features(&self) -> &[FeatureSpec] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Normalizes an export header: lowercase, every run of non-alphanumeric
/// characters collapsed to one `_`, no leading or trailing `_`.
pub fn normalize_column_name(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut pending_separator = false;
    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !normalized.is_empty() {
                normalized.push('_');
            }
            pending_separator = false;
            normalized.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    normalized
}
