//! Inner join of the assessment and profile tables on `(district, year)`.

use crate::types::{
    AssessmentRecord, AssessmentTable, DistrictYear, DistrictYearRecord, DropLedger, MergedTable,
    ProfileTable,
};
use ahash::{AHashMap, AHashSet};

/// Joins the two tables on equal keys. Output rows follow the profile table's
/// order; a key present in only one table is dropped and counted.
///
/// Keys are unique per table: when a key repeats, the first occurrence is
/// kept and every later one is dropped and counted as a duplicate.
pub fn merge_tables(
    assessments: AssessmentTable,
    profile: ProfileTable,
    ledger: &mut DropLedger,
) -> MergedTable {
    let mut by_key: AHashMap<DistrictYear, AssessmentRecord> =
        AHashMap::with_capacity(assessments.len());
    for record in assessments.records {
        if by_key.contains_key(&record.key) {
            log::warn!("Duplicate assessment row for {}; keeping the first.", record.key);
            ledger.duplicate_keys += 1;
            continue;
        }
        by_key.insert(record.key, record);
    }

    let mut seen_profiles: AHashSet<DistrictYear> = AHashSet::with_capacity(profile.len());
    let mut records = Vec::with_capacity(profile.len().min(by_key.len()));
    let mut unmatched_profiles = 0usize;

    for row in profile.records {
        if !seen_profiles.insert(row.key) {
            log::warn!("Duplicate profile row for {}; keeping the first.", row.key);
            ledger.duplicate_keys += 1;
            continue;
        }
        match by_key.remove(&row.key) {
            Some(assessment) => records.push(DistrictYearRecord {
                key: row.key,
                district_name: assessment.district_name,
                target: assessment.target,
                cells: row.cells,
            }),
            None => unmatched_profiles += 1,
        }
    }

    // Matched assessments were removed from the index; the rest had no partner.
    let unmatched_assessments = by_key.len();
    ledger.unmatched_profiles += unmatched_profiles;
    ledger.unmatched_assessments += unmatched_assessments;
    log::info!(
        "Merged {} district-years ({} assessment rows and {} profile rows unmatched).",
        records.len(),
        unmatched_assessments,
        unmatched_profiles
    );

    MergedTable {
        columns: profile.columns,
        records,
    }
}
