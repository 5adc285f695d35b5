//! Prior-year achievement: each district-year is extended with the target of
//! the same district one school year earlier.

use crate::catalog::PRIOR_ACHIEVEMENT;
use crate::types::{AugmentedRecord, AugmentedTable, DistrictYear, DropLedger, MergedTable};
use ahash::AHashMap;

/// Attaches `prior_achievement` to every merged row. The lookup index keeps
/// the first row seen per key. A row whose previous year is absent, or whose
/// previous-year target is missing, gets no prior value; nothing is filled in.
pub fn attach_prior_achievement(table: MergedTable, ledger: &mut DropLedger) -> AugmentedTable {
    let mut index: AHashMap<DistrictYear, Option<f64>> = AHashMap::with_capacity(table.len());
    for record in &table.records {
        index.entry(record.key).or_insert(record.target);
    }

    let mut missing = 0usize;
    let records: Vec<AugmentedRecord> = table
        .records
        .into_iter()
        .map(|record| {
            let prior_achievement = index.get(&record.key.previous_year()).copied().flatten();
            if prior_achievement.is_none() {
                missing += 1;
            }
            AugmentedRecord {
                record,
                prior_achievement,
            }
        })
        .collect();

    ledger.missing_prior += missing;
    log::info!(
        "Attached {} to {} of {} district-years.",
        PRIOR_ACHIEVEMENT,
        records.len() - missing,
        records.len()
    );

    AugmentedTable {
        columns: table.columns,
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DistrictYearRecord;

    fn row(id: i64, year: i32, target: Option<f64>) -> DistrictYearRecord {
        DistrictYearRecord {
            key: DistrictYear::new(id, year),
            district_name: format!("D{id}"),
            target,
            cells: Vec::new(),
        }
    }

    fn prior_of(table: &AugmentedTable, id: i64, year: i32) -> Option<f64> {
        table
            .records
            .iter()
            .find(|r| r.record.key == DistrictYear::new(id, year))
            .and_then(|r| r.prior_achievement)
    }

    #[test]
    fn previous_year_target_is_attached() {
        let merged = MergedTable {
            columns: Vec::new(),
            records: vec![
                row(1, 2012, Some(52.0)),
                row(2, 2010, Some(70.0)),
                row(1, 2010, Some(40.0)),
                row(1, 2011, Some(45.0)),
            ],
        };
        let mut ledger = DropLedger::default();
        let augmented = attach_prior_achievement(merged, &mut ledger);

        assert_eq!(augmented.len(), 4);
        assert_eq!(prior_of(&augmented, 1, 2010), None);
        assert_eq!(prior_of(&augmented, 1, 2011), Some(40.0));
        assert_eq!(prior_of(&augmented, 1, 2012), Some(45.0));
        assert_eq!(prior_of(&augmented, 2, 2010), None);
        assert_eq!(ledger.missing_prior, 2);
        // Row order is preserved.
        assert_eq!(augmented.records[0].record.key, DistrictYear::new(1, 2012));
    }

    #[test]
    fn missing_previous_target_stays_absent() {
        let merged = MergedTable {
            columns: Vec::new(),
            records: vec![row(3, 2014, None), row(3, 2015, Some(61.0))],
        };
        let mut ledger = DropLedger::default();
        let augmented = attach_prior_achievement(merged, &mut ledger);
        assert_eq!(prior_of(&augmented, 3, 2015), None);
        assert_eq!(ledger.missing_prior, 2);
    }

    #[test]
    fn gap_year_is_not_bridged() {
        let merged = MergedTable {
            columns: Vec::new(),
            records: vec![row(5, 2010, Some(30.0)), row(5, 2012, Some(35.0))],
        };
        let mut ledger = DropLedger::default();
        let augmented = attach_prior_achievement(merged, &mut ledger);
        assert_eq!(prior_of(&augmented, 5, 2012), None);
    }

    #[test]
    fn duplicate_previous_year_uses_first_row() {
        let merged = MergedTable {
            columns: Vec::new(),
            records: vec![
                row(7, 2011, Some(48.0)),
                row(7, 2011, Some(90.0)),
                row(7, 2012, Some(50.0)),
            ],
        };
        let mut ledger = DropLedger::default();
        let augmented = attach_prior_achievement(merged, &mut ledger);
        assert_eq!(prior_of(&augmented, 7, 2012), Some(48.0));

        // Reversing the duplicates flips the winner.
        let merged = MergedTable {
            columns: Vec::new(),
            records: vec![
                row(7, 2011, Some(90.0)),
                row(7, 2011, Some(48.0)),
                row(7, 2012, Some(50.0)),
            ],
        };
        let augmented = attach_prior_achievement(merged, &mut DropLedger::default());
        assert_eq!(prior_of(&augmented, 7, 2012), Some(90.0));
    }
}
