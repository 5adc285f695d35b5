//! The district profile export: one row per district, one column per metric
//! and school year. Reshaped here to one row per district-year.

use super::{IngestError, read_text_frame, text_column};
use crate::catalog::normalize_column_name;
use crate::types::{DistrictYear, DropLedger, ProfileRecord, ProfileTable, parse_integral};
use ahash::AHashMap;
use std::path::Path;

/// Header of the district-id column as exported.
pub const DISTRICT_ID_HEADER: &str = "Agency ID - NCES Assigned [District] Latest available year";

/// Reads the wide export at `path` and reshapes it to long form.
pub fn load_profile(path: &Path, ledger: &mut DropLedger) -> Result<ProfileTable, IngestError> {
    let df = read_text_frame(path)?;
    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let columns = headers
        .iter()
        .map(|name| text_column(&df, name, path))
        .collect::<Result<Vec<_>, _>>()?;

    let wide = WideTable {
        headers,
        rows: (0..df.height())
            .map(|row| columns.iter().map(|column| column[row].clone()).collect())
            .collect(),
    };
    let table = wide.to_long(path, ledger)?;
    log::info!(
        "Reshaped profile '{}' to {} district-years with {} metrics",
        path.display(),
        table.len(),
        table.columns.len()
    );
    Ok(table)
}

/// Splits a trailing school-year token off a header: `"Total Students 2015-16"`
/// gives `("Total Students", 2016)`. The token's two years must be
/// consecutive; the returned year is the spring year.
pub fn split_year_suffix(header: &str) -> Option<(&str, i32)> {
    let trimmed = header.trim_end();
    let split = trimmed.len().checked_sub(7)?;
    if !trimmed.is_char_boundary(split) {
        return None;
    }
    let (stub, token) = trimmed.split_at(split);
    let bytes = token.as_bytes();
    if bytes[4] != b'-' || !bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit) {
        return None;
    }
    let first: i32 = token[..4].parse().ok()?;
    let second: i32 = token[5..].parse().ok()?;
    if (first + 1) % 100 != second {
        return None;
    }
    Some((stub, first + 1))
}

/// A header row plus raw text rows, as exported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WideTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl WideTable {
    /// Reshapes to one record per (district, year), years ascending within a
    /// district and districts in file order. Columns are the normalized metric
    /// stubs in order of first appearance; a stub with no column for some year
    /// has an empty cell there. Non-year columns other than the id are ignored.
    pub fn to_long(&self, source: &Path, ledger: &mut DropLedger) -> Result<ProfileTable, IngestError> {
        let id_key = normalize_column_name(DISTRICT_ID_HEADER);
        let id_column = self
            .headers
            .iter()
            .position(|h| normalize_column_name(h) == id_key)
            .ok_or_else(|| IngestError::ColumnNotFound {
                column: DISTRICT_ID_HEADER.to_string(),
                path: source.to_path_buf(),
            })?;

        let mut stubs: Vec<String> = Vec::new();
        let mut stub_index: AHashMap<String, usize> = AHashMap::new();
        let mut years: Vec<i32> = Vec::new();
        // (stub, year) -> source column
        let mut layout: AHashMap<(usize, i32), usize> = AHashMap::new();

        for (column, header) in self.headers.iter().enumerate() {
            if column == id_column {
                continue;
            }
            let Some((stub, year)) = split_year_suffix(header) else {
                continue;
            };
            let stub = normalize_column_name(stub);
            let next = stubs.len();
            let s = *stub_index.entry(stub.clone()).or_insert_with(|| {
                stubs.push(stub);
                next
            });
            if layout.contains_key(&(s, year)) {
                log::warn!(
                    "Ignoring repeated column '{}' in '{}'; the first one is used.",
                    header,
                    source.display()
                );
                continue;
            }
            layout.insert((s, year), column);
            if !years.contains(&year) {
                years.push(year);
            }
        }

        if layout.is_empty() {
            return Err(IngestError::NoYearColumns(source.to_path_buf()));
        }
        years.sort_unstable();

        let mut records = Vec::with_capacity(self.rows.len() * years.len());
        for (row_number, row) in self.rows.iter().enumerate() {
            let raw_id = row.get(id_column).cloned().flatten();
            let Some(district_id) = raw_id.as_deref().and_then(parse_integral) else {
                ledger.invalid_keys += 1;
                log::warn!(
                    "Skipping profile row {}: district id {:?} is not an integer.",
                    row_number + 1,
                    raw_id.unwrap_or_default()
                );
                continue;
            };
            for &year in &years {
                let cells = (0..stubs.len())
                    .map(|s| {
                        layout
                            .get(&(s, year))
                            .and_then(|&column| row.get(column).cloned().flatten())
                    })
                    .collect();
                records.push(ProfileRecord {
                    key: DistrictYear::new(district_id, year),
                    cells,
                });
            }
        }

        Ok(ProfileTable {
            columns: stubs,
            records,
        })
    }
}
