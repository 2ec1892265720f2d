use crate::error::StoreError;
use crate::types::{IndicatorValue, RawIndicatorRow};
use crate::util::{clean_text, parse_f64_safe};
use csv::ReaderBuilder;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
}

/// Load one indicator relation from a CSV file with an
/// `indicator,key,period,value` header.
///
/// Rows that fail to deserialize or lack any of the four fields are counted
/// in `parse_errors` and skipped. A file that does not exist is an empty
/// relation.
pub fn load_values(
    path: &Path,
    relation: &'static str,
) -> Result<(Vec<IndicatorValue>, LoadReport), StoreError> {
    if !path.exists() {
        return Ok((Vec::new(), LoadReport::default()));
    }
    let file = std::fs::File::open(path).map_err(|source| StoreError::Io { relation, source })?;
    read_values(file, relation)
}

pub fn read_values<R: Read>(
    reader: R,
    relation: &'static str,
) -> Result<(Vec<IndicatorValue>, LoadReport), StoreError> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    // A broken header makes every row meaningless, so fail the whole read.
    rdr.headers()
        .map_err(|source| StoreError::Csv { relation, source })?;

    let mut report = LoadReport::default();
    let mut rows = Vec::new();
    for result in rdr.deserialize::<RawIndicatorRow>() {
        report.total_rows += 1;
        let raw = match result {
            Ok(r) => r,
            Err(_) => {
                report.parse_errors += 1;
                continue;
            }
        };
        let (Some(indicator), Some(key), Some(period), Some(value)) = (
            clean_text(raw.indicator),
            clean_text(raw.key),
            clean_text(raw.period),
            parse_f64_safe(raw.value.as_deref()),
        ) else {
            report.parse_errors += 1;
            continue;
        };
        rows.push(IndicatorValue {
            indicator,
            key,
            period,
            value,
        });
    }
    report.loaded_rows = rows.len();
    Ok((rows, report))
}
