use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

use crate::error::Result;

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Markdown table of the first `max_rows` rows.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}", render_table(rows, max_rows));
    if rows.len() > max_rows {
        println!("({} more rows)", rows.len() - max_rows);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IndicatorMape;

    #[test]
    fn renders_markdown_with_placeholders() {
        let rows = vec![IndicatorMape {
            indicator: "cov_aps".to_string(),
            period: None,
            mape: None,
            pairs: 0,
        }];
        let table = render_table(&rows, 5);
        assert!(table.contains("| Indicator"));
        assert!(table.contains("(all)"));
        assert!(table.contains("| -"));
        assert_eq!(render_table::<IndicatorMape>(&[], 5), "(no rows)");
    }

    #[test]
    fn writes_optional_fields_as_empty_csv_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mape.csv");
        let rows = vec![IndicatorMape {
            indicator: "cov_aps".to_string(),
            period: Some("2025-01".to_string()),
            mape: None,
            pairs: 0,
        }];
        write_csv(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "indicator,period,mape,pairs\ncov_aps,2025-01,,0\n");
    }
}
