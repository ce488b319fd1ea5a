//! Sheet adapter - таблица плана в сетку строк для парсера
//!
//! Spreadsheets go through calamine (first worksheet only). A `.json` file
//! holding an array of rows is accepted too, which is handy for fixtures.

use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};
use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::parser::Row;

/// Load the first worksheet (or a JSON grid) as rows of optional cell text
pub fn load_rows(path: &Path) -> Result<Vec<Row>> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let rows = if is_json {
        rows_from_json(&std::fs::read_to_string(path)?)?
    } else {
        rows_from_workbook(path)?
    };

    info!(path = %path.display(), rows = rows.len(), "sheet loaded");
    Ok(rows)
}

fn rows_from_workbook(path: &Path) -> Result<Vec<Row>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| Error::Sheet(format!("open workbook {}: {e}", path.display())))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| Error::Sheet(format!("{} has no worksheets", path.display())))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| Error::Sheet(format!("read worksheet {sheet_name}: {e}")))?;

    Ok(range_to_rows(&range))
}

/// Used range to rows, padded so column A stays at index 0
fn range_to_rows(range: &Range<Data>) -> Vec<Row> {
    let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
    let row_offset = row_offset as usize;
    let col_offset = col_offset as usize;

    let mut rows: Vec<Row> = vec![Vec::new(); row_offset];
    for cells in range.rows() {
        let mut row: Row = vec![None; col_offset];
        row.extend(cells.iter().map(cell_text));
        rows.push(row);
    }
    rows
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        other => Some(other.to_string()),
    }
}

/// Parse `[[cell, ...], ...]` where a cell is a string, number or null
pub fn rows_from_json(json: &str) -> Result<Vec<Row>> {
    let Value::Array(rows) = serde_json::from_str::<Value>(json)? else {
        return Err(Error::Sheet("expected a JSON array of rows".to_string()));
    };

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| match row {
            Value::Array(cells) => Ok(cells.into_iter().map(json_cell).collect()),
            Value::Null => Ok(Vec::new()),
            _ => Err(Error::Sheet(format!("row {i} is not an array"))),
        })
        .collect()
}

fn json_cell(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        // 15.0 -> "15", like a spreadsheet shows it
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 => format!("{f}"),
            _ => n.to_string(),
        }),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}
