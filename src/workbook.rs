use crate::error::{GradeError, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

/// First worksheet of an xlsx/xls payload as a grid of display strings.
///
/// Rows and columns count from the top-left of the used range, so a table
/// placed at B3 reads the same as one placed at A1. Blank rows inside the
/// range are kept.
pub fn read_first_sheet(bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| GradeError::Parse(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| GradeError::Parse("workbook has no sheets".to_string()))?
        .map_err(|e| GradeError::Parse(e.to_string()))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
