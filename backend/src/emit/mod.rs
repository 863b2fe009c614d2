//! Output workbook writer.
//!
//! Writes a grid of cells into a new single-sheet workbook. The file is
//! assembled in a temporary file next to the target and moved into place
//! only once complete, so a failed conversion never leaves a half-written
//! workbook behind.

use std::fs;
use std::io::Write;
use std::path::Path;

use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::error::{EmitError, EmitResult};
use crate::models::{CellValue, OUTPUT_SHEET};

/// Write the `IMPORT` workbook (header row included in `rows`).
pub fn write_import_workbook(rows: &[Vec<CellValue>], path: &Path) -> EmitResult<()> {
    write_workbook(OUTPUT_SHEET, rows, path)
}

/// Write `rows` into a new workbook whose only worksheet is `sheet_name`.
///
/// Row 1 holds `rows[0]`; columns follow tuple position. `Empty` cells are
/// left unwritten.
pub fn write_workbook(sheet_name: &str, rows: &[Vec<CellValue>], path: &Path) -> EmitResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let book = build_workbook(sheet_name, rows)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".conversor-")
        .suffix(".xlsx")
        .tempfile_in(dir)?;

    umya_spreadsheet::writer::xlsx::write_writer(&book, tmp.as_file_mut())
        .map_err(|e| EmitError::Write(e.to_string()))?;
    tmp.as_file_mut().flush()?;

    tmp.persist(path)
        .map_err(|e| EmitError::Persist(format!("{}: {}", path.display(), e.error)))?;

    Ok(())
}

fn build_workbook(sheet_name: &str, rows: &[Vec<CellValue>]) -> EmitResult<Spreadsheet> {
    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let sheet = book
        .new_sheet(sheet_name)
        .map_err(|e| EmitError::Write(e.to_string()))?;

    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            write_cell(sheet, (c + 1) as u32, (r + 1) as u32, cell);
        }
    }

    Ok(book)
}

fn write_cell(sheet: &mut Worksheet, col: u32, row: u32, value: &CellValue) {
    match value {
        CellValue::Empty => {}
        CellValue::Text(s) => {
            sheet.get_cell_mut((col, row)).set_value_string(s.clone());
        }
        CellValue::Number(n) => {
            sheet.get_cell_mut((col, row)).set_value_number(*n);
        }
        CellValue::Bool(b) => {
            sheet.get_cell_mut((col, row)).set_value_bool(*b);
        }
        CellValue::DateTime(_) | CellValue::Error(_) => {
            sheet.get_cell_mut((col, row)).set_value_string(value.display_text());
        }
    }
}
