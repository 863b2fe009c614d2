//! Workbook ingestion and structural validation.
//!
//! Opens the uploaded workbook, reads the `COLUMNA` worksheet into a dense
//! [`RawGrid`], locates the header row and checks the required columns.
//! Any failure here is fatal for the whole conversion.
//!
//! # Example
//! ```ignore
//! use conversor::ingest::{ingest, Workbook};
//!
//! let mut workbook = Workbook::open("facturas.xlsx")?;
//! let sheet = ingest(&mut workbook)?;
//! println!("Header on row {}", sheet.grid.sheet_row_number(sheet.header_row));
//! ```

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use std::io::Cursor;
use std::path::Path;

use crate::error::{IngestError, IngestResult};
use crate::models::{CellValue, HEADER_MARKER, INPUT_SHEET, REQUIRED_COLUMNS};

static EMPTY: CellValue = CellValue::Empty;

// =============================================================================
// Workbook
// =============================================================================

/// An opened input workbook (xlsx, xls, xlsb or ods).
pub struct Workbook {
    sheets: Sheets<Cursor<Vec<u8>>>,
}

impl Workbook {
    /// Open a workbook from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> IngestResult<Self> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            IngestError::Open(format!("cannot read '{}': {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(bytes)
    }

    /// Open a workbook from an uploaded buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> IngestResult<Self> {
        let sheets = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| IngestError::Open(e.to_string()))?;
        Ok(Self { sheets })
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheet_names().iter().any(|s| s == name)
    }

    /// Read a worksheet into a dense grid.
    pub fn read_sheet(&mut self, name: &str) -> IngestResult<RawGrid> {
        if !self.has_sheet(name) {
            return Err(IngestError::MissingSheet { sheet: name.to_string() });
        }

        let range = self.sheets.worksheet_range(name).map_err(|e| IngestError::Sheet {
            sheet: name.to_string(),
            message: e.to_string(),
        })?;

        Ok(RawGrid::from_range(&range))
    }
}

/// Convert a calamine cell into our own cell model.
pub fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        // Resolved against the workbook's own epoch (1900 or 1904)
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => CellValue::DateTime(value),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

// =============================================================================
// Raw grid
// =============================================================================

/// Dense 2-D grid of cell values, every row padded to the same width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGrid {
    rows: Vec<Vec<CellValue>>,
    width: usize,
    /// 0-based worksheet row of `rows[0]`
    first_row: usize,
}

impl RawGrid {
    /// Build a grid from rows starting at worksheet row 1.
    pub fn from_rows(rows: Vec<Vec<CellValue>>) -> Self {
        Self::with_origin(rows, 0)
    }

    fn with_origin(mut rows: Vec<Vec<CellValue>>, first_row: usize) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, CellValue::Empty);
        }
        Self { rows, width, first_row }
    }

    fn from_range(range: &Range<Data>) -> Self {
        // calamine ranges start at the first used cell, not at A1
        let (first_row, first_col) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let rows = range
            .rows()
            .map(|row| {
                let mut cells = vec![CellValue::Empty; first_col];
                cells.extend(row.iter().map(cell_from_data));
                cells
            })
            .collect();

        Self::with_origin(rows, first_row)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> &[CellValue] {
        self.rows.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[CellValue]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Cell lookup; anything outside the grid reads as `Empty`.
    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// 1-based worksheet row number of a grid row, for messages.
    pub fn sheet_row_number(&self, index: usize) -> usize {
        self.first_row + index + 1
    }
}

// =============================================================================
// Header index
// =============================================================================

/// Ordered mapping from column label to zero-based column offset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderIndex {
    entries: Vec<(String, usize)>,
}

impl HeaderIndex {
    /// Build the index from a header row.
    ///
    /// Labels are trimmed and blank header cells skipped. When a label
    /// repeats, the right-most column wins but keeps its first position
    /// in display order.
    pub fn from_row(row: &[CellValue]) -> Self {
        let mut entries: Vec<(String, usize)> = Vec::new();

        for (col, cell) in row.iter().enumerate() {
            let label = cell.display_text().trim().to_string();
            if label.is_empty() {
                continue;
            }
            match entries.iter_mut().find(|(l, _)| *l == label) {
                Some(entry) => entry.1 = col,
                None => entries.push((label, col)),
            }
        }

        Self { entries }
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, col)| *col)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(l, _)| l.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fail with the first label (in the given order) that is absent.
    pub fn require(&self, labels: &[&str]) -> IngestResult<()> {
        match labels.iter().find(|l| !self.contains(l)) {
            Some(missing) => Err(IngestError::MissingColumn(missing.to_string())),
            None => Ok(()),
        }
    }

    /// Labels from `labels` that are absent, in order.
    pub fn missing<'a>(&self, labels: &[&'a str]) -> Vec<&'a str> {
        labels.iter().copied().filter(|l| !self.contains(l)).collect()
    }
}

// =============================================================================
// Validation
// =============================================================================

/// The `COLUMNA` sheet after structural validation.
#[derive(Debug, Clone)]
pub struct ValidatedSheet {
    pub grid: RawGrid,
    /// Grid index of the header row
    pub header_row: usize,
    pub headers: HeaderIndex,
}

impl ValidatedSheet {
    /// Rows strictly after the header, with their grid index.
    pub fn data_rows(&self) -> impl Iterator<Item = (usize, &[CellValue])> {
        self.grid
            .rows()
            .enumerate()
            .skip(self.header_row + 1)
    }

    /// Cell of `row` under the column labelled `label`, `Empty` when the
    /// column does not exist.
    pub fn cell<'a>(&self, row: &'a [CellValue], label: &str) -> &'a CellValue {
        self.headers
            .position(label)
            .and_then(|col| row.get(col))
            .unwrap_or(&EMPTY)
    }
}

/// First row (top-down) holding the header marker as a cell value.
pub fn find_header_row(grid: &RawGrid) -> IngestResult<usize> {
    grid.rows()
        .position(|row| {
            row.iter()
                .any(|cell| cell.as_text().map(str::trim) == Some(HEADER_MARKER))
        })
        .ok_or_else(|| IngestError::HeaderNotFound {
            sheet: INPUT_SHEET.to_string(),
            marker: HEADER_MARKER.to_string(),
        })
}

/// Validate an already-read `COLUMNA` grid.
pub fn validate_grid(grid: RawGrid) -> IngestResult<ValidatedSheet> {
    let header_row = find_header_row(&grid)?;
    let headers = HeaderIndex::from_row(grid.row(header_row));
    headers.require(&REQUIRED_COLUMNS)?;

    Ok(ValidatedSheet {
        grid,
        header_row,
        headers,
    })
}

/// Locate and validate the `COLUMNA` sheet of a workbook.
pub fn ingest(workbook: &mut Workbook) -> IngestResult<ValidatedSheet> {
    let grid = workbook.read_sheet(INPUT_SHEET)?;
    validate_grid(grid)
}
