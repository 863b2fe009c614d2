//! High-level conversion pipeline: `COLUMNA` workbook to `IMPORT` workbook.
//!
//! Combines the three stages, strictly in order:
//! validating (ingest), transforming (column-to-row) and emitting (writer).
//! A failure in any stage ends the conversion; no output is left behind.
//!
//! # Example
//!
//! ```rust,ignore
//! use conversor::transform::pipeline::{convert_file, ConvertOptions};
//! use std::path::Path;
//!
//! let outcome = convert_file(
//!     Path::new("facturas.xlsx"),
//!     Path::new("facturas_formato_import.xlsx"),
//!     &ConvertOptions::default(),
//! )?;
//! println!("{} invoices, {} rows", outcome.stats.invoice_count, outcome.stats.rows_generated);
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

use super::converter::convert_rows;
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::emit::write_import_workbook;
use crate::error::ConvertResult;
use crate::ingest::{ingest, Workbook};
use crate::models::{CellValue, ConversionStats, DateWarning, ItemType, INPUT_SHEET};

/// Suffix appended to generated file names.
pub const OUTPUT_SUFFIX: &str = "_formato_import";

static UNSAFE_FILE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// Options for a conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Number of grid rows (header included) returned as preview
    pub preview_rows: usize,

    /// Report invoices whose date could not be normalized
    pub strict_dates: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            preview_rows: 10,
            strict_dates: false,
        }
    }
}

/// Pipeline stage, used for progress logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Transforming,
    Emitting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "Validating",
            Stage::Transforming => "Transforming",
            Stage::Emitting => "Emitting",
        };
        f.write_str(name)
    }
}

/// Result of a complete conversion
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOutcome {
    pub stats: ConversionStats,

    /// First rows of the generated grid, header included
    pub preview: Vec<Vec<CellValue>>,

    /// Where the `IMPORT` workbook was written
    pub output_path: PathBuf,

    /// Empty unless `strict_dates` was set
    pub date_warnings: Vec<DateWarning>,

    /// Column labels detected in the header row
    pub columns: Vec<String>,
}

/// Convert a workbook on disk.
pub fn convert_file(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> ConvertResult<ConversionOutcome> {
    let started = Instant::now();
    log_info(format!("📄 Opening {}", input.display()));
    let workbook = Workbook::open(input)?;
    run(workbook, output, options, started)
}

/// Convert an uploaded workbook held in memory.
pub fn convert_bytes(
    bytes: Vec<u8>,
    output: &Path,
    options: &ConvertOptions,
) -> ConvertResult<ConversionOutcome> {
    let started = Instant::now();
    log_info(format!("📄 Opening uploaded workbook ({} bytes)", bytes.len()));
    let workbook = Workbook::from_bytes(bytes)?;
    run(workbook, output, options, started)
}

fn run(
    mut workbook: Workbook,
    output: &Path,
    options: &ConvertOptions,
    started: Instant,
) -> ConvertResult<ConversionOutcome> {
    // Validating
    log_info(format!("🔍 {}: looking for the \"{}\" sheet...", Stage::Validating, INPUT_SHEET));
    let sheet = ingest(&mut workbook)?;
    log_success(format!(
        "Header found on row {} ({} columns)",
        sheet.grid.sheet_row_number(sheet.header_row),
        sheet.headers.len()
    ));

    let present: Vec<&str> = ItemType::ALL
        .iter()
        .map(|t| t.label())
        .filter(|l| sheet.headers.contains(l))
        .collect();
    if present.is_empty() {
        log_warning("No item columns found, the output will only contain the header");
    } else {
        log_info_indent(format!("Item columns: {}", present.join(", ")), 1);
    }

    // Transforming
    log_info(format!("⚙️  {}: expanding item columns into rows...", Stage::Transforming));
    let conversion = convert_rows(&sheet, options.strict_dates);
    log_success(conversion.summary());
    for warning in conversion.date_warnings.iter().take(5) {
        log_warning(format!("Row {}: date \"{}\" kept as is", warning.row, warning.value));
    }

    // Emitting
    log_info(format!("💾 {}: writing {}...", Stage::Emitting, output.display()));
    let grid = conversion.to_grid();
    write_import_workbook(&grid, output)?;

    let stats = ConversionStats {
        invoice_count: conversion.invoice_count,
        rows_generated: conversion.rows_generated(),
        processing_time: started.elapsed().as_secs_f64(),
    };
    log_success(format!("Done in {:.2}s", stats.processing_time));

    Ok(ConversionOutcome {
        stats,
        preview: grid.into_iter().take(options.preview_rows).collect(),
        output_path: output.to_path_buf(),
        date_warnings: conversion.date_warnings,
        columns: sheet.headers.labels().map(str::to_string).collect(),
    })
}

/// Output file name for an uploaded file.
///
/// The request id keeps names unique when several users upload files with
/// the same name at the same time.
pub fn output_file_name(original_name: &str, request_id: &Uuid) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let stem = UNSAFE_FILE_CHARS.replace_all(stem, "_");
    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { "archivo" } else { stem };

    let id = request_id.simple().to_string();
    format!("{}_{}{}.xlsx", stem, &id[..8], OUTPUT_SUFFIX)
}

/// Default output path for the CLI: next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("archivo");
    input.with_file_name(format!("{}{}.xlsx", stem, OUTPUT_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::write_workbook;
    use crate::error::{ConvertError, IngestError};
    use calamine::{open_workbook_auto, Data, Reader};
    use tempfile::tempdir;

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    fn columna_fixture(dir: &Path) -> PathBuf {
        let rows = vec![
            vec![text("RELACION FACTURAS DE COMPRA")],
            vec![],
            vec![
                text("NIT"),
                text("Proveedor"),
                text("CONSECUTIVO"),
                text("Fecha"),
                text("CUFE"),
                text("ITEM 19%"),
                text("ITEM EXCL"),
                text("ITEM IC"),
            ],
            vec![
                text("900123456"),
                text("ACME SAS"),
                text("FE-001"),
                text("15-03-2024"),
                text("abcd1234"),
                CellValue::Number(100000.0),
                CellValue::Number(50000.0),
            ],
            vec![
                CellValue::Empty,
                text("SIN NIT"),
                text("FE-002"),
                text("16-03-2024"),
                text("zzzz"),
                CellValue::Number(999.0),
            ],
            vec![
                text("800111222"),
                text("SIN ITEMS SAS"),
                text("FE-003"),
                text("17-03-2024"),
                text("yyyy"),
            ],
            vec![
                text("811000999"),
                text("BETA LTDA"),
                text("B-77"),
                CellValue::Number(45370.0),
                text("eeee"),
                CellValue::Empty,
                CellValue::Empty,
                CellValue::Number(3200.0),
            ],
        ];
        let path = dir.join("facturas.xlsx");
        write_workbook(INPUT_SHEET, &rows, &path).unwrap();
        path
    }

    #[test]
    fn test_end_to_end_conversion() {
        let dir = tempdir().unwrap();
        let input = columna_fixture(dir.path());
        let output = dir.path().join("facturas_formato_import.xlsx");

        let outcome = convert_file(&input, &output, &ConvertOptions::default()).unwrap();

        assert_eq!(outcome.stats.invoice_count, 2);
        assert_eq!(outcome.stats.rows_generated, 3);
        assert!(outcome.stats.processing_time >= 0.0);
        assert_eq!(outcome.preview.len(), 4);
        assert_eq!(outcome.preview[1][3], text("2024-03-15"));
        assert_eq!(outcome.preview[3][3], text("2024-03-19"));
        assert!(outcome.columns.contains(&"ITEM IC".to_string()));

        let mut book = open_workbook_auto(&output).unwrap();
        assert_eq!(book.sheet_names(), vec!["IMPORT".to_string()]);
        let range = book.worksheet_range("IMPORT").unwrap();
        assert_eq!(range.get_size().0, 4);
        assert_eq!(range.get_value((0, 7)), Some(&Data::String("cufe_cuds_other_system".into())));
        assert_eq!(range.get_value((1, 4)), Some(&Data::String("ITEM 19%".into())));
        assert_eq!(range.get_value((2, 4)), Some(&Data::String("ITEM EXCL".into())));
        assert_eq!(range.get_value((3, 1)), Some(&Data::String("BETA LTDA".into())));
        assert_eq!(range.get_value((3, 5)), Some(&Data::Float(3200.0)));
    }

    #[test]
    fn test_preview_is_truncated() {
        let dir = tempdir().unwrap();
        let input = columna_fixture(dir.path());
        let output = dir.path().join("out.xlsx");
        let options = ConvertOptions {
            preview_rows: 2,
            ..ConvertOptions::default()
        };

        let outcome = convert_file(&input, &output, &options).unwrap();
        assert_eq!(outcome.preview.len(), 2);
        assert_eq!(outcome.preview[0][0], text("journal_id"));
    }

    #[test]
    fn test_bytes_input_matches_file_input() {
        let dir = tempdir().unwrap();
        let input = columna_fixture(dir.path());
        let bytes = std::fs::read(&input).unwrap();

        let from_file = convert_file(&input, &dir.path().join("a.xlsx"), &ConvertOptions::default()).unwrap();
        let from_bytes = convert_bytes(bytes, &dir.path().join("b.xlsx"), &ConvertOptions::default()).unwrap();

        assert_eq!(from_file.preview, from_bytes.preview);
        assert_eq!(from_file.stats.rows_generated, from_bytes.stats.rows_generated);
    }

    #[test]
    fn test_missing_sheet_writes_nothing() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("otra.xlsx");
        write_workbook("Hoja1", &[vec![text("NIT")]], &input).unwrap();
        let output = dir.path().join("never.xlsx");

        let err = convert_file(&input, &output, &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Ingest(IngestError::MissingSheet { .. })));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_header_row() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("sin_encabezado.xlsx");
        write_workbook(INPUT_SHEET, &[vec![text("Proveedor"), text("CUFE")]], &input).unwrap();

        let err = convert_file(&input, &dir.path().join("x.xlsx"), &ConvertOptions::default()).unwrap_err();
        assert!(matches!(err, ConvertError::Ingest(IngestError::HeaderNotFound { .. })));
    }

    #[test]
    fn test_output_file_names_are_unique() {
        let a = output_file_name("Facturas Marzo.xlsx", &Uuid::new_v4());
        let b = output_file_name("Facturas Marzo.xlsx", &Uuid::new_v4());
        assert_ne!(a, b);
        assert!(a.starts_with("Facturas_Marzo_"));
        assert!(a.ends_with("_formato_import.xlsx"));

        let c = output_file_name("../../etc/passwd", &Uuid::nil());
        assert_eq!(c, "passwd_00000000_formato_import.xlsx");
        assert_eq!(output_file_name(".xlsx", &Uuid::nil()), "xlsx_00000000_formato_import.xlsx");
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/data/facturas.xlsx")),
            PathBuf::from("/data/facturas_formato_import.xlsx")
        );
    }
}
