//! # Conversor - purchase invoice spreadsheets to accounting import format
//!
//! Suppliers' invoices arrive as a `COLUMNA` sheet with one row per invoice
//! and one column per item type (`ITEM 19%`, `ITEM EXCL`, ...). The
//! accounting system imports one row per invoice line instead. Conversor
//! turns the former into the latter, writing an `IMPORT` workbook.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  COLUMNA    │────▶│   Ingest    │────▶│  Converter  │────▶│   IMPORT    │
//! │   (.xlsx)   │     │ (validate)  │     │ (col → row) │     │   (.xlsx)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conversor::{convert_file, ConvertOptions};
//! use std::path::Path;
//!
//! let outcome = convert_file(
//!     Path::new("facturas.xlsx"),
//!     Path::new("facturas_formato_import.xlsx"),
//!     &ConvertOptions::default(),
//! ).unwrap();
//! println!("{} invoices converted", outcome.stats.invoice_count);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types
//! - [`config`] - Environment configuration
//! - [`models`] - Cells, item types, output rows
//! - [`ingest`] - Workbook reading and structural validation
//! - [`transform`] - Date normalization, conversion, pipeline
//! - [`emit`] - Output workbook writer
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Stages
pub mod emit;
pub mod ingest;
pub mod transform;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{ConvertError, EmitError, IngestError, ServerError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    CellValue, ConversionStats, DateWarning, InvoiceIdentity, ItemType, OutputRow,
    IMPORT_HEADERS, INPUT_SHEET, OUTPUT_SHEET, REQUIRED_COLUMNS,
};

// =============================================================================
// Re-exports - Stages
// =============================================================================

pub use emit::write_import_workbook;
pub use ingest::{find_header_row, ingest, validate_grid, HeaderIndex, RawGrid, ValidatedSheet, Workbook};
pub use transform::{
    convert_bytes, convert_file, convert_rows, default_output_path, format_date, output_file_name,
    Conversion, ConversionOutcome, ConvertOptions, DateValue,
};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::AppConfig;

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
