//! Error types for the conversion pipeline.
//!
//! - [`IngestError`] - Workbook opening and structural validation
//! - [`EmitError`] - Writing the `IMPORT` workbook
//! - [`ConvertError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP layer errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use axum::http::StatusCode;
use thiserror::Error;

// =============================================================================
// Ingest Errors
// =============================================================================

/// Errors while opening the input workbook or validating its structure.
///
/// Every variant is fatal: no row is processed once one is raised.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The file is not a workbook the reader understands.
    #[error("Cannot open workbook: {0}")]
    Open(String),

    /// The required worksheet is absent.
    #[error("The workbook must contain a \"{sheet}\" worksheet")]
    MissingSheet { sheet: String },

    /// No row holds the header marker.
    #[error("No header row found in worksheet \"{sheet}\" (no cell contains \"{marker}\")")]
    HeaderNotFound { sheet: String, marker: String },

    /// A required column is missing from the header row.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// The worksheet exists but could not be read.
    #[error("Cannot read worksheet \"{sheet}\": {message}")]
    Sheet { sheet: String, message: String },
}

// =============================================================================
// Emit Errors
// =============================================================================

/// Errors while writing the output workbook.
#[derive(Debug, Error)]
pub enum EmitError {
    /// The spreadsheet writer failed.
    #[error("Failed to write workbook: {0}")]
    Write(String),

    /// The finished file could not be moved into place.
    #[error("Failed to persist output file: {0}")]
    Persist(String),

    #[error("Output IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Conversion Errors (top-level)
// =============================================================================

/// Top-level conversion errors.
///
/// This is the error type returned by [`crate::transform::pipeline::convert_file`].
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// True when the uploaded file itself is at fault (wrong structure),
    /// false for processing failures on our side.
    pub fn is_input_error(&self) -> bool {
        matches!(self, ConvertError::Ingest(_))
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Error processing file: {0}")]
    Convert(#[from] ConvertError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Convert(e) if e.is_input_error() => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Convert(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type IngestResult<T> = Result<T, IngestError>;

pub type EmitResult<T> = Result<T, EmitError>;

pub type ConvertResult<T> = Result<T, ConvertError>;
