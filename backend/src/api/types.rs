//! REST API types for the upload page.
//!
//! Field names are camelCase to match the JavaScript client.

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{CellValue, DateWarning};
use crate::transform::pipeline::ConversionOutcome;

/// Response sent after a successful conversion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub success: bool,
    pub request_id: String,
    pub message: String,
    pub file: OutputFile,
    pub statistics: Statistics,
    /// First rows of the generated sheet, header included
    pub preview: Vec<Vec<CellValue>>,
    pub date_warnings: Vec<DateWarning>,
}

/// The generated workbook
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputFile {
    pub name: String,
    pub path: String,
    pub download_url: String,
}

/// Statistics shown in the summary card
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub invoice_count: usize,
    pub rows_generated: usize,
    /// Seconds, rounded to two decimals
    pub processing_time: f64,
}

impl ConvertResponse {
    pub fn new(request_id: &Uuid, file_name: String, outcome: ConversionOutcome) -> Self {
        let stats = outcome.stats;

        ConvertResponse {
            success: true,
            request_id: request_id.to_string(),
            message: "File processed successfully".to_string(),
            file: OutputFile {
                download_url: download_url(&file_name),
                path: outcome.output_path.display().to_string(),
                name: file_name,
            },
            statistics: Statistics {
                invoice_count: stats.invoice_count,
                rows_generated: stats.rows_generated,
                processing_time: round2(stats.processing_time),
            },
            preview: outcome.preview,
            date_warnings: outcome.date_warnings,
        }
    }
}

pub fn download_url(file_name: &str) -> String {
    format!("/api/download/{}", file_name)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Create an error response
pub fn error_response(request_id: &Uuid, error: &str) -> Value {
    json!({
        "success": false,
        "requestId": request_id.to_string(),
        "error": error,
    })
}
