//! Per-request context passed explicitly into conversion handlers.
//!
//! Identity is established upstream (reverse proxy / auth gateway); the
//! server only carries the caller id it was given.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::ConversionStats;
use crate::transform::pipeline::output_file_name;

/// Header set by the gateway with the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub user_id: Option<String>,
    /// Name of the uploaded file as sent by the browser
    pub file_name: String,
    pub file_size: usize,
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(request_id: Uuid, headers: &HeaderMap, file_name: String, file_size: usize) -> Self {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        Self {
            request_id,
            user_id,
            file_name,
            file_size,
            received_at: Utc::now(),
        }
    }

    /// Unique name of the workbook generated for this request.
    pub fn output_file_name(&self) -> String {
        output_file_name(&self.file_name, &self.request_id)
    }

    pub fn user_label(&self) -> &str {
        self.user_id.as_deref().unwrap_or("anonymous")
    }

    /// Audit record for a finished conversion of this upload.
    pub fn processed_record(&self, stats: &ConversionStats) -> ProcessedRecord {
        ProcessedRecord {
            request_id: self.request_id,
            user_id: self.user_id.clone(),
            file_name: self.file_name.clone(),
            file_size: self.file_size,
            invoice_count: stats.invoice_count,
            rows_generated: stats.rows_generated,
            processing_time: stats.processing_time,
            received_at: self.received_at,
        }
    }
}

/// One processed upload: who sent what, and what came out.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRecord {
    pub request_id: Uuid,
    pub user_id: Option<String>,
    pub file_name: String,
    pub file_size: usize,
    pub invoice_count: usize,
    pub rows_generated: usize,
    pub processing_time: f64,
    pub received_at: DateTime<Utc>,
}
