//! HTTP server for the conversion API.
//!
//! # API Endpoints
//!
//! | Method | Path                    | Description                          |
//! |--------|-------------------------|--------------------------------------|
//! | GET    | `/health`               | Health check                         |
//! | POST   | `/api/convert`          | Upload a `.xlsx` file and convert it |
//! | GET    | `/api/download/{file}`  | Download a generated workbook        |
//! | GET    | `/api/logs`             | SSE stream for real-time logs        |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State},
    http::{header, HeaderMap, Method},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::context::RequestContext;
use super::logs::{log_error, log_info, log_processed, LOG_BROADCASTER};
use super::types::{error_response, ConvertResponse};
use crate::config::AppConfig;
use crate::error::ServerError;
use crate::transform::pipeline::{convert_bytes, ConversionOutcome};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

static SAFE_FILE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap());

/// Shared, read-only server state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
}

/// A server error tagged with the request it belongs to
struct ApiError {
    request_id: Uuid,
    error: ServerError,
}

impl ApiError {
    fn new(request_id: Uuid, error: impl Into<ServerError>) -> Self {
        Self {
            request_id,
            error: error.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = error_response(&self.request_id, &self.error.to_string());
        (self.error.status(), Json(body)).into_response()
    }
}

/// Build the router
pub fn router(config: AppConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static(super::context::USER_ID_HEADER),
        ])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    let body_limit = config.max_upload_bytes;
    let state = AppState {
        config: Arc::new(config),
    };

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/convert", post(convert_upload))
        .route("/api/download/{file}", get(download))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(port: u16, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(&config.output_dir).await?;

    println!("🚀 Conversor server running on http://localhost:{}", port);
    println!("   POST /api/convert         - Upload COLUMNA workbook");
    println!("   GET  /api/download/{{file}} - Download IMPORT workbook");
    println!("   GET  /api/logs            - SSE log stream");
    println!("   GET  /health              - Health check");
    println!("   Output directory: {}", config.output_dir.display());
    println!();

    let app = router(config);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "conversor",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "convert": "POST /api/convert",
            "download": "GET /api/download/{file}",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint: recent history first, then live entries
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (recent, rx) = LOG_BROADCASTER.subscribe_with_history();
    let history = tokio_stream::iter(recent);
    let live = BroadcastStream::new(rx).filter_map(|result| result.ok());

    let stream = history.chain(live).filter_map(|entry| {
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Upload and convert endpoint
async fn convert_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let bad_request = |msg: String| ApiError::new(request_id, ServerError::BadRequest(msg));

    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.xlsx").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Read error: {}", e)))?;
        upload = Some((name, bytes.to_vec()));
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| bad_request("No file was uploaded".to_string()))?;

    if !is_xlsx_name(&file_name) {
        return Err(bad_request("The file must be an Excel workbook (.xlsx)".to_string()));
    }

    let ctx = RequestContext::new(request_id, &headers, file_name, bytes.len());

    println!("\n{}", "=".repeat(70));
    println!(
        "📄 NEW UPLOAD: {} ({} bytes) by {} [{}]",
        ctx.file_name,
        ctx.file_size,
        ctx.user_label(),
        ctx.request_id
    );
    println!("{}\n", "=".repeat(70));

    let outcome = run_conversion(&state, &ctx, bytes).await.map_err(|e| {
        log_error(format!("Conversion failed for {}: {}", ctx.file_name, e));
        ApiError::new(request_id, e)
    })?;

    let record = ctx.processed_record(&outcome.stats);
    match serde_json::to_value(&record) {
        Ok(details) => log_processed(
            format!(
                "Processed {} for {}: {} invoices, {} rows",
                record.file_name,
                ctx.user_label(),
                record.invoice_count,
                record.rows_generated
            ),
            details,
        ),
        Err(e) => log_error(format!("Could not record processed upload: {}", e)),
    }

    println!("\n{}", "=".repeat(70));
    println!("📊 SUMMARY");
    println!("{}", "=".repeat(70));
    println!("   Invoices:        {}", outcome.stats.invoice_count);
    println!("   Rows generated:  {}", outcome.stats.rows_generated);
    println!("   Time:            {:.2}s", outcome.stats.processing_time);
    println!("   Output:          {}", outcome.output_path.display());
    println!("{}\n", "=".repeat(70));

    Ok(Json(ConvertResponse::new(
        &ctx.request_id,
        ctx.output_file_name(),
        outcome,
    )))
}

/// Run the blocking conversion off the async runtime
async fn run_conversion(
    state: &AppState,
    ctx: &RequestContext,
    bytes: Vec<u8>,
) -> Result<ConversionOutcome, ServerError> {
    let output = state.config.output_dir.join(ctx.output_file_name());
    let options = state.config.convert_options();

    tokio::task::spawn_blocking(move || convert_bytes(bytes, &output, &options))
        .await
        .map_err(|e| ServerError::Internal(format!("conversion task failed: {}", e)))?
        .map_err(ServerError::from)
}

/// Download a generated workbook
async fn download(
    State(state): State<AppState>,
    UrlPath(file): UrlPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = Uuid::new_v4();

    if !is_safe_download_name(&file) {
        return Err(ApiError::new(
            request_id,
            ServerError::BadRequest(format!("Invalid file name: {}", file)),
        ));
    }

    let path = state.config.output_dir.join(&file);
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            ApiError::new(request_id, ServerError::NotFound(file.clone()))
        }
        _ => ApiError::new(request_id, ServerError::Internal(e.to_string())),
    })?;

    log_info(format!("⬇️  Download {}", file));

    let headers = [
        (header::CONTENT_TYPE, XLSX_MIME.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file),
        ),
    ];
    Ok((headers, bytes))
}

fn is_xlsx_name(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"))
}

fn is_safe_download_name(name: &str) -> bool {
    SAFE_FILE_NAME.is_match(name) && !name.contains("..") && is_xlsx_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xlsx_extension_check() {
        assert!(is_xlsx_name("facturas.xlsx"));
        assert!(is_xlsx_name("FACTURAS.XLSX"));
        assert!(!is_xlsx_name("facturas.xls"));
        assert!(!is_xlsx_name("facturas.csv"));
        assert!(!is_xlsx_name("xlsx"));
    }

    #[test]
    fn test_download_name_validation() {
        assert!(is_safe_download_name("marzo_1a2b3c4d_formato_import.xlsx"));
        assert!(!is_safe_download_name("../secret.xlsx"));
        assert!(!is_safe_download_name("a/b.xlsx"));
        assert!(!is_safe_download_name("..xlsx"));
        assert!(!is_safe_download_name("notes.txt"));
    }
}
