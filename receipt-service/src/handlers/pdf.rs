//! PDF export endpoints.
//!
//! `GET /api/pdf` prints the full form page; `GET|POST /api/pdf/content`
//! prints the content-only route seeded with the caller's payload. Both
//! return raw PDF bytes with a fixed download filename, or a JSON error
//! body on fatal failures.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use service_core::error::AppError;

use crate::models::ReceiptData;
use crate::services::metrics::record_export;
use crate::AppState;

const PDF_FILENAME: &str = "phieu-thu-tien-tat-toan.pdf";

#[derive(Deserialize)]
pub struct PdfQuery {
    /// URL-encoded JSON receipt payload.
    pub data: Option<String>,
}

/// Print the whole form page.
pub async fn export_full(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let base = host_base_url(&headers, state.config.server.port);
    let target = format!("{base}/pdf");

    match state.exporter.export_form_page(&target).await {
        Ok(bytes) => {
            record_export("full", "success");
            Ok(pdf_response(bytes))
        }
        Err(err) => {
            record_export("full", "error");
            tracing::error!(error = %err, "full-page PDF export failed");
            Err(err)
        }
    }
}

/// Print the content-only route, payload in the query string.
pub async fn export_content_get(
    State(state): State<AppState>,
    Query(query): Query<PdfQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    export_content(state, headers, query.data).await
}

/// Print the content-only route, payload as the raw request body.
pub async fn export_content_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, AppError> {
    let payload = (!body.trim().is_empty()).then_some(body);
    export_content(state, headers, payload).await
}

async fn export_content(
    state: AppState,
    headers: HeaderMap,
    payload: Option<String>,
) -> Result<Response, AppError> {
    let base = origin_base_url(&headers, state.config.server.port);
    let target = format!("{base}/pdf/content");
    let payload = payload.map(normalize_payload);

    match state.exporter.export_content(&target, payload).await {
        Ok(bytes) => {
            record_export("content", "success");
            Ok(pdf_response(bytes))
        }
        Err(err) => {
            record_export("content", "error");
            tracing::error!(error = %err, "content PDF export failed");
            Err(err)
        }
    }
}

/// Reconcile the total with the fee breakdown before injection.
///
/// Unparseable input is forwarded unchanged; the render route falls back to
/// a blank receipt rather than aborting the export.
fn normalize_payload(raw: String) -> String {
    match serde_json::from_str::<ReceiptData>(&raw) {
        Ok(data) => serde_json::to_string(&data.with_derived_total()).unwrap_or(raw),
        Err(err) => {
            tracing::warn!(error = %err, "failed to parse receipt data, forwarding raw payload");
            raw
        }
    }
}

fn pdf_response(bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{PDF_FILENAME}\""),
            ),
            (
                header::CACHE_CONTROL,
                "no-cache, no-store, must-revalidate".to_string(),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// Base URL for self-navigation on the full route, from the Host header.
fn host_base_url(headers: &HeaderMap, port: u16) -> String {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(|host| format!("http://{host}"))
        .unwrap_or_else(|| format!("http://127.0.0.1:{port}"))
}

/// Base URL for the content route: the caller's Origin when present, else
/// this server itself.
fn origin_base_url(headers: &HeaderMap, port: u16) -> String {
    headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("http://127.0.0.1:{port}"))
}
