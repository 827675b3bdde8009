//! Page handlers: landing, receipt form, and the content-only print route.

use askama::Template;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::config::BankConfig;
use crate::models::{ReceiptData, ReceiptView};
use crate::AppState;

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {}

#[derive(Template)]
#[template(path = "form.html")]
pub struct FormTemplate {
    pub view: ReceiptView,
    pub bank: BankConfig,
}

#[derive(Template)]
#[template(path = "print.html")]
pub struct PrintTemplate {
    pub view: ReceiptView,
    pub bank: BankConfig,
}

#[derive(Deserialize)]
pub struct PrintQuery {
    pub data: Option<String>,
}

pub async fn index() -> impl IntoResponse {
    IndexTemplate {}
}

/// The receipt form with a live preview of the rendered document.
pub async fn form_page(State(state): State<AppState>) -> impl IntoResponse {
    let data = ReceiptData::default();
    FormTemplate {
        view: receipt_view(&state, &data),
        bank: state.config.bank.clone(),
    }
}

/// Content-only render of the receipt body.
///
/// Accepts the payload as URL-encoded JSON in `data`; the hydration script
/// additionally re-reads browser local storage, which is how the export
/// pipeline seeds it.
pub async fn print_page(
    State(state): State<AppState>,
    Query(query): Query<PrintQuery>,
) -> impl IntoResponse {
    let data = query
        .data
        .as_deref()
        .map(parse_receipt_payload)
        .unwrap_or_default();
    PrintTemplate {
        view: receipt_view(&state, &data),
        bank: state.config.bank.clone(),
    }
}

pub(crate) fn receipt_view(state: &AppState, data: &ReceiptData) -> ReceiptView {
    let qr_url = state.qr.transfer_qr_url(
        data.transfer_amount(),
        data.description.as_deref().unwrap_or(""),
    );
    ReceiptView::from_data(data, qr_url)
}

/// Bad payloads render a blank receipt instead of failing the page.
fn parse_receipt_payload(raw: &str) -> ReceiptData {
    match serde_json::from_str(raw) {
        Ok(data) => data,
        Err(err) => {
            tracing::warn!(error = %err, "failed to parse receipt data, rendering blank receipt");
            ReceiptData::default()
        }
    }
}
