pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::services::{PdfExporter, QrService};

pub use startup::{build_router, Application};

/// Shared application state.
///
/// Everything in here is immutable per request; the exporter launches a
/// fresh browser for each export, so no state is shared across requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub exporter: Arc<PdfExporter>,
    pub qr: QrService,
}
