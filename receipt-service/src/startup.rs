//! Application startup and lifecycle management.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, Method};
use axum::middleware::from_fn;
use axum::{routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::handlers;
use crate::services::{PdfExporter, QrService};
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    // The export endpoints are called cross-origin by embedding frontends.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let api = Router::new()
        .route("/api/pdf", get(handlers::pdf::export_full))
        .route(
            "/api/pdf/content",
            get(handlers::pdf::export_content_get).post(handlers::pdf::export_content_post),
        )
        .layer(cors);

    Router::new()
        .route("/", get(handlers::pages::index))
        .route("/pdf", get(handlers::pages::form_page))
        .route("/pdf/content", get(handlers::pages::print_page))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .merge(api)
        .nest_service(
            "/static",
            ServeDir::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("static")),
        )
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Bind the listener and assemble the router.
    ///
    /// Port 0 binds an ephemeral port; the bound port is written back into
    /// the config so handlers can build self-referencing URLs.
    pub async fn build(mut config: Config) -> Result<Self, AppError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();
        config.server.port = port;

        let state = AppState {
            exporter: Arc::new(PdfExporter::new(config.browser.clone())),
            qr: QrService::new(config.bank.clone()),
            config,
        };
        let router = build_router(state);

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!("Listening on port {}", self.port);
        axum::serve(self.listener, self.router).await
    }
}
