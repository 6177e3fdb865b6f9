//! HTTP surface used by the annotation frontend.

pub mod errors;
pub mod handlers;

use crate::app::factory::build_pipeline;
use crate::config::toml_config::{ServerConfig, ServiceConfig};
use crate::core::engine::ExtractionEngine;
use crate::core::pipeline::OcrPipeline;
use crate::utils::error::Result;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ExtractionEngine<OcrPipeline>>,
}

impl AppState {
    pub fn new(engine: ExtractionEngine<OcrPipeline>) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn router(state: AppState, server: &ServerConfig) -> Router {
    Router::new()
        .route("/images/", post(handlers::process_image))
        .route("/images", post(handlers::process_image))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes()))
        .layer(cors_layer(&server.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the pipeline from config and serves until Ctrl-C.
pub async fn serve(config: ServiceConfig) -> Result<()> {
    let pipeline = build_pipeline(&config)?;
    let engine = ExtractionEngine::new_with_monitoring(pipeline, config.monitoring_enabled());
    let app = router(AppState::new(engine), &config.server);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Khmer OCR service listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
