//! HTTP service over the conversion orchestrator.
//!
//! | Route | Body |
//! |-------|------|
//! | `POST /health` | `{"status":"healthy","service":<name>}` |
//! | `POST /formats` | `{"supported_formats":[...],"default":"markdown"}` |
//! | `POST /convert/{text,html,markdown,odt}` | multipart `file` |
//! | `POST /convert` | multipart `file`, format from `output_format` |
//!
//! `/health` and `/formats` also answer `GET` for load balancers and browsers.

pub mod config;
pub mod handlers;
pub mod types;

use crate::convert::Converter;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::ServiceConfig;
pub use handlers::ApiError;
pub use types::{ConversionResponse, ErrorResponse, FormatsResponse, HealthResponse};

/// Largest accepted request body.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<Converter>,
    pub config: Arc<ServiceConfig>,
    /// Bounds conversions in flight to `config.max_concurrency`.
    pub permits: Arc<Semaphore>,
}

impl AppState {
    #[must_use]
    pub fn new(converter: Converter, config: ServiceConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            converter: Arc::new(converter),
            config: Arc::new(config),
            permits,
        }
    }
}

/// Build the router with all endpoints.
pub fn build_router(state: AppState) -> Router {
    let cors = state.config.cors_enabled.then(|| cors_layer(&state.config));

    let router = Router::new()
        .route("/health", get(handlers::health).post(handlers::health))
        .route("/formats", get(handlers::formats).post(handlers::formats))
        .route("/convert/text", post(handlers::convert_text))
        .route("/convert/html", post(handlers::convert_html))
        .route("/convert/markdown", post(handlers::convert_markdown))
        .route("/convert/odt", post(handlers::convert_odt))
        .route("/convert", post(handlers::convert_any))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http());

    let router = match cors {
        Some(layer) => router.layer(layer),
        None => router,
    };
    router.with_state(state)
}

/// Bind `addr` and serve until the listener fails; pooled workers are
/// stopped on the way out.
pub async fn start_server(addr: &str, state: AppState) -> Result<(), std::io::Error> {
    tracing::info!("Starting {} on {}", state.config.name, addr);

    let converter = Arc::clone(&state.converter);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let served = axum::serve(listener, app).await;
    converter.shutdown().await;
    served
}

fn cors_layer(config: &ServiceConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
