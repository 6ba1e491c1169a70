//! Route definitions and router construction.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::bootstrap::{AxumContext, CorsConfig};
use crate::handlers;
use crate::state::AppState;

/// Largest accepted recording upload.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        // Turns
        .route(
            "/upload",
            post(handlers::turn::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/turns", post(handlers::turn::submit_text))
        .route("/turn", get(handlers::turn::status))
        .route("/cancel-run", post(handlers::cancel::cancel_run))
        // Scripted speech
        .route("/introduction", post(handlers::scripted::introduction))
        .route("/tour", post(handlers::scripted::tour))
        // Synthesized audio
        .route("/audio/{id}", get(handlers::audio::fetch))
}

/// Create the main router with all API routes.
///
/// For serving the browser front end as well, use [`create_spa_router`].
pub fn create_router(ctx: AxumContext, cors_config: &CorsConfig) -> Router {
    let state: AppState = Arc::new(ctx);

    Router::new()
        .route("/health", get(health_check))
        .merge(api_routes().with_state(state))
        .layer(build_cors_layer(cors_config))
        .layer(TraceLayer::new_for_http())
}

/// Create a router with API routes and static asset serving.
///
/// Unmatched paths are served from `static_dir`, falling back to its
/// `index.html`.
pub fn create_spa_router<P: AsRef<Path>>(
    ctx: AxumContext,
    static_dir: P,
    cors_config: &CorsConfig,
) -> Router {
    let static_path = static_dir.as_ref();
    let index_path = static_path.join("index.html");
    let serve_dir = ServeDir::new(static_path).fallback(ServeFile::new(&index_path));

    create_router(ctx, cors_config).fallback_service(serve_dir)
}

/// Health check endpoint.
pub(crate) async fn health_check() -> &'static str {
    "OK"
}
