//! Returns the composable `Router` for the prediction service.

use axum::extract::DefaultBodyLimit;
use axum::http::header::CACHE_CONTROL;
use axum::http::{HeaderValue, Uri};
use axum::routing::get;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::upload;
use crate::pipeline::Pipeline;

/// Shared handler state. Cloned per request; the pipeline's collaborators are `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub max_upload_bytes: usize,
}

/// Build the service router.
///
/// Layers are applied innermost first: body limit → no-store header → request tracing.
pub fn app_router(pipeline: Pipeline, max_upload_bytes: usize) -> Router {
    let state = AppState {
        pipeline,
        max_upload_bytes,
    };

    Router::new()
        .route("/", get(upload::page).post(upload::upload))
        .route("/health", get(|| async { "ok" }))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
