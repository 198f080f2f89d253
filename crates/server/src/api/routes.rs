use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use super::{convert, handlers, middleware::metrics_middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let max_body_bytes = state.config().server.max_body_bytes;

    // API routes
    let api_routes = Router::new()
        // Health, config and introspection
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/profiles", get(handlers::list_profiles))
        .route("/status", get(handlers::get_status))
        // Profile conversions
        .route("/convert/{profile}", post(convert::convert))
        // Ad-hoc operations
        .route("/ops/crop", post(convert::crop))
        .route("/ops/scale", post(convert::scale))
        .route("/ops/trim", post(convert::trim))
        .route("/ops/container/{name}", post(convert::container))
        .route("/ops/frame", post(convert::frame))
        .route("/ops/frames", post(convert::frames))
        .route("/ops/waveform", post(convert::waveform))
        .route("/ops/reverse", post(convert::reverse))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
