use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub mod handlers;

/// Build the approvals API router. Caller identity is extracted per-handler
/// (every route below requires a verified session).
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/approvals", get(handlers::list_approvals))
        .route("/approvals/:id", get(handlers::get_approval_detail))
        .route("/approvals/:id/approve", post(handlers::approve_approval))
        .route("/approvals/:id/reject", post(handlers::reject_approval))
        .route("/approvals/:id/assets/:asset_id", get(handlers::get_asset))
        .layer(TraceLayer::new_for_http())
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
