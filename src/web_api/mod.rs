//! WebAPI - HTTP endpoints and the realtime WebSocket
//!
//! ## Responsibilities
//!
//! - Root/health informational endpoints
//! - Operator demo controls (scenario inject/resolve)
//! - WebSocket subscription to the realtime broadcast

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::models::{HealthResponse, RootInfo};
use crate::state::AppState;

/// Root informational endpoint
pub async fn root_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(RootInfo {
        message: "Polyhouse Monitoring API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        mode: state.mode().to_string(),
    })
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let classifier_ready = state.classifier.ready().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        subscribers: state.hub.connection_count(),
        classifier_ready,
        frame_source: state.frame_source.to_string(),
    })
}
