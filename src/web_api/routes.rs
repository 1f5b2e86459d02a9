use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::ApiResponse;
use crate::sensors::Scenario;
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(super::root_info))
        .route("/healthz", get(super::health_check))
        .route("/api/simulate/problem", post(trigger_problem))
        .route("/api/simulate/resolve", post(resolve_problem))
        .route("/ws/realtime", get(ws_handler))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ProblemQuery {
    problem_type: String,
}

/// Inject a fault scenario (simulator mode only)
async fn trigger_problem(
    State(state): State<AppState>,
    Query(query): Query<ProblemQuery>,
) -> Result<Json<ApiResponse<String>>> {
    let simulator = state.simulator.as_ref().ok_or_else(|| {
        Error::Unsupported("Demo controls are only available in simulator mode".to_string())
    })?;

    let scenario: Scenario = query.problem_type.parse().map_err(|_| {
        Error::Validation(format!("Unknown problem type '{}'", query.problem_type))
    })?;

    simulator.inject_scenario(scenario).await;

    Ok(Json(ApiResponse::success(format!(
        "Problem '{}' triggered.",
        scenario
    ))))
}

/// Clear all injected scenarios (simulator mode only)
async fn resolve_problem(State(state): State<AppState>) -> Result<Json<ApiResponse<String>>> {
    let simulator = state.simulator.as_ref().ok_or_else(|| {
        Error::Unsupported("Demo controls are only available in simulator mode".to_string())
    })?;

    simulator.clear_scenario().await;

    Ok(Json(ApiResponse::success("Problems resolved.".to_string())))
}

/// WebSocket upgrade for the realtime feed
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle one WebSocket subscriber
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut rx) = state.hub.register().await;

    tracing::info!(connection_id = %conn_id, "WebSocket client connected");

    // Forward hub broadcasts to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // The channel is broadcast-only; incoming traffic is just lifecycle
    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Ping(data)) => {
                    tracing::trace!("Received ping: {:?}", data);
                }
                Ok(Message::Close(_)) => {
                    tracing::info!(connection_id = %conn_id, "WebSocket client disconnected");
                    break;
                }
                Err(e) => {
                    tracing::warn!(connection_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
        conn_id
    });

    let conn_id = tokio::select! {
        _ = send_task => conn_id,
        result = recv_task => result.unwrap_or(conn_id),
    };

    state.hub.unregister(&conn_id).await;
}
