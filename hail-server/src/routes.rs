//! HTTP and websocket routes.

use crate::error::ServerError;
use crate::state::AppState;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use hail_core::{unix_now, DriverUpdate};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Build the router over the shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/location", post(publish_location))
        .route("/health", get(health))
        .route("/ws", get(user_ws))
        .route("/ws/driver", get(driver_ws))
        .route("/ws/matching", get(matching_ws))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

/// Protocol bridge: validate a driver update and forward it to the city's
/// topic. No state is kept here; the ingestion pipeline picks it up like
/// any other producer traffic.
async fn publish_location(
    State(state): State<Arc<AppState>>,
    Json(mut update): Json<DriverUpdate>,
) -> Result<Response, ServerError> {
    update.validate(unix_now())?;
    state
        .producer
        .publish(&update.city, Some(&update.driver_id), &update)
        .await?;
    info!(driver_id = %update.driver_id, city = %update.city, "location update published");
    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Location update processed",
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct UserWsQuery {
    user_id: Option<String>,
}

/// Match-result stream for one user.
async fn user_ws(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserWsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        state.user_gateway.serve(socket, query.user_id).await;
    })
}

#[derive(Debug, Deserialize)]
struct DriverWsQuery {
    driver_id: Option<String>,
}

/// Offer stream plus status updates for one driver.
async fn driver_ws(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DriverWsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(driver_id) = query.driver_id.filter(|id| !id.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Missing driver_id parameter").into_response();
    };
    ws.on_upgrade(move |socket| async move {
        state.driver_gateway.serve_driver(socket, driver_id).await;
    })
}

/// Inter-service socket from the matching engine.
async fn matching_ws(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| async move {
        state.driver_gateway.serve_matching(socket).await;
    })
}
