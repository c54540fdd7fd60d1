pub mod couriers;
pub mod deliveries;
pub mod users;

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::auth::Identity;
use crate::error::AppError;
use crate::models::user::User;
use crate::state::AppState;
use crate::tracking::session::tracking_handler;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(users::router())
        .merge(couriers::router())
        .merge(deliveries::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws/tracking/:delivery_id", get(tracking_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolves the caller from the `Authorization: Bearer <token>` header.
/// REST callers must be authenticated; unlike the websocket path there is no
/// anonymous close-code protocol, just a 401.
pub(crate) fn bearer_identity(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match state.authenticator.resolve(token, &state.store) {
        Identity::User(user) => Ok(user),
        Identity::Anonymous => Err(AppError::Unauthorized),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    couriers: usize,
    deliveries: usize,
    assignments: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (couriers, deliveries, assignments) = state.store.counts();
    Json(HealthResponse {
        status: "ok",
        couriers,
        deliveries,
        assignments,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
