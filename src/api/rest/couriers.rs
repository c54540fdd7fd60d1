use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::api::rest::bearer_identity;
use crate::error::AppError;
use crate::models::courier::Courier;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/couriers", post(register_courier).get(list_couriers))
}

#[derive(Deserialize)]
pub struct RegisterCourierRequest {
    pub phone_number: Option<String>,
}

/// Registers the calling user as a courier. One courier profile per user.
async fn register_courier(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<RegisterCourierRequest>,
) -> Result<Json<Courier>, AppError> {
    let user = bearer_identity(&state, &headers)?;
    let courier = state.store.create_courier(user.id, payload.phone_number)?;

    tracing::info!(courier_id = %courier.id, user_id = %user.id, "courier registered");
    Ok(Json(courier))
}

async fn list_couriers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Courier>>, AppError> {
    let user = bearer_identity(&state, &headers)?;
    if !user.is_staff {
        return Err(AppError::Forbidden("staff only".to_string()));
    }

    Ok(Json(state.store.list_couriers()))
}
