use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::user::User;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/users", post(register_user))
}

#[derive(Deserialize)]
pub struct RegisterUserRequest {
    pub email: String,
    #[serde(default)]
    pub staff: bool,
}

#[derive(Serialize)]
pub struct RegisterUserResponse {
    pub user: User,
    pub token: String,
}

async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterUserRequest>,
) -> Result<Json<RegisterUserResponse>, AppError> {
    if payload.email.trim().is_empty() {
        return Err(AppError::BadRequest("email cannot be empty".to_string()));
    }

    let user = state.store.create_user(payload.email.trim(), payload.staff);
    let token = state.authenticator.issue(user.id, Duration::days(7));

    Ok(Json(RegisterUserResponse { user, token }))
}
