use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::bearer_identity;
use crate::auth::Identity;
use crate::error::AppError;
use crate::geo;
use crate::models::assignment::Assignment;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::location::LocationSample;
use crate::models::user::User;
use crate::state::AppState;
use crate::tracking::authorizer::{authorize, AccessDecision, DenyReason};
use crate::tracking::events::TrackingEvent;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deliveries", post(create_delivery).get(list_deliveries))
        .route("/deliveries/mine", get(my_deliveries))
        .route("/deliveries/:id", get(get_delivery))
        .route("/deliveries/:id/assign", post(assign_courier))
        .route("/deliveries/:id/accept", post(accept_assignment))
        .route("/deliveries/:id/complete", post(complete_delivery))
        .route("/deliveries/:id/locations", get(list_locations))
}

#[derive(Deserialize)]
pub struct CreateDeliveryRequest {
    pub pickup_address: String,
    pub dropoff_address: String,
    pub package_description: String,
}

async fn create_delivery(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateDeliveryRequest>,
) -> Result<Json<Delivery>, AppError> {
    let user = bearer_identity(&state, &headers)?;

    if payload.pickup_address.trim().is_empty() || payload.dropoff_address.trim().is_empty() {
        return Err(AppError::BadRequest(
            "pickup and dropoff addresses are required".to_string(),
        ));
    }

    let delivery = state.store.create_delivery(
        user.id,
        payload.pickup_address,
        payload.dropoff_address,
        payload.package_description,
    );

    tracing::info!(delivery_id = %delivery.id, client_id = %user.id, "delivery created");
    Ok(Json(delivery))
}

/// Staff see every delivery, couriers the ones assigned to them, clients
/// their own.
async fn list_deliveries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Delivery>>, AppError> {
    let user = bearer_identity(&state, &headers)?;
    Ok(Json(scoped_deliveries(&state, &user)))
}

#[derive(Serialize)]
pub struct DeliveryStats {
    pub total: usize,
    pub pending: usize,
    pub in_transit: usize,
    pub delivered: usize,
}

#[derive(Serialize)]
pub struct MyDeliveriesResponse {
    pub stats: DeliveryStats,
    pub deliveries: Vec<Delivery>,
}

/// The caller's deliveries (same scoping as the listing) together with a
/// per-status summary.
async fn my_deliveries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MyDeliveriesResponse>, AppError> {
    let user = bearer_identity(&state, &headers)?;
    let deliveries = scoped_deliveries(&state, &user);

    let count = |status: DeliveryStatus| {
        deliveries
            .iter()
            .filter(|delivery| delivery.status == status)
            .count()
    };
    let stats = DeliveryStats {
        total: deliveries.len(),
        pending: count(DeliveryStatus::Pending),
        in_transit: count(DeliveryStatus::InTransit),
        delivered: count(DeliveryStatus::Delivered),
    };

    Ok(Json(MyDeliveriesResponse { stats, deliveries }))
}

fn scoped_deliveries(state: &AppState, user: &User) -> Vec<Delivery> {
    if user.is_staff {
        return state.store.list_deliveries();
    }

    if let Some(courier) = state.store.courier_for_user(user.id) {
        return state
            .store
            .list_deliveries()
            .into_iter()
            .filter(|delivery| {
                state
                    .store
                    .get_assignment(delivery.id)
                    .is_some_and(|assignment| assignment.courier_id == courier.id)
            })
            .collect();
    }

    state
        .store
        .list_deliveries()
        .into_iter()
        .filter(|delivery| delivery.client_id == user.id)
        .collect()
}

async fn get_delivery(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    let user = bearer_identity(&state, &headers)?;
    require_participant(&state, &user, id)?;

    let delivery = state
        .store
        .get_delivery(id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;
    Ok(Json(delivery))
}

#[derive(Deserialize)]
pub struct AssignCourierRequest {
    pub courier_id: Uuid,
}

#[derive(Serialize)]
pub struct AssignCourierResponse {
    pub message: &'static str,
    pub assignment: Assignment,
}

async fn assign_courier(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignCourierRequest>,
) -> Result<Json<AssignCourierResponse>, AppError> {
    let user = bearer_identity(&state, &headers)?;
    if !user.is_staff {
        return Err(AppError::Forbidden("staff only".to_string()));
    }

    let assignment = state.store.assign_courier(id, payload.courier_id)?;
    state.rooms.broadcast(
        id,
        TrackingEvent::StatusUpdate {
            status: DeliveryStatus::Assigned,
        },
    );

    tracing::info!(
        delivery_id = %id,
        courier_id = %payload.courier_id,
        "courier assigned"
    );
    Ok(Json(AssignCourierResponse {
        message: "courier assigned",
        assignment,
    }))
}

async fn accept_assignment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Assignment>, AppError> {
    let user = bearer_identity(&state, &headers)?;
    let assignment = state.store.accept_assignment(id, user.id)?;

    tracing::info!(delivery_id = %id, courier_id = %assignment.courier_id, "assignment accepted");
    Ok(Json(assignment))
}

/// Marks the delivery DELIVERED and notifies the room. This is the external
/// collaborator of the tracking sessions: status and completion events enter
/// the room from here, not from a session.
async fn complete_delivery(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Delivery>, AppError> {
    let user = bearer_identity(&state, &headers)?;
    let delivery = state.store.complete_delivery(id, user.id)?;

    state.rooms.broadcast(
        id,
        TrackingEvent::StatusUpdate {
            status: DeliveryStatus::Delivered,
        },
    );
    state
        .rooms
        .broadcast(id, TrackingEvent::Completion { delivery_id: id });

    tracing::info!(delivery_id = %id, "delivery completed");
    Ok(Json(delivery))
}

#[derive(Serialize)]
pub struct LocationHistoryResponse {
    pub samples: Vec<LocationSample>,
    pub distance_travelled_km: f64,
    pub remaining_km: Option<f64>,
    pub eta_minutes: Option<u64>,
}

/// Location history newest-first, plus distance covered so far. When the
/// dropoff address is a `"lat, lon"` pair, the remaining distance from the
/// latest fix and an ETA at the default courier speed are included.
async fn list_locations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<LocationHistoryResponse>, AppError> {
    let user = bearer_identity(&state, &headers)?;
    require_participant(&state, &user, id)?;

    let delivery = state
        .store
        .get_delivery(id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {id} not found")))?;
    let samples = state.store.locations_for(id);

    let path: Vec<(f64, f64)> = samples
        .iter()
        .rev()
        .map(|sample| (sample.latitude, sample.longitude))
        .collect();
    let distance_travelled_km = geo::path_distance_km(&path);

    let remaining_km = samples.first().and_then(|latest| {
        geo::parse_coordinates(&delivery.dropoff_address).map(|(lat, lon)| {
            geo::haversine_km(latest.latitude, latest.longitude, lat, lon)
        })
    });
    let eta_minutes =
        remaining_km.map(|km| geo::estimate_eta_minutes(km, geo::DEFAULT_AVG_SPEED_KMH));

    Ok(Json(LocationHistoryResponse {
        samples,
        distance_travelled_km,
        remaining_km,
        eta_minutes,
    }))
}

/// Read access mirrors the tracking authorizer: staff, the accepted courier,
/// or the owning client.
fn require_participant(state: &AppState, user: &User, delivery_id: Uuid) -> Result<(), AppError> {
    match authorize(&state.store, &Identity::User(user.clone()), delivery_id) {
        AccessDecision::Granted(_) => Ok(()),
        AccessDecision::Denied(DenyReason::DeliveryNotFound) => Err(AppError::NotFound(format!(
            "delivery {delivery_id} not found"
        ))),
        AccessDecision::Denied(_) => Err(AppError::Forbidden(
            "not a participant of this delivery".to_string(),
        )),
    }
}
