use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery lifecycle. Transitions are monotonic: ASSIGNED -> IN_TRANSIT is
/// triggered by the first courier location update, DELIVERED by explicit
/// completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    PickedUp,
    InTransit,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub id: Uuid,
    pub client_id: Uuid,
    pub pickup_address: String,
    pub dropoff_address: String,
    pub package_description: String,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit trail entry for delivery lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLog {
    pub delivery_id: Uuid,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
