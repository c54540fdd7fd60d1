use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourierStatus {
    Available,
    OnDelivery,
}

/// Delivery personnel profile, distinct from the user identity it links to.
/// Exactly one courier exists per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    pub user_id: Uuid,
    pub phone_number: Option<String>,
    pub status: CourierStatus,
}
