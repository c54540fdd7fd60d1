use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single courier GPS fix. Append-only; coordinates are stored with six
/// decimal places of precision and the timestamp is server-assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSample {
    pub delivery_id: Uuid,
    pub courier_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: DateTime<Utc>,
}
