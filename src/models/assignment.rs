use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Binds exactly one courier to one delivery. A courier may only report
/// location for a delivery once `accepted` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub delivery_id: Uuid,
    pub courier_id: Uuid,
    pub accepted: bool,
    pub assigned_at: DateTime<Utc>,
}
