use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::delivery::DeliveryStatus;

/// Events fanned out to every member of a delivery's room, plus the one-off
/// connection acknowledgment. Wire shape is `{"type": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrackingEvent {
    ConnectionEstablished {
        delivery_id: Uuid,
        role: String,
    },
    LocationUpdate {
        delivery_id: Uuid,
        courier_id: Uuid,
        latitude: f64,
        longitude: f64,
    },
    StatusUpdate {
        status: DeliveryStatus,
    },
    Completion {
        delivery_id: Uuid,
    },
}

/// Inbound frames a session understands. Anything that fails to parse here
/// (unknown `type`, missing or non-numeric coordinates) is dropped without
/// a reply.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    LocationUpdate { latitude: f64, longitude: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_update_serializes_to_documented_shape() {
        let delivery_id = Uuid::from_u128(1);
        let courier_id = Uuid::from_u128(2);
        let event = TrackingEvent::LocationUpdate {
            delivery_id,
            courier_id,
            latitude: 40.7128,
            longitude: -74.0060,
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["type"], "location_update");
        assert_eq!(json["latitude"], 40.7128);
        assert_eq!(json["longitude"], -74.0060);
        assert_eq!(json["courier_id"], courier_id.to_string());
    }

    #[test]
    fn status_update_carries_screaming_snake_status() {
        let event = TrackingEvent::StatusUpdate {
            status: DeliveryStatus::InTransit,
        };

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(json["type"], "status_update");
        assert_eq!(json["status"], "IN_TRANSIT");
    }

    #[test]
    fn unknown_inbound_type_fails_to_parse() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type": "chat", "body": "hi"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn non_numeric_coordinates_fail_to_parse() {
        let result: Result<ClientMessage, _> = serde_json::from_str(
            r#"{"type": "location_update", "latitude": "40.7", "longitude": -74.0}"#,
        );
        assert!(result.is_err());

        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type": "location_update", "latitude": 40.7}"#);
        assert!(result.is_err());
    }
}
