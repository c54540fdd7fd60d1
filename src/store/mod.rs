use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::courier::{Courier, CourierStatus};
use crate::models::delivery::{Delivery, DeliveryLog, DeliveryStatus};
use crate::models::location::LocationSample;
use crate::models::user::User;

/// Durable record of users, couriers, deliveries, assignments, location
/// samples, and logs. Assignments are keyed by delivery id (one active
/// assignment per delivery); location samples and logs are append-only.
pub struct Store {
    users: DashMap<Uuid, User>,
    couriers: DashMap<Uuid, Courier>,
    deliveries: DashMap<Uuid, Delivery>,
    assignments: DashMap<Uuid, Assignment>,
    locations: DashMap<Uuid, Vec<LocationSample>>,
    logs: DashMap<Uuid, Vec<DeliveryLog>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            couriers: DashMap::new(),
            deliveries: DashMap::new(),
            assignments: DashMap::new(),
            locations: DashMap::new(),
            logs: DashMap::new(),
        }
    }

    // ----- users -----

    pub fn create_user(&self, email: &str, is_staff: bool) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            is_staff,
            created_at: Utc::now(),
        };
        self.users.insert(user.id, user.clone());
        user
    }

    pub fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.get(&id).map(|entry| entry.value().clone())
    }

    // ----- couriers -----

    pub fn create_courier(
        &self,
        user_id: Uuid,
        phone_number: Option<String>,
    ) -> Result<Courier, AppError> {
        if self.get_user(user_id).is_none() {
            return Err(AppError::NotFound(format!("user {user_id} not found")));
        }

        if self.courier_for_user(user_id).is_some() {
            return Err(AppError::Conflict(format!(
                "user {user_id} already has a courier profile"
            )));
        }

        let courier = Courier {
            id: Uuid::new_v4(),
            user_id,
            phone_number,
            status: CourierStatus::Available,
        };
        self.couriers.insert(courier.id, courier.clone());
        Ok(courier)
    }

    pub fn get_courier(&self, id: Uuid) -> Option<Courier> {
        self.couriers.get(&id).map(|entry| entry.value().clone())
    }

    pub fn courier_for_user(&self, user_id: Uuid) -> Option<Courier> {
        self.couriers
            .iter()
            .find(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
    }

    pub fn list_couriers(&self) -> Vec<Courier> {
        self.couriers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn set_courier_status(
        &self,
        courier_id: Uuid,
        status: CourierStatus,
    ) -> Result<(), AppError> {
        let mut courier = self
            .couriers
            .get_mut(&courier_id)
            .ok_or_else(|| AppError::NotFound(format!("courier {courier_id} not found")))?;
        courier.status = status;
        Ok(())
    }

    // ----- deliveries -----

    pub fn create_delivery(
        &self,
        client_id: Uuid,
        pickup_address: String,
        dropoff_address: String,
        package_description: String,
    ) -> Delivery {
        let delivery = Delivery {
            id: Uuid::new_v4(),
            client_id,
            pickup_address,
            dropoff_address,
            package_description,
            status: DeliveryStatus::Pending,
            created_at: Utc::now(),
        };
        self.deliveries.insert(delivery.id, delivery.clone());
        delivery
    }

    pub fn get_delivery(&self, id: Uuid) -> Option<Delivery> {
        self.deliveries.get(&id).map(|entry| entry.value().clone())
    }

    pub fn list_deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    // ----- assignments -----

    /// Upserts the delivery's assignment and moves the delivery to ASSIGNED.
    /// Reassigning always resets `accepted`; the new courier has to accept
    /// again before it may report location.
    pub fn assign_courier(
        &self,
        delivery_id: Uuid,
        courier_id: Uuid,
    ) -> Result<Assignment, AppError> {
        if self.get_courier(courier_id).is_none() {
            return Err(AppError::NotFound(format!(
                "courier {courier_id} not found"
            )));
        }

        let mut delivery = self
            .deliveries
            .get_mut(&delivery_id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;

        let assignment = Assignment {
            delivery_id,
            courier_id,
            accepted: false,
            assigned_at: Utc::now(),
        };
        self.assignments.insert(delivery_id, assignment.clone());
        delivery.status = DeliveryStatus::Assigned;

        Ok(assignment)
    }

    pub fn get_assignment(&self, delivery_id: Uuid) -> Option<Assignment> {
        self.assignments
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
    }

    /// Marks the delivery's assignment accepted. Only the assigned courier's
    /// own user may accept.
    pub fn accept_assignment(
        &self,
        delivery_id: Uuid,
        user_id: Uuid,
    ) -> Result<Assignment, AppError> {
        let mut assignment = self
            .assignments
            .get_mut(&delivery_id)
            .ok_or_else(|| AppError::NotFound(format!("no assignment for {delivery_id}")))?;

        let courier = self
            .get_courier(assignment.courier_id)
            .ok_or_else(|| AppError::Internal("assignment references missing courier".into()))?;
        if courier.user_id != user_id {
            return Err(AppError::Forbidden(
                "assignment belongs to a different courier".into(),
            ));
        }

        assignment.accepted = true;
        Ok(assignment.clone())
    }

    // ----- location samples -----

    pub fn create_location(
        &self,
        delivery_id: Uuid,
        courier_id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> Result<LocationSample, AppError> {
        if self.get_delivery(delivery_id).is_none() {
            return Err(AppError::NotFound(format!(
                "delivery {delivery_id} not found"
            )));
        }

        let sample = LocationSample {
            delivery_id,
            courier_id,
            latitude: round_coordinate(latitude),
            longitude: round_coordinate(longitude),
            recorded_at: Utc::now(),
        };
        self.locations
            .entry(delivery_id)
            .or_default()
            .push(sample.clone());
        Ok(sample)
    }

    /// Samples for a delivery, newest first.
    pub fn locations_for(&self, delivery_id: Uuid) -> Vec<LocationSample> {
        self.locations
            .get(&delivery_id)
            .map(|entry| entry.value().iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    // ----- lifecycle -----

    /// Conditional ASSIGNED -> IN_TRANSIT transition, fired by the first
    /// location update. The status check-and-set happens under the delivery's
    /// map entry lock, so concurrent updates cannot double-apply it. Returns
    /// whether this call performed the transition.
    pub fn begin_transit(&self, delivery_id: Uuid, courier_id: Uuid) -> Result<bool, AppError> {
        let mut delivery = self
            .deliveries
            .get_mut(&delivery_id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;

        if delivery.status != DeliveryStatus::Assigned {
            return Ok(false);
        }
        delivery.status = DeliveryStatus::InTransit;
        drop(delivery);

        self.set_courier_status(courier_id, CourierStatus::OnDelivery)?;
        self.append_log(delivery_id, "Delivery started (IN_TRANSIT)");
        Ok(true)
    }

    /// Marks the delivery DELIVERED. Only the assigned courier's user may
    /// complete; the courier returns to AVAILABLE.
    pub fn complete_delivery(&self, delivery_id: Uuid, user_id: Uuid) -> Result<Delivery, AppError> {
        let assignment = self
            .get_assignment(delivery_id)
            .ok_or_else(|| AppError::BadRequest(format!("no assignment for {delivery_id}")))?;

        let courier = self
            .get_courier(assignment.courier_id)
            .ok_or_else(|| AppError::Internal("assignment references missing courier".into()))?;
        if courier.user_id != user_id {
            return Err(AppError::Forbidden(
                "assignment belongs to a different courier".into(),
            ));
        }

        let updated = {
            let mut delivery = self
                .deliveries
                .get_mut(&delivery_id)
                .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;
            delivery.status = DeliveryStatus::Delivered;
            delivery.clone()
        };

        self.set_courier_status(courier.id, CourierStatus::Available)?;
        self.append_log(delivery_id, "Delivery completed");
        Ok(updated)
    }

    // ----- logs -----

    pub fn append_log(&self, delivery_id: Uuid, message: &str) {
        self.logs.entry(delivery_id).or_default().push(DeliveryLog {
            delivery_id,
            message: message.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn logs_for(&self, delivery_id: Uuid) -> Vec<DeliveryLog> {
        self.logs
            .get(&delivery_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    // ----- health -----

    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.couriers.len(),
            self.deliveries.len(),
            self.assignments.len(),
        )
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

fn round_coordinate(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
