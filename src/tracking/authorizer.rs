use uuid::Uuid;

use crate::auth::Identity;
use crate::store::Store;

/// The role a tracking session holds, decided once at connect time and
/// carried immutably for the session's lifetime. Only a biker may write
/// location; admins and the owning client observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
    Biker { courier_id: Uuid },
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Biker { .. } => "biker",
            Role::Client => "client",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    DeliveryNotFound,
    Forbidden,
}

impl DenyReason {
    /// Close codes are part of the wire contract.
    pub fn close_code(&self) -> u16 {
        match self {
            DenyReason::Unauthenticated => 4001,
            DenyReason::Forbidden => 4003,
            DenyReason::DeliveryNotFound => 4004,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::Forbidden => "forbidden",
            DenyReason::DeliveryNotFound => "not_found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Granted(Role),
    Denied(DenyReason),
}

/// Decides whether an identity may open a tracking session on a delivery.
///
/// Rule order: anonymous identities are rejected outright; the delivery must
/// exist; staff get admin access to any delivery; a courier holding the
/// delivery's accepted assignment connects as biker; the delivery's owning
/// client may watch their own delivery; everyone else is forbidden.
///
/// Read-only, safe to call repeatedly.
pub fn authorize(store: &Store, identity: &Identity, delivery_id: Uuid) -> AccessDecision {
    let user = match identity {
        Identity::User(user) => user,
        Identity::Anonymous => return AccessDecision::Denied(DenyReason::Unauthenticated),
    };

    let Some(delivery) = store.get_delivery(delivery_id) else {
        return AccessDecision::Denied(DenyReason::DeliveryNotFound);
    };

    if user.is_staff {
        return AccessDecision::Granted(Role::Admin);
    }

    if let Some(assignment) = store.get_assignment(delivery_id) {
        if assignment.accepted {
            if let Some(courier) = store.get_courier(assignment.courier_id) {
                if courier.user_id == user.id {
                    return AccessDecision::Granted(Role::Biker {
                        courier_id: courier.id,
                    });
                }
            }
        }
    }

    if delivery.client_id == user.id {
        return AccessDecision::Granted(Role::Client);
    }

    AccessDecision::Denied(DenyReason::Forbidden)
}
