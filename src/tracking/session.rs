use std::borrow::Cow;
use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::tracking::authorizer::{authorize, AccessDecision, Role};
use crate::tracking::events::{ClientMessage, TrackingEvent};

#[derive(Deserialize)]
pub struct TokenQuery {
    token: Option<String>,
}

/// `GET /ws/tracking/:delivery_id?token=<credential>`. Authentication and
/// authorization run before the upgrade completes; denied connections are
/// accepted only to deliver the close code, and never join a room.
pub async fn tracking_handler(
    ws: WebSocketUpgrade,
    Path(delivery_id): Path<Uuid>,
    Query(query): Query<TokenQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let identity = state
        .authenticator
        .resolve(query.token.as_deref(), &state.store);
    let decision = authorize(&state.store, &identity, delivery_id);

    ws.on_upgrade(move |socket| handle_socket(socket, state, delivery_id, decision))
}

async fn handle_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    delivery_id: Uuid,
    decision: AccessDecision,
) {
    let role = match decision {
        AccessDecision::Denied(reason) => {
            state
                .metrics
                .rejected_connections_total
                .with_label_values(&[reason.as_str()])
                .inc();
            warn!(
                delivery_id = %delivery_id,
                reason = reason.as_str(),
                "tracking connection rejected"
            );
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: reason.close_code(),
                    reason: Cow::from(reason.as_str()),
                })))
                .await;
            return;
        }
        AccessDecision::Granted(role) => role,
    };

    let room_rx = state.rooms.join(delivery_id);
    state
        .metrics
        .tracking_connections_total
        .with_label_values(&[role.as_str()])
        .inc();
    state.metrics.active_connections.inc();
    info!(
        delivery_id = %delivery_id,
        role = role.as_str(),
        "tracking connection established"
    );

    let (mut socket_tx, mut socket_rx) = socket.split();

    let ack = TrackingEvent::ConnectionEstablished {
        delivery_id,
        role: role.as_str().to_string(),
    };
    if send_event(&mut socket_tx, &ack).await.is_err() {
        drop(room_rx);
        state.rooms.leave(delivery_id);
        state.metrics.active_connections.dec();
        return;
    }

    // Room -> socket. A lagged receiver skips missed events rather than
    // terminating the session.
    let mut forward = tokio::spawn(async move {
        let mut events = BroadcastStream::new(room_rx);
        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "room receiver lagged; events skipped");
                    continue;
                }
            };
            if send_event(&mut socket_tx, &event).await.is_err() {
                break;
            }
        }
    });

    // Socket -> store/room, strictly in arrival order.
    let inbound_state = state.clone();
    let inbound_role = role.clone();
    let mut inbound = tokio::spawn(async move {
        while let Some(Ok(message)) = socket_rx.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            if let Err(err) =
                process_inbound(&inbound_state, delivery_id, &inbound_role, &text)
            {
                error!(
                    delivery_id = %delivery_id,
                    error = %err,
                    "location update failed; closing session"
                );
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut forward => {
            inbound.abort();
            let _ = inbound.await;
        }
        _ = &mut inbound => {
            forward.abort();
            let _ = forward.await;
        }
    }

    // Both tasks are gone, so the room receiver is dropped and leave can
    // prune an empty room. Membership is released exactly once.
    state.rooms.leave(delivery_id);
    state.metrics.active_connections.dec();
    info!(delivery_id = %delivery_id, role = role.as_str(), "tracking connection closed");
}

/// Handles one inbound frame. Only biker sessions may write location; any
/// frame that does not parse as a valid location update is dropped silently.
/// A store failure is session-fatal, so the error propagates and the caller
/// closes the connection; the write is never retried.
pub fn process_inbound(
    state: &AppState,
    delivery_id: Uuid,
    role: &Role,
    text: &str,
) -> Result<(), AppError> {
    let Role::Biker { courier_id } = role else {
        return Ok(());
    };

    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(_) => {
            state
                .metrics
                .location_updates_total
                .with_label_values(&["dropped"])
                .inc();
            return Ok(());
        }
    };
    let ClientMessage::LocationUpdate {
        latitude,
        longitude,
    } = message;

    let sample = state
        .store
        .create_location(delivery_id, *courier_id, latitude, longitude)?;

    if state.store.begin_transit(delivery_id, *courier_id)? {
        info!(
            delivery_id = %delivery_id,
            courier_id = %courier_id,
            "delivery started (IN_TRANSIT)"
        );
    }

    state
        .metrics
        .location_updates_total
        .with_label_values(&["persisted"])
        .inc();

    state.rooms.broadcast(
        delivery_id,
        TrackingEvent::LocationUpdate {
            delivery_id,
            courier_id: *courier_id,
            latitude: sample.latitude,
            longitude: sample.longitude,
        },
    );

    Ok(())
}

async fn send_event(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    event: &TrackingEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(axum::Error::new)?;
    socket_tx.send(Message::Text(json)).await
}
