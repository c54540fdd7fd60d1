use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use delivery_tracker::api::rest::router;
use delivery_tracker::models::courier::CourierStatus;
use delivery_tracker::models::delivery::DeliveryStatus;
use delivery_tracker::models::user::User;
use delivery_tracker::state::AppState;
use delivery_tracker::tracking::events::TrackingEvent;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server() -> (SocketAddr, Arc<AppState>) {
    let state = Arc::new(AppState::new("test-secret", 64));
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

struct Fixture {
    addr: SocketAddr,
    state: Arc<AppState>,
    delivery_id: Uuid,
    courier_id: Uuid,
    client: User,
    biker_user: User,
}

/// Server plus a delivery whose assignment is accepted by one courier.
async fn fixture() -> Fixture {
    let (addr, state) = spawn_server().await;

    let client = state.store.create_user("client@example.com", false);
    let biker_user = state.store.create_user("biker@example.com", false);
    let courier = state.store.create_courier(biker_user.id, None).unwrap();
    let delivery = state.store.create_delivery(
        client.id,
        "123 Main St".into(),
        "456 Oak Ave".into(),
        "small parcel".into(),
    );
    state.store.assign_courier(delivery.id, courier.id).unwrap();
    state
        .store
        .accept_assignment(delivery.id, biker_user.id)
        .unwrap();

    Fixture {
        addr,
        state,
        delivery_id: delivery.id,
        courier_id: courier.id,
        client,
        biker_user,
    }
}

fn token_for(state: &AppState, user_id: Uuid) -> String {
    state.authenticator.issue(user_id, ChronoDuration::minutes(5))
}

async fn connect(addr: SocketAddr, delivery_id: Uuid, token: Option<&str>) -> WsClient {
    let url = match token {
        Some(token) => format!("ws://{addr}/ws/tracking/{delivery_id}?token={token}"),
        None => format!("ws://{addr}/ws/tracking/{delivery_id}"),
    };
    let (socket, _response) = connect_async(url).await.unwrap();
    socket
}

async fn next_message(socket: &mut WsClient) -> Message {
    tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("timed out waiting for message")
        .expect("connection ended unexpectedly")
        .expect("websocket error")
}

async fn next_json(socket: &mut WsClient) -> Value {
    match next_message(socket).await {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

async fn expect_close_code(socket: &mut WsClient, expected: u16) {
    match next_message(socket).await {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), expected),
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn anonymous_connection_is_closed_with_4001() {
    let f = fixture().await;

    let mut socket = connect(f.addr, f.delivery_id, None).await;
    expect_close_code(&mut socket, 4001).await;

    assert_eq!(f.state.rooms.member_count(f.delivery_id), 0);
}

#[tokio::test]
async fn unknown_delivery_is_closed_with_4004() {
    let f = fixture().await;
    let token = token_for(&f.state, f.biker_user.id);

    let mut socket = connect(f.addr, Uuid::new_v4(), Some(&token)).await;
    expect_close_code(&mut socket, 4004).await;
}

#[tokio::test]
async fn user_without_assignment_is_closed_with_4003() {
    let f = fixture().await;
    let stranger = f.state.store.create_user("stranger@example.com", false);
    let token = token_for(&f.state, stranger.id);

    let mut socket = connect(f.addr, f.delivery_id, Some(&token)).await;
    expect_close_code(&mut socket, 4003).await;

    assert_eq!(f.state.rooms.member_count(f.delivery_id), 0);
}

#[tokio::test]
async fn courier_without_acceptance_is_closed_with_4003() {
    let f = fixture().await;

    // Reassignment resets acceptance.
    f.state
        .store
        .assign_courier(f.delivery_id, f.courier_id)
        .unwrap();

    let token = token_for(&f.state, f.biker_user.id);
    let mut socket = connect(f.addr, f.delivery_id, Some(&token)).await;
    expect_close_code(&mut socket, 4003).await;
}

#[tokio::test]
async fn location_update_round_trip() {
    let f = fixture().await;

    let client_token = token_for(&f.state, f.client.id);
    let mut client_socket = connect(f.addr, f.delivery_id, Some(&client_token)).await;
    let ack = next_json(&mut client_socket).await;
    assert_eq!(ack["type"], "connection_established");
    assert_eq!(ack["role"], "client");
    assert_eq!(ack["delivery_id"], f.delivery_id.to_string());

    let biker_token = token_for(&f.state, f.biker_user.id);
    let mut biker_socket = connect(f.addr, f.delivery_id, Some(&biker_token)).await;
    let ack = next_json(&mut biker_socket).await;
    assert_eq!(ack["role"], "biker");

    biker_socket
        .send(Message::Text(
            r#"{"type": "location_update", "latitude": 40.7128, "longitude": -74.0060}"#.into(),
        ))
        .await
        .unwrap();

    // Every room member receives the broadcast, sender included.
    for socket in [&mut client_socket, &mut biker_socket] {
        let event = next_json(socket).await;
        assert_eq!(event["type"], "location_update");
        assert_eq!(event["delivery_id"], f.delivery_id.to_string());
        assert_eq!(event["courier_id"], f.courier_id.to_string());
        assert_eq!(event["latitude"], 40.7128);
        assert_eq!(event["longitude"], -74.0060);
    }

    // One persisted sample, one transition, one log entry.
    let samples = f.state.store.locations_for(f.delivery_id);
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].latitude, 40.7128);
    assert_eq!(samples[0].longitude, -74.0060);
    assert_eq!(
        f.state.store.get_delivery(f.delivery_id).unwrap().status,
        DeliveryStatus::InTransit
    );
    assert_eq!(
        f.state.store.get_courier(f.courier_id).unwrap().status,
        CourierStatus::OnDelivery
    );
    assert_eq!(f.state.store.logs_for(f.delivery_id).len(), 1);

    // A second update fans out again but does not re-log the transition.
    biker_socket
        .send(Message::Text(
            r#"{"type": "location_update", "latitude": 40.7200, "longitude": -74.0100}"#.into(),
        ))
        .await
        .unwrap();
    let event = next_json(&mut client_socket).await;
    assert_eq!(event["latitude"], 40.7200);
    assert_eq!(f.state.store.logs_for(f.delivery_id).len(), 1);
}

#[tokio::test]
async fn malformed_frames_keep_the_session_open() {
    let f = fixture().await;

    let token = token_for(&f.state, f.biker_user.id);
    let mut socket = connect(f.addr, f.delivery_id, Some(&token)).await;
    let _ack = next_json(&mut socket).await;

    socket
        .send(Message::Text(
            r#"{"type": "location_update", "latitude": "oops"}"#.into(),
        ))
        .await
        .unwrap();
    socket.send(Message::Text("not json".into())).await.unwrap();

    // A valid update afterwards still works, proving the session survived.
    socket
        .send(Message::Text(
            r#"{"type": "location_update", "latitude": 1.0, "longitude": 2.0}"#.into(),
        ))
        .await
        .unwrap();

    let event = next_json(&mut socket).await;
    assert_eq!(event["type"], "location_update");
    assert_eq!(event["latitude"], 1.0);

    assert_eq!(f.state.store.locations_for(f.delivery_id).len(), 1);
}

#[tokio::test]
async fn status_and_completion_events_are_forwarded_verbatim() {
    let f = fixture().await;

    let token = token_for(&f.state, f.client.id);
    let mut socket = connect(f.addr, f.delivery_id, Some(&token)).await;
    let _ack = next_json(&mut socket).await;

    // The completion action broadcasts into the room from outside any
    // session.
    f.state.rooms.broadcast(
        f.delivery_id,
        TrackingEvent::StatusUpdate {
            status: DeliveryStatus::Delivered,
        },
    );
    f.state.rooms.broadcast(
        f.delivery_id,
        TrackingEvent::Completion {
            delivery_id: f.delivery_id,
        },
    );

    let event = next_json(&mut socket).await;
    assert_eq!(event["type"], "status_update");
    assert_eq!(event["status"], "DELIVERED");

    let event = next_json(&mut socket).await;
    assert_eq!(event["type"], "completion");
    assert_eq!(event["delivery_id"], f.delivery_id.to_string());
}

#[tokio::test]
async fn disconnect_releases_room_membership() {
    let f = fixture().await;

    let token = token_for(&f.state, f.client.id);
    let mut socket = connect(f.addr, f.delivery_id, Some(&token)).await;
    let _ack = next_json(&mut socket).await;
    assert_eq!(f.state.rooms.member_count(f.delivery_id), 1);

    socket.close(None).await.unwrap();

    // The server session notices the close and leaves the room.
    for _ in 0..50 {
        if f.state.rooms.member_count(f.delivery_id) == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("room membership was not released after disconnect");
}
