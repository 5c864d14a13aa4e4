// End-to-end coverage of the room lifecycle: admission, relay, redaction,
// teardown and natural expiry, through both the service layer and the HTTP
// surface.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::{delete, get, post},
    Router,
};
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::advance;
use tower::ServiceExt; // for `oneshot`

use vanish::event::{EventKind, HistoryConfig, RoomEvent};
use vanish::room::types::{JoinRoomResponse, RoomCreateResponse, RoomTtlResponse};
use vanish::store::InMemoryKvStore;
use vanish::{
    message, room, AccessGate, AppError, AppState, DestroySequencer, EventBus, KeyValueStore,
    MessageStore, RoomConfig, RoomRegistry, TtlSynchronizer, AUTH_COOKIE,
};

fn fresh_state() -> AppState {
    let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
    let event_bus = EventBus::new(Arc::clone(&store), HistoryConfig::default());
    AppState::new(store, event_bus, RoomConfig::default())
}

fn registry(state: &AppState) -> RoomRegistry {
    RoomRegistry::new(Arc::clone(&state.store), state.config.clone())
}

fn gate(state: &AppState) -> AccessGate {
    AccessGate::new(Arc::clone(&state.store), state.config.clone())
}

fn message_store(state: &AppState) -> MessageStore {
    MessageStore::new(
        Arc::clone(&state.store),
        state.event_bus.clone(),
        TtlSynchronizer::new(Arc::clone(&state.store), state.config.clone()),
    )
}

fn sequencer(state: &AppState) -> DestroySequencer {
    DestroySequencer::new(
        Arc::clone(&state.store),
        state.event_bus.clone(),
        state.config.clone(),
    )
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/room/create", post(room::handlers::create_room))
        .route("/room/join", post(room::handlers::join_room))
        .route("/room/ttl", get(room::handlers::room_ttl))
        .route("/room", delete(room::handlers::destroy_room))
        .route(
            "/messages",
            post(message::handlers::post_message).get(message::handlers::list_messages),
        )
        .with_state(state)
}

#[tokio::test]
async fn test_end_to_end_room_scenario() {
    let state = fresh_state();

    // Create a room and fill both slots.
    let room_id = registry(&state).create().await.unwrap();

    let token_a = gate(&state).admit(&room_id, None).await.unwrap();
    assert_eq!(
        registry(&state).membership(&room_id).await.unwrap(),
        vec![token_a.clone()]
    );

    let token_b = gate(&state).admit(&room_id, None).await.unwrap();
    assert_eq!(
        registry(&state).membership(&room_id).await.unwrap(),
        vec![token_a.clone(), token_b.clone()]
    );

    assert!(matches!(
        gate(&state).admit(&room_id, None).await,
        Err(AppError::RoomFull)
    ));

    // Alice writes; each participant sees their own view of authorship.
    message_store(&state)
        .append(&room_id, "alice", "hi", &token_a)
        .await
        .unwrap();

    let seen_by_b = message_store(&state).list(&room_id, &token_b).await.unwrap();
    assert_eq!(seen_by_b.len(), 1);
    assert_eq!(seen_by_b[0].text, "hi");
    assert!(seen_by_b[0].token.is_none());

    let seen_by_a = message_store(&state).list(&room_id, &token_a).await.unwrap();
    assert_eq!(seen_by_a[0].token.as_deref(), Some(token_a.as_str()));
}

#[rstest]
#[case(10)]
#[case(25)]
#[tokio::test]
async fn test_concurrent_admissions_respect_capacity(#[case] contenders: usize) {
    let state = fresh_state();
    let room_id = registry(&state).create().await.unwrap();

    let handles = (0..contenders)
        .map(|_| {
            let state = state.clone();
            let room_id = room_id.clone();
            tokio::spawn(async move { gate(&state).admit(&room_id, None).await })
        })
        .collect::<Vec<_>>();

    let mut admitted = 0;
    let mut rejected = 0;
    for result in futures::future::join_all(handles).await {
        match result.unwrap() {
            Ok(_) => admitted += 1,
            Err(AppError::RoomFull) => rejected += 1,
            Err(other) => panic!("unexpected admission error: {other:?}"),
        }
    }

    assert_eq!(admitted, 2);
    assert_eq!(rejected, contenders - 2);
    assert_eq!(registry(&state).membership(&room_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_destroy_is_idempotent_and_publishes_once() {
    let state = fresh_state();
    let room_id = registry(&state).create().await.unwrap();
    let token = gate(&state).admit(&room_id, None).await.unwrap();

    let mut subscription = state
        .event_bus
        .subscribe(&room_id, &[EventKind::Destroy])
        .await
        .unwrap();

    sequencer(&state).destroy(&room_id, &token).await.unwrap();
    sequencer(&state).destroy(&room_id, &token).await.unwrap();

    let mut destroy_events = 0;
    while let Some(event) = subscription.next().await {
        if matches!(event, RoomEvent::Destroy(_)) {
            destroy_events += 1;
        }
    }
    assert_eq!(destroy_events, 1);

    assert!(!registry(&state).exists(&room_id).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_room_vanishes_after_its_lifetime() {
    let state = fresh_state();
    let room_id = registry(&state).create().await.unwrap();
    let token = gate(&state).admit(&room_id, None).await.unwrap();
    message_store(&state)
        .append(&room_id, "alice", "hi", &token)
        .await
        .unwrap();

    advance(Duration::from_secs(600)).await;

    assert!(!registry(&state).exists(&room_id).await.unwrap());
    assert!(matches!(
        message_store(&state).append(&room_id, "alice", "late", &token).await,
        Err(AppError::RoomNotFound)
    ));
    assert!(matches!(
        message_store(&state).list(&room_id, &token).await,
        Err(AppError::RoomNotFound)
    ));
    assert!(matches!(
        gate(&state).admit(&room_id, None).await,
        Err(AppError::RoomNotFound)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_activity_never_outlives_the_ceiling() {
    let state = fresh_state();
    let room_id = registry(&state).create().await.unwrap();
    let token = gate(&state).admit(&room_id, None).await.unwrap();

    // Keep the room busy right up to the ceiling; none of this buys it
    // extra time.
    for i in 0..9 {
        advance(Duration::from_secs(60)).await;
        message_store(&state)
            .append(&room_id, "alice", &format!("message {i}"), &token)
            .await
            .unwrap();
        let remaining = registry(&state).remaining_lifetime(&room_id).await.unwrap();
        assert!(remaining <= Duration::from_secs(600));
    }

    advance(Duration::from_secs(61)).await;
    assert!(!registry(&state).exists(&room_id).await.unwrap());
}

#[tokio::test]
async fn test_http_surface_full_flow() {
    let state = fresh_state();
    let app = app(state);

    // Create.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/room/create")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let created: RoomCreateResponse = serde_json::from_slice(&body).unwrap();
    let room_id = created.room_id;

    // Two participants join; the third is turned away.
    let mut tokens = Vec::new();
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/room/join?roomId={room_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::SET_COOKIE));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let joined: JoinRoomResponse = serde_json::from_slice(&body).unwrap();
        tokens.push(joined.token);
    }

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/room/join?roomId={room_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The countdown is live.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/room/ttl?roomId={room_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let ttl: RoomTtlResponse = serde_json::from_slice(&body).unwrap();
    assert!(ttl.ttl <= 600);

    // First participant posts; the second lists a redacted view.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/messages?roomId={room_id}"))
                .header("content-type", "application/json")
                .header("cookie", format!("{AUTH_COOKIE}={}", tokens[0]))
                .body(Body::from(r#"{"sender": "alice", "text": "hi"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/messages?roomId={room_id}"))
                .header("cookie", format!("{AUTH_COOKIE}={}", tokens[1]))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let listed: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["sender"], "alice");
    assert!(listed[0].get("token").is_none());

    // A member pulls the plug; afterwards every room operation 404s or
    // rejects the stale credential.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/room?roomId={room_id}"))
                .header("cookie", format!("{AUTH_COOKIE}={}", tokens[1]))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/room/ttl?roomId={room_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/messages?roomId={room_id}"))
                .header("cookie", format!("{AUTH_COOKIE}={}", tokens[0]))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_subscriber_sees_live_messages_and_destroy() {
    let state = fresh_state();
    let room_id = registry(&state).create().await.unwrap();
    let token_a = gate(&state).admit(&room_id, None).await.unwrap();
    let token_b = gate(&state).admit(&room_id, None).await.unwrap();

    let mut subscription = state
        .event_bus
        .subscribe(&room_id, &[EventKind::Message, EventKind::Destroy])
        .await
        .unwrap();

    message_store(&state)
        .append(&room_id, "alice", "hi", &token_a)
        .await
        .unwrap();
    sequencer(&state).destroy(&room_id, &token_b).await.unwrap();

    match subscription.next().await {
        Some(RoomEvent::Message(m)) => {
            assert_eq!(m.text, "hi");
            assert!(m.token.is_none());
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(
        subscription.next().await,
        Some(RoomEvent::Destroy(_))
    ));
    assert!(subscription.next().await.is_none());
}

#[tokio::test]
async fn test_late_subscriber_replays_missed_messages() {
    let state = fresh_state();
    let room_id = registry(&state).create().await.unwrap();
    let token = gate(&state).admit(&room_id, None).await.unwrap();

    message_store(&state)
        .append(&room_id, "alice", "first", &token)
        .await
        .unwrap();
    message_store(&state)
        .append(&room_id, "alice", "second", &token)
        .await
        .unwrap();

    let mut subscription = state
        .event_bus
        .subscribe(&room_id, &[EventKind::Message])
        .await
        .unwrap();

    let mut texts = Vec::new();
    for _ in 0..2 {
        match subscription.next().await {
            Some(RoomEvent::Message(m)) => texts.push(m.text),
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(texts, vec!["first", "second"]);
}
