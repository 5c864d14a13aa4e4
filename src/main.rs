use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vanish::event::HistoryConfig;
use vanish::store::{spawn_sweeper, InMemoryKvStore, KeyValueStore};
use vanish::{message, room, websockets, AppState, EventBus, RoomConfig};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vanish=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting vanish chat server");

    // Shared dependencies, injected through AppState.
    // The in-memory store suits a single instance; swap in a networked
    // KeyValueStore implementation (it must offer the same conditional
    // update) to run more than one.
    let memory = Arc::new(InMemoryKvStore::new());
    spawn_sweeper(Arc::clone(&memory), Duration::from_secs(60));
    let store: Arc<dyn KeyValueStore> = memory;

    let event_bus = EventBus::new(Arc::clone(&store), HistoryConfig::default());
    let app_state = AppState::new(store, event_bus, RoomConfig::default());

    // build our application
    let app = Router::new()
        .route("/room/create", post(room::handlers::create_room))
        .route("/room/join", post(room::handlers::join_room))
        .route("/room/ttl", get(room::handlers::room_ttl))
        .route("/room", delete(room::handlers::destroy_room))
        .route("/room/subscribe", get(websockets::subscribe_room))
        .route(
            "/messages",
            post(message::handlers::post_message).get(message::handlers::list_messages),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    info!("Server running on http://{addr}");
    axum::serve(listener, app).await.unwrap();
}
