use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::sync::mpsc;

use chat_api::config::Config;
use chat_api::gateway::engine::RoomEngine;
use chat_api::gateway::events::ServerEvent;
use chat_api::gateway::registry::ConnectionRegistry;
use chat_api::store::memory::MemoryChatStore;
use chat_api::store::{MembershipOracle, MessageStore, RoomStore};
use chat_api::AppState;

/// Build a test AppState over the in-memory store.
pub fn test_state() -> (AppState, Arc<MemoryChatStore>) {
    let store = Arc::new(MemoryChatStore::new());
    state_with_oracle(store.clone(), store.clone())
}

/// Build a test AppState with a custom membership oracle (the stores stay
/// in-memory).
pub fn state_with_oracle(
    store: Arc<MemoryChatStore>,
    oracle: Arc<dyn MembershipOracle>,
) -> (AppState, Arc<MemoryChatStore>) {
    let rooms: Arc<dyn RoomStore> = store.clone();
    let messages: Arc<dyn MessageStore> = store.clone();

    let registry = Arc::new(ConnectionRegistry::new());
    let engine = Arc::new(RoomEngine::new(messages.clone(), oracle, registry.clone()));

    let config = Config {
        database_url: "postgres://unused-in-tests".to_string(),
        port: 0,
        worker_id: 0,
    };

    let state = AppState {
        rooms,
        messages,
        registry,
        engine,
        config: Arc::new(config),
    };

    (state, store)
}

/// Build the full application router wired to the test state.
pub fn test_app() -> (Router, AppState, Arc<MemoryChatStore>) {
    let (state, store) = test_state();
    let app = chat_api::routes::router().with_state(state.clone());
    (app, state, store)
}

/// Register a fake connection directly against the registry, returning its
/// ID and the receiver its broadcasts land on.
pub fn connect(
    state: &AppState,
) -> (String, mpsc::UnboundedReceiver<Arc<ServerEvent>>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (state.registry.register(tx), rx)
}

/// Start an actual TCP server for WebSocket testing. Returns the bound
/// address; the server runs in the background.
pub async fn start_ws_server() -> (SocketAddr, AppState, Arc<MemoryChatStore>) {
    let (state, store) = test_state();
    let app = chat_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state, store)
}
