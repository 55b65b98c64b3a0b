use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chat_api::config::Config;
use chat_api::gateway::engine::RoomEngine;
use chat_api::gateway::registry::ConnectionRegistry;
use chat_api::store::pg::PgChatStore;
use chat_api::store::{MembershipOracle, MessageStore, RoomStore};
use chat_api::AppState;
use cohort_common::SnowflakeGenerator;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing — env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // Connect to PostgreSQL.
    let db = chat_api::db::pool::connect(&config.database_url).await;

    let snowflake = Arc::new(SnowflakeGenerator::new(config.worker_id));
    let store = Arc::new(PgChatStore::new(db, snowflake));

    let rooms: Arc<dyn RoomStore> = store.clone();
    let messages: Arc<dyn MessageStore> = store.clone();
    let membership: Arc<dyn MembershipOracle> = store;

    let registry = Arc::new(ConnectionRegistry::new());
    let engine = Arc::new(RoomEngine::new(
        messages.clone(),
        membership,
        registry.clone(),
    ));

    tracing::info!(worker_id = config.worker_id, "chat-api configured");

    let state = AppState {
        rooms,
        messages,
        registry,
        engine,
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(chat_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "chat-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}
