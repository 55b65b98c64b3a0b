pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod routes;
pub mod store;

use std::sync::Arc;

use config::Config;
use gateway::engine::RoomEngine;
use gateway::registry::ConnectionRegistry;
use store::{MessageStore, RoomStore};

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<dyn RoomStore>,
    pub messages: Arc<dyn MessageStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub engine: Arc<RoomEngine>,
    pub config: Arc<Config>,
}
