pub mod health;
pub mod rooms;

use axum::Router;
use utoipa::OpenApi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .merge(rooms::router())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        rooms::room_by_section,
        rooms::list_room_messages,
        rooms::post_room_message,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            crate::models::room::Room,
            crate::models::message::MessageView,
            health::HealthResponse,
            rooms::PostMessageRequest,
        )
    ),
    tags(
        (name = "Health", description = "Liveness probe"),
        (name = "Rooms", description = "Room lookup and message history fallback"),
    )
)]
pub struct ApiDoc;
