//! REST fallback for clients without a live connection.
//!
//! Mirrors room history/post over plain HTTP. A caller on this path gets no
//! real-time fan-out; it is a fallback, not a bridge.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::message::{MessageContent, MessageView};
use crate::models::room::Room;
use crate::store::{MessageStore, RoomStore, MESSAGE_HISTORY_CAP};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms/by-section/{section_id}", get(room_by_section))
        .route(
            "/rooms/{room_id}/messages",
            get(list_room_messages).post(post_room_message),
        )
}

/// Path segments arrive as strings so we can reject non-positive IDs with a
/// 400 instead of axum's default rejection body.
fn parse_id(raw: &str, field: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::bad_request(format!("{field} must be a positive integer")))
}

// ---------------------------------------------------------------------------
// GET /rooms/by-section/{section_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/rooms/by-section/{section_id}",
    tag = "Rooms",
    params(("section_id" = String, Path, description = "Section ID")),
    responses(
        (status = 200, description = "The section's room (created on first access)", body = Room),
        (status = 400, description = "Invalid section ID", body = ApiErrorBody),
        (status = 404, description = "Unknown section", body = ApiErrorBody),
    ),
)]
pub async fn room_by_section(
    State(state): State<AppState>,
    Path(section_id): Path<String>,
) -> Result<Json<Room>, ApiError> {
    let section_id = parse_id(&section_id, "sectionId")?;
    let room = state.rooms.get_or_create(section_id).await?;
    Ok(Json(room))
}

// ---------------------------------------------------------------------------
// GET /rooms/{room_id}/messages
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/rooms/{room_id}/messages",
    tag = "Rooms",
    params(("room_id" = String, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Messages ascending by ID, capped at 100", body = [MessageView]),
        (status = 400, description = "Invalid room ID", body = ApiErrorBody),
    ),
)]
pub async fn list_room_messages(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let room_id = parse_id(&room_id, "roomId")?;
    let messages = state.messages.list(room_id, MESSAGE_HISTORY_CAP).await?;
    Ok(Json(messages))
}

// ---------------------------------------------------------------------------
// POST /rooms/{room_id}/messages
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct PostMessageRequest {
    pub sender_id: Option<i64>,
    pub message: Option<String>,
    pub message_type: Option<String>,
    pub file_url: Option<String>,
}

#[utoipa::path(
    post,
    path = "/rooms/{room_id}/messages",
    tag = "Rooms",
    params(("room_id" = String, Path, description = "Room ID")),
    request_body = PostMessageRequest,
    responses(
        (status = 201, description = "Message persisted and enriched", body = MessageView),
        (status = 400, description = "Missing or invalid fields", body = ApiErrorBody),
        (status = 404, description = "Room not found", body = ApiErrorBody),
    ),
)]
pub async fn post_room_message(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Json(body): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>), ApiError> {
    let room_id = parse_id(&room_id, "roomId")?;

    let mut errors = Vec::new();
    if body.sender_id.filter(|id| *id > 0).is_none() {
        errors.push(FieldError {
            field: "sender_id".to_string(),
            message: "sender_id is required".to_string(),
        });
    }
    let message = body.message.as_deref().map(str::trim).unwrap_or("");
    if message.is_empty() {
        errors.push(FieldError {
            field: "message".to_string(),
            message: "message is required".to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let content =
        MessageContent::from_wire(message.to_string(), body.message_type, body.file_url)
            .map_err(|reason| {
                ApiError::validation(vec![FieldError {
                    field: "message_type".to_string(),
                    message: reason.to_string(),
                }])
            })?;

    state
        .rooms
        .get(room_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Room not found"))?;

    let sender_id = body.sender_id.unwrap();
    let message_id = state.messages.append(room_id, sender_id, &content).await?;
    let view = state.messages.enrich(message_id).await?;

    Ok((StatusCode::CREATED, Json(view)))
}
