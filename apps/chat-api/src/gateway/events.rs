//! Wire-format events for the live connection protocol.
//!
//! Both directions use a tagged `{event, data}` JSON envelope. Client
//! payloads carry some redundant identity fields (`user_id`, `sender_id`,
//! `sender_name`); they are accepted for wire compatibility but the engine
//! always trusts the authenticated identity instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::message::MessageView;

/// A message received from a client over the WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    Authenticate {
        user_id: i64,
        display_name: String,
    },
    JoinRoom {
        room_id: i64,
        section_id: i64,
        #[serde(default)]
        user_id: Option<i64>,
    },
    LeaveRoom {
        room_id: i64,
    },
    ChatMessage {
        room_id: i64,
        message: String,
        #[serde(default)]
        sender_id: Option<i64>,
        #[serde(default)]
        sender_name: Option<String>,
        #[serde(default)]
        message_type: Option<String>,
        #[serde(default)]
        file_url: Option<String>,
    },
    DeleteMessage {
        message_id: i64,
        room_id: i64,
        #[serde(default)]
        user_id: Option<i64>,
    },
    TypingStart {
        room_id: i64,
        #[serde(default)]
        user_id: Option<i64>,
        #[serde(default)]
        user_name: Option<String>,
    },
    TypingStop {
        room_id: i64,
        #[serde(default)]
        user_id: Option<i64>,
        #[serde(default)]
        user_name: Option<String>,
    },
}

/// A message sent from the server to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    UserJoined {
        room_id: i64,
        user_id: i64,
        display_name: String,
        timestamp: DateTime<Utc>,
    },
    UserLeft {
        room_id: i64,
        user_id: i64,
        display_name: String,
        timestamp: DateTime<Utc>,
    },
    ChatMessage(MessageView),
    MessageDeleted {
        message_id: i64,
        room_id: i64,
    },
    UserTyping {
        room_id: i64,
        user_id: i64,
        user_name: String,
        timestamp: DateTime<Utc>,
    },
    UserStoppedTyping {
        room_id: i64,
        user_id: i64,
        user_name: String,
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
    },
}
