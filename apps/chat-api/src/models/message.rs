use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::messages;

/// Message payload, translated once at the wire boundary.
///
/// Internal code matches on the variant instead of re-checking optional
/// `message_type`/`file_url` field presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    File { body: String, url: String },
}

impl MessageContent {
    /// Translate the wire-level `(message, message_type?, file_url?)` triple.
    ///
    /// A missing `message_type` means `text`. A `file` message without a
    /// `file_url` is malformed.
    pub fn from_wire(
        message: String,
        message_type: Option<String>,
        file_url: Option<String>,
    ) -> Result<Self, &'static str> {
        match message_type.as_deref() {
            None | Some("text") => Ok(Self::Text(message)),
            Some("file") => match file_url {
                Some(url) => Ok(Self::File { body: message, url }),
                None => Err("file messages require a file_url"),
            },
            Some(_) => Err("message_type must be 'text' or 'file'"),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::File { .. } => "file",
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::Text(body) => body,
            Self::File { body, .. } => body,
        }
    }

    pub fn file_url(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::File { url, .. } => Some(url.as_str()),
        }
    }
}

/// A message row as stored, without sender display metadata.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = messages)]
pub struct MessageRow {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub body: String,
    pub message_type: String,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = messages)]
pub struct NewMessageRow<'a> {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub body: &'a str,
    pub message_type: &'a str,
    pub file_url: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// A persisted message enriched with sender display metadata.
///
/// This is the only message representation that ever reaches clients: the
/// engine broadcasts it after the store confirms the write, so every
/// recipient (the sender included) converges on the server-assigned `id`
/// and `timestamp`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageView {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub sender_avatar: Option<String>,
    pub message: String,
    pub message_type: String,
    pub file_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}
