use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::rooms;

/// One chat room per course section, created lazily on first access.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = rooms)]
pub struct Room {
    pub id: i64,
    pub section_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = rooms)]
pub struct NewRoom<'a> {
    pub id: i64,
    pub section_id: i64,
    pub name: &'a str,
    pub created_at: DateTime<Utc>,
}

/// Default name given to a room created on first access to its section.
pub fn default_room_name(section_id: i64) -> String {
    format!("Section {section_id} Chat")
}
