//! Postgres-backed store implementations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, OptionalExtension};

use cohort_common::SnowflakeGenerator;

use crate::db::pool::DbPool;
use crate::db::schema::{courses, enrollments, messages, rooms, sections, users};
use crate::models::message::{MessageContent, MessageRow, MessageView, NewMessageRow};
use crate::models::room::{default_room_name, NewRoom, Room};

use super::{MembershipOracle, MessageStore, RoomStore, StoreError};

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => Self::NotFound,
            diesel::result::Error::DatabaseError(
                DatabaseErrorKind::ForeignKeyViolation,
                info,
            ) => {
                tracing::debug!(message = info.message(), "foreign key violation");
                Self::NotFound
            }
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<diesel_async::pooled_connection::deadpool::PoolError> for StoreError {
    fn from(err: diesel_async::pooled_connection::deadpool::PoolError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Rooms, messages, and enrollment checks over one connection pool.
pub struct PgChatStore {
    pool: DbPool,
    snowflake: Arc<SnowflakeGenerator>,
}

impl PgChatStore {
    pub fn new(pool: DbPool, snowflake: Arc<SnowflakeGenerator>) -> Self {
        Self { pool, snowflake }
    }
}

/// Sender display columns selected alongside a message row.
type SenderColumns = (String, Option<String>);

fn into_view(row: MessageRow, sender: SenderColumns) -> MessageView {
    let (sender_name, sender_avatar) = sender;
    MessageView {
        id: row.id,
        room_id: row.room_id,
        sender_id: row.sender_id,
        sender_name,
        sender_avatar,
        message: row.body,
        message_type: row.message_type,
        file_url: row.file_url,
        timestamp: row.created_at,
    }
}

#[async_trait]
impl RoomStore for PgChatStore {
    async fn get_or_create(&self, section_id: i64) -> Result<Room, StoreError> {
        let mut conn = self.pool.get().await?;

        let existing: Option<Room> = diesel_async::RunQueryDsl::get_result(
            rooms::table
                .filter(rooms::section_id.eq(section_id))
                .select(Room::as_select()),
            &mut conn,
        )
        .await
        .optional()?;

        if let Some(room) = existing {
            return Ok(room);
        }

        // First write wins: a concurrent creation makes the insert a no-op
        // and the re-read below returns the winning row.
        diesel_async::RunQueryDsl::execute(
            diesel::insert_into(rooms::table)
                .values(NewRoom {
                    id: self.snowflake.generate(),
                    section_id,
                    name: &default_room_name(section_id),
                    created_at: Utc::now(),
                })
                .on_conflict(rooms::section_id)
                .do_nothing(),
            &mut conn,
        )
        .await?;

        let room: Option<Room> = diesel_async::RunQueryDsl::get_result(
            rooms::table
                .filter(rooms::section_id.eq(section_id))
                .select(Room::as_select()),
            &mut conn,
        )
        .await
        .optional()?;

        room.ok_or(StoreError::NotFound)
    }

    async fn get(&self, room_id: i64) -> Result<Option<Room>, StoreError> {
        let mut conn = self.pool.get().await?;

        let room: Option<Room> = diesel_async::RunQueryDsl::get_result(
            rooms::table.find(room_id).select(Room::as_select()),
            &mut conn,
        )
        .await
        .optional()?;

        Ok(room)
    }
}

#[async_trait]
impl MessageStore for PgChatStore {
    async fn append(
        &self,
        room_id: i64,
        sender_id: i64,
        content: &MessageContent,
    ) -> Result<i64, StoreError> {
        let mut conn = self.pool.get().await?;

        let id = self.snowflake.generate();
        diesel_async::RunQueryDsl::execute(
            diesel::insert_into(messages::table).values(NewMessageRow {
                id,
                room_id,
                sender_id,
                body: content.body(),
                message_type: content.kind(),
                file_url: content.file_url(),
                created_at: Utc::now(),
            }),
            &mut conn,
        )
        .await?;

        Ok(id)
    }

    async fn enrich(&self, message_id: i64) -> Result<MessageView, StoreError> {
        let mut conn = self.pool.get().await?;

        let row: Option<(MessageRow, SenderColumns)> = diesel_async::RunQueryDsl::get_result(
            messages::table
                .inner_join(users::table)
                .filter(messages::id.eq(message_id))
                .select((
                    MessageRow::as_select(),
                    (users::display_name, users::avatar_url),
                )),
            &mut conn,
        )
        .await
        .optional()?;

        let (row, sender) = row.ok_or(StoreError::NotFound)?;
        Ok(into_view(row, sender))
    }

    async fn list(&self, room_id: i64, limit: i64) -> Result<Vec<MessageView>, StoreError> {
        let mut conn = self.pool.get().await?;

        let rows: Vec<(MessageRow, SenderColumns)> = diesel_async::RunQueryDsl::load(
            messages::table
                .inner_join(users::table)
                .filter(messages::room_id.eq(room_id))
                .order(messages::id.asc())
                .limit(limit)
                .select((
                    MessageRow::as_select(),
                    (users::display_name, users::avatar_url),
                )),
            &mut conn,
        )
        .await?;

        Ok(rows
            .into_iter()
            .map(|(row, sender)| into_view(row, sender))
            .collect())
    }

    async fn delete(&self, message_id: i64) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;

        let deleted = diesel_async::RunQueryDsl::execute(
            diesel::delete(messages::table.find(message_id)),
            &mut conn,
        )
        .await?;

        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl MembershipOracle for PgChatStore {
    async fn is_member(
        &self,
        user_id: i64,
        section_id: i64,
        room_id: i64,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;

        let count: i64 = diesel_async::RunQueryDsl::get_result(
            rooms::table
                .inner_join(sections::table.on(sections::id.eq(rooms::section_id)))
                .inner_join(courses::table.on(courses::id.eq(sections::course_id)))
                .inner_join(
                    enrollments::table.on(enrollments::section_id.eq(sections::id)),
                )
                .filter(rooms::id.eq(room_id))
                .filter(rooms::section_id.eq(section_id))
                .filter(enrollments::user_id.eq(user_id))
                .count(),
            &mut conn,
        )
        .await?;

        Ok(count > 0)
    }
}
