//! Persistence and authorization seams.
//!
//! The engine and the REST layer only ever talk to these traits. Backed by
//! Postgres in production ([`pg`]) and an in-memory store in tests
//! ([`memory`]).

pub mod memory;
pub mod pg;

use async_trait::async_trait;

use crate::models::message::{MessageContent, MessageView};
use crate::models::room::Room;

/// Hard cap on message history reads. There is no pagination cursor;
/// callers never see more than this many rows per room.
pub const MESSAGE_HISTORY_CAP: i64 = 100;

/// Failure at the persistence seam.
#[derive(Debug)]
pub enum StoreError {
    /// The referenced row does not exist (or no longer exists).
    NotFound,
    /// The backing store failed; the detail is for logs, never for clients.
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Unavailable(detail) => write!(f, "store unavailable: {detail}"),
        }
    }
}

/// Persisted section → room mapping.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Look up the room for a section, creating it with a derived default
    /// name on first access. Always re-reads after insert and trusts the
    /// read, so concurrent first-joins converge on one row.
    async fn get_or_create(&self, section_id: i64) -> Result<Room, StoreError>;

    /// Look up a room by ID.
    async fn get(&self, room_id: i64) -> Result<Option<Room>, StoreError>;
}

/// Append-only persisted message log, enriched on read.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably persist a message and return its server-assigned ID.
    async fn append(
        &self,
        room_id: i64,
        sender_id: i64,
        content: &MessageContent,
    ) -> Result<i64, StoreError>;

    /// Re-read a message joined with its sender's display metadata.
    ///
    /// If this fails after a successful [`append`](Self::append), the
    /// message is durable but was never broadcast; it surfaces on the next
    /// [`list`](Self::list) call, which always re-reads.
    async fn enrich(&self, message_id: i64) -> Result<MessageView, StoreError>;

    /// Messages for a room, ascending by ID (creation order), capped at
    /// `limit`. Known limitation: there is no cursor, so rooms with more
    /// history than [`MESSAGE_HISTORY_CAP`] only expose the earliest rows.
    async fn list(&self, room_id: i64, limit: i64) -> Result<Vec<MessageView>, StoreError>;

    /// Hard delete. Does NOT re-check ownership: the engine gates this on
    /// `sender_id == requester`, and the trait must never be exposed to
    /// untrusted callers directly.
    async fn delete(&self, message_id: i64) -> Result<(), StoreError>;
}

/// The enrollment-membership check consulted before every join and write.
///
/// The engine treats `Err` and `Ok(false)` identically: the client only
/// ever sees a generic `unauthorized` signal, so enrollment structure
/// never leaks.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    async fn is_member(
        &self,
        user_id: i64,
        section_id: i64,
        room_id: i64,
    ) -> Result<bool, StoreError>;
}
