//! In-memory store implementation (for tests and standalone dev runs).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use cohort_common::SnowflakeGenerator;

use crate::models::message::{MessageContent, MessageView};
use crate::models::room::{default_room_name, Room};

use super::{MembershipOracle, MessageStore, RoomStore, StoreError};

#[derive(Clone)]
struct UserProfile {
    display_name: String,
    avatar_url: Option<String>,
}

struct StoredMessage {
    id: i64,
    room_id: i64,
    sender_id: i64,
    content: MessageContent,
    created_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<i64, UserProfile>,
    /// (section_id, user_id) enrollment pairs.
    enrollments: HashSet<(i64, i64)>,
    /// section_id → room.
    rooms: HashMap<i64, Room>,
    messages: Vec<StoredMessage>,
}

/// Rooms, messages, and enrollment checks over in-memory maps.
///
/// One mutex guards all tables, which gives get-or-create the same
/// first-write-wins semantics the Postgres store gets from its uniqueness
/// constraint.
pub struct MemoryChatStore {
    tables: Mutex<Tables>,
    snowflake: SnowflakeGenerator,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            snowflake: SnowflakeGenerator::new(0),
        }
    }

    /// Seed a user's display metadata.
    pub fn add_user(&self, user_id: i64, display_name: &str, avatar_url: Option<&str>) {
        self.tables.lock().unwrap().users.insert(
            user_id,
            UserProfile {
                display_name: display_name.to_string(),
                avatar_url: avatar_url.map(str::to_string),
            },
        );
    }

    /// Enroll a user in a section.
    pub fn enroll(&self, user_id: i64, section_id: i64) {
        self.tables
            .lock()
            .unwrap()
            .enrollments
            .insert((section_id, user_id));
    }

    /// Remove a user's enrollment in a section.
    pub fn unenroll(&self, user_id: i64, section_id: i64) {
        self.tables
            .lock()
            .unwrap()
            .enrollments
            .remove(&(section_id, user_id));
    }

    fn view(tables: &Tables, msg: &StoredMessage) -> Result<MessageView, StoreError> {
        let sender = tables
            .users
            .get(&msg.sender_id)
            .ok_or(StoreError::NotFound)?;
        Ok(MessageView {
            id: msg.id,
            room_id: msg.room_id,
            sender_id: msg.sender_id,
            sender_name: sender.display_name.clone(),
            sender_avatar: sender.avatar_url.clone(),
            message: msg.content.body().to_string(),
            message_type: msg.content.kind().to_string(),
            file_url: msg.content.file_url().map(str::to_string),
            timestamp: msg.created_at,
        })
    }
}

impl Default for MemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomStore for MemoryChatStore {
    async fn get_or_create(&self, section_id: i64) -> Result<Room, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(room) = tables.rooms.get(&section_id) {
            return Ok(room.clone());
        }
        let room = Room {
            id: self.snowflake.generate(),
            section_id,
            name: default_room_name(section_id),
            created_at: Utc::now(),
        };
        tables.rooms.insert(section_id, room.clone());
        Ok(room)
    }

    async fn get(&self, room_id: i64) -> Result<Option<Room>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.rooms.values().find(|r| r.id == room_id).cloned())
    }
}

#[async_trait]
impl MessageStore for MemoryChatStore {
    async fn append(
        &self,
        room_id: i64,
        sender_id: i64,
        content: &MessageContent,
    ) -> Result<i64, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        // Mirrors the sender foreign key in the Postgres schema.
        if !tables.users.contains_key(&sender_id) {
            return Err(StoreError::NotFound);
        }
        let id = self.snowflake.generate();
        tables.messages.push(StoredMessage {
            id,
            room_id,
            sender_id,
            content: content.clone(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn enrich(&self, message_id: i64) -> Result<MessageView, StoreError> {
        let tables = self.tables.lock().unwrap();
        let msg = tables
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .ok_or(StoreError::NotFound)?;
        Self::view(&tables, msg)
    }

    async fn list(&self, room_id: i64, limit: i64) -> Result<Vec<MessageView>, StoreError> {
        let tables = self.tables.lock().unwrap();
        // Messages are appended with increasing snowflakes, so insertion
        // order is already ascending ID order.
        tables
            .messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .take(limit.max(0) as usize)
            .map(|m| Self::view(&tables, m))
            .collect()
    }

    async fn delete(&self, message_id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.messages.len();
        tables.messages.retain(|m| m.id != message_id);
        if tables.messages.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl MembershipOracle for MemoryChatStore {
    async fn is_member(
        &self,
        user_id: i64,
        section_id: i64,
        room_id: i64,
    ) -> Result<bool, StoreError> {
        let tables = self.tables.lock().unwrap();
        let room_matches = tables
            .rooms
            .get(&section_id)
            .map(|r| r.id == room_id)
            .unwrap_or(false);
        Ok(room_matches && tables.enrollments.contains(&(section_id, user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let store = MemoryChatStore::new();
        let a = store.get_or_create(7).await.unwrap();
        let b = store.get_or_create(7).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.section_id, 7);
    }

    #[tokio::test]
    async fn append_requires_known_sender() {
        let store = MemoryChatStore::new();
        let room = store.get_or_create(1).await.unwrap();
        let err = store
            .append(room.id, 99, &MessageContent::Text("hi".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn list_orders_ascending_and_caps() {
        let store = MemoryChatStore::new();
        store.add_user(1, "Ada", None);
        let room = store.get_or_create(1).await.unwrap();

        for i in 0..5 {
            store
                .append(room.id, 1, &MessageContent::Text(format!("m{i}")))
                .await
                .unwrap();
        }

        let all = store.list(room.id, 100).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));

        let capped = store.list(room.id, 3).await.unwrap();
        assert_eq!(capped.len(), 3);
        assert_eq!(capped[0].message, "m0");
    }

    #[tokio::test]
    async fn is_member_requires_room_section_match() {
        let store = MemoryChatStore::new();
        store.add_user(1, "Ada", None);
        store.enroll(1, 7);
        let room = store.get_or_create(7).await.unwrap();

        assert!(store.is_member(1, 7, room.id).await.unwrap());
        // Wrong section for this room.
        assert!(!store.is_member(1, 8, room.id).await.unwrap());
        // Not enrolled.
        assert!(!store.is_member(2, 7, room.id).await.unwrap());
    }
}
