//! Room broadcast engine: the state machine behind every live-connection
//! event.
//!
//! One `dispatch` entry point per incoming event; persistence and the
//! membership oracle are the only suspension points. The registry is
//! injected so the engine can be exercised in isolation against in-memory
//! stores.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::models::message::MessageContent;
use crate::store::{MembershipOracle, MessageStore, StoreError};

use super::events::{ClientEvent, ServerEvent};
use super::registry::{ConnectionRegistry, Identity};

/// Why an event was rejected. Reported only to the originating connection,
/// never broadcast, and never fatal to the connection itself.
#[derive(Debug)]
pub enum EngineError {
    /// Malformed input or an operation attempted out of order.
    Validation(&'static str),
    /// The membership oracle denied the join, or could not answer. The two
    /// cases are deliberately indistinguishable to the client.
    Unauthorized,
    /// Delete attempted by someone other than the sender.
    NotOwner,
    /// A store operation failed after all checks passed. The detail stays
    /// in the logs; clients get a generic message.
    Persistence(StoreError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "{message}"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotOwner => write!(f, "you can only delete your own messages"),
            Self::Persistence(_) => write!(f, "internal error"),
        }
    }
}

/// Orchestrates joins, sends, deletes, and presence over the injected
/// stores, oracle, and registry.
pub struct RoomEngine {
    messages: Arc<dyn MessageStore>,
    membership: Arc<dyn MembershipOracle>,
    registry: Arc<ConnectionRegistry>,
    /// Per-room serialization of persist→broadcast so every member observes
    /// messages in store commit order.
    room_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl RoomEngine {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        membership: Arc<dyn MembershipOracle>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            messages,
            membership,
            registry,
            room_locks: DashMap::new(),
        }
    }

    /// Process one client event. Errors are terminal for this event only.
    pub async fn dispatch(
        &self,
        connection_id: &str,
        event: ClientEvent,
    ) -> Result<(), EngineError> {
        match event {
            ClientEvent::Authenticate {
                user_id,
                display_name,
            } => self.authenticate(connection_id, user_id, display_name),
            ClientEvent::JoinRoom {
                room_id,
                section_id,
                ..
            } => self.join_room(connection_id, room_id, section_id).await,
            ClientEvent::LeaveRoom { room_id } => self.leave_room(connection_id, room_id),
            ClientEvent::ChatMessage {
                room_id,
                message,
                message_type,
                file_url,
                ..
            } => {
                let content = MessageContent::from_wire(message, message_type, file_url)
                    .map_err(EngineError::Validation)?;
                self.send_message(connection_id, room_id, content).await
            }
            ClientEvent::DeleteMessage { message_id, .. } => {
                self.delete_message(connection_id, message_id).await
            }
            ClientEvent::TypingStart { room_id, .. } => {
                self.typing(connection_id, room_id, true)
            }
            ClientEvent::TypingStop { room_id, .. } => {
                self.typing(connection_id, room_id, false)
            }
        }
    }

    /// Attach identity. Re-authenticating as a *different* user releases
    /// every membership first, since they were authorized for the old user.
    fn authenticate(
        &self,
        connection_id: &str,
        user_id: i64,
        display_name: String,
    ) -> Result<(), EngineError> {
        if let Some(previous) = self.registry.identity(connection_id) {
            if previous.user_id != user_id {
                tracing::info!(
                    %connection_id,
                    old_user_id = previous.user_id,
                    new_user_id = user_id,
                    "re-authentication as different user; releasing memberships"
                );
                self.release_memberships(connection_id, &previous);
            }
        }
        self.registry
            .authenticate(connection_id, user_id, display_name);
        Ok(())
    }

    /// Authorization is re-checked on every join, never cached: enrollment
    /// can change between sessions and the oracle call is cheap relative to
    /// a long-lived connection.
    async fn join_room(
        &self,
        connection_id: &str,
        room_id: i64,
        section_id: i64,
    ) -> Result<(), EngineError> {
        let identity = self
            .registry
            .identity(connection_id)
            .ok_or(EngineError::Validation("authenticate before joining a room"))?;

        let authorized = match self
            .membership
            .is_member(identity.user_id, section_id, room_id)
            .await
        {
            Ok(member) => member,
            Err(err) => {
                tracing::warn!(%connection_id, user_id = identity.user_id, %err, "membership oracle failed");
                false
            }
        };
        if !authorized {
            return Err(EngineError::Unauthorized);
        }

        if self.registry.join(connection_id, room_id) {
            tracing::debug!(%connection_id, user_id = identity.user_id, room_id, "joined room");
            self.registry.broadcast_to_room(
                room_id,
                Some(connection_id),
                Arc::new(ServerEvent::UserJoined {
                    room_id,
                    user_id: identity.user_id,
                    display_name: identity.display_name,
                    timestamp: Utc::now(),
                }),
            );
        }
        Ok(())
    }

    fn leave_room(&self, connection_id: &str, room_id: i64) -> Result<(), EngineError> {
        if self.registry.leave(connection_id, room_id) {
            if let Some(identity) = self.registry.identity(connection_id) {
                self.registry.broadcast_to_room(
                    room_id,
                    Some(connection_id),
                    Arc::new(ServerEvent::UserLeft {
                        room_id,
                        user_id: identity.user_id,
                        display_name: identity.display_name,
                        timestamp: Utc::now(),
                    }),
                );
            }
        }
        Ok(())
    }

    /// Persist, re-read enriched, then fan out to the entire room, sender
    /// included, so every tab converges on the server-assigned `id` and
    /// `timestamp`.
    async fn send_message(
        &self,
        connection_id: &str,
        room_id: i64,
        content: MessageContent,
    ) -> Result<(), EngineError> {
        let identity = self
            .registry
            .identity(connection_id)
            .ok_or(EngineError::Validation("authenticate before sending"))?;
        if content.body().trim().is_empty() {
            return Err(EngineError::Validation("message body is required"));
        }
        if !self.registry.is_member(connection_id, room_id) {
            return Err(EngineError::Validation("join the room before sending"));
        }

        let lock = self.room_lock(room_id);
        let _guard = lock.lock().await;

        let message_id = self
            .messages
            .append(room_id, identity.user_id, &content)
            .await
            .map_err(EngineError::Persistence)?;

        // If this fails the message is durable but never broadcast; it
        // surfaces on the next history read. No rollback.
        let view = self
            .messages
            .enrich(message_id)
            .await
            .map_err(EngineError::Persistence)?;

        self.registry
            .broadcast_to_room(room_id, None, Arc::new(ServerEvent::ChatMessage(view)));
        Ok(())
    }

    async fn delete_message(
        &self,
        connection_id: &str,
        message_id: i64,
    ) -> Result<(), EngineError> {
        let identity = self
            .registry
            .identity(connection_id)
            .ok_or(EngineError::Validation("authenticate before deleting"))?;

        let view = match self.messages.enrich(message_id).await {
            Ok(view) => view,
            Err(StoreError::NotFound) => {
                return Err(EngineError::Validation("unknown message"))
            }
            Err(err) => return Err(EngineError::Persistence(err)),
        };

        if !self.registry.is_member(connection_id, view.room_id) {
            return Err(EngineError::Validation("join the room before deleting"));
        }
        if view.sender_id != identity.user_id {
            return Err(EngineError::NotOwner);
        }

        let lock = self.room_lock(view.room_id);
        let _guard = lock.lock().await;

        self.messages
            .delete(message_id)
            .await
            .map_err(EngineError::Persistence)?;

        self.registry.broadcast_to_room(
            view.room_id,
            None,
            Arc::new(ServerEvent::MessageDeleted {
                message_id,
                room_id: view.room_id,
            }),
        );
        Ok(())
    }

    /// Typing signals are never persisted, only fanned out.
    fn typing(
        &self,
        connection_id: &str,
        room_id: i64,
        started: bool,
    ) -> Result<(), EngineError> {
        let identity = self
            .registry
            .identity(connection_id)
            .ok_or(EngineError::Validation("authenticate first"))?;
        if !self.registry.is_member(connection_id, room_id) {
            return Err(EngineError::Validation("join the room first"));
        }

        let event = if started {
            ServerEvent::UserTyping {
                room_id,
                user_id: identity.user_id,
                user_name: identity.display_name,
                timestamp: Utc::now(),
            }
        } else {
            ServerEvent::UserStoppedTyping {
                room_id,
                user_id: identity.user_id,
                user_name: identity.display_name,
                timestamp: Utc::now(),
            }
        };
        self.registry
            .broadcast_to_room(room_id, Some(connection_id), Arc::new(event));
        Ok(())
    }

    /// Disconnect: release every membership and announce the departure to
    /// each room the connection was in. Must be invoked exactly once per
    /// connection, by the transport loop.
    pub fn disconnect(&self, connection_id: &str) {
        if let Some((identity, rooms)) = self.registry.unregister(connection_id) {
            if let Some(identity) = identity {
                for room_id in rooms {
                    self.registry.broadcast_to_room(
                        room_id,
                        None,
                        Arc::new(ServerEvent::UserLeft {
                            room_id,
                            user_id: identity.user_id,
                            display_name: identity.display_name.clone(),
                            timestamp: Utc::now(),
                        }),
                    );
                }
            }
        }
    }

    fn release_memberships(&self, connection_id: &str, identity: &Identity) {
        for room_id in self.registry.rooms_of(connection_id) {
            if self.registry.leave(connection_id, room_id) {
                self.registry.broadcast_to_room(
                    room_id,
                    Some(connection_id),
                    Arc::new(ServerEvent::UserLeft {
                        room_id,
                        user_id: identity.user_id,
                        display_name: identity.display_name.clone(),
                        timestamp: Utc::now(),
                    }),
                );
            }
        }
    }

    fn room_lock(&self, room_id: i64) -> Arc<Mutex<()>> {
        self.room_locks
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
