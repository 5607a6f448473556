//! Room registry: many independent coordinators behind one handle.
//!
//! Each room owns its own [`SessionCoordinator`]; rooms share collaborators
//! but no session state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::ConversationConfig;

use super::coordinator::SessionCoordinator;
use super::error::ConversationError;
use super::summary::ConversationSummary;
use super::traits::Collaborators;

pub struct ConversationHub {
    rooms: Arc<Mutex<HashMap<String, Arc<SessionCoordinator>>>>,
    config: ConversationConfig,
    collaborators: Collaborators,
}

impl ConversationHub {
    pub fn new(config: ConversationConfig, collaborators: Collaborators) -> Self {
        Self {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            config,
            collaborators,
        }
    }

    /// Create a room with an idle coordinator.
    pub async fn open_room(&self, room_id: &str) -> anyhow::Result<Arc<SessionCoordinator>> {
        let room_id = room_id.trim();
        if room_id.is_empty() {
            anyhow::bail!("Room id must not be empty");
        }

        let mut rooms = self.rooms.lock().await;
        if rooms.contains_key(room_id) {
            anyhow::bail!("Room {room_id} is already open");
        }
        if rooms.len() >= self.config.max_rooms {
            anyhow::bail!(
                "Maximum concurrent rooms ({}) reached",
                self.config.max_rooms
            );
        }

        let coordinator = Arc::new(SessionCoordinator::new(
            self.config.clone(),
            self.collaborators.clone(),
        ));
        rooms.insert(room_id.to_string(), coordinator.clone());
        tracing::info!(room_id, rooms = rooms.len(), "Conversation room opened");
        Ok(coordinator)
    }

    pub async fn room(&self, room_id: &str) -> Option<Arc<SessionCoordinator>> {
        self.rooms.lock().await.get(room_id).cloned()
    }

    /// Remove a room, ending its session if one is running.
    ///
    /// Returns the final summary when a session was ended.
    pub async fn close_room(&self, room_id: &str) -> anyhow::Result<Option<ConversationSummary>> {
        let coordinator = self
            .rooms
            .lock()
            .await
            .remove(room_id)
            .ok_or_else(|| anyhow::anyhow!("Room {room_id} not found"))?;

        let summary = match coordinator.end_session().await {
            Ok(summary) => Some(summary),
            Err(ConversationError::NoActiveSession) => None,
            Err(e) => return Err(e.into()),
        };
        tracing::info!(room_id, ended_session = summary.is_some(), "Conversation room closed");
        Ok(summary)
    }

    pub async fn room_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rooms.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Rooms whose coordinator currently holds a session.
    pub async fn active_session_count(&self) -> usize {
        self.rooms
            .lock()
            .await
            .values()
            .filter(|c| c.state().has_session())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::types::{ConversationParticipant, LanguageTag, SessionSettings};

    fn hub(max_rooms: usize) -> ConversationHub {
        let config = ConversationConfig {
            max_rooms,
            ..Default::default()
        };
        ConversationHub::new(config, Collaborators::stubbed())
    }

    fn roster() -> Vec<ConversationParticipant> {
        vec![
            ConversationParticipant::new("a", "Ana", LanguageTag::parse("en").unwrap()),
            ConversationParticipant::new("b", "Bo", LanguageTag::parse("sv").unwrap()),
        ]
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let hub = hub(4);
        let lobby = hub.open_room("lobby").await.unwrap();
        let annex = hub.open_room("annex").await.unwrap();

        lobby.start_session(roster(), SessionSettings::default()).unwrap();
        lobby.submit_input("Hej", "b").await.unwrap();

        assert_eq!(lobby.messages().len(), 1);
        assert!(annex.messages().is_empty());
        assert_eq!(hub.active_session_count().await, 1);
        assert_eq!(hub.room_ids().await, vec!["annex".to_string(), "lobby".to_string()]);
    }

    #[tokio::test]
    async fn enforces_room_limit_and_unique_ids() {
        let hub = hub(1);
        hub.open_room("one").await.unwrap();

        let dup = hub.open_room("one").await.unwrap_err();
        assert!(dup.to_string().contains("already open"));

        let full = hub.open_room("two").await.unwrap_err();
        assert!(full.to_string().contains("Maximum concurrent rooms"));
    }

    #[tokio::test]
    async fn close_room_ends_running_session() {
        let hub = hub(2);
        let room = hub.open_room("r").await.unwrap();
        room.start_session(roster(), SessionSettings::default()).unwrap();
        room.submit_input("Hello", "a").await.unwrap();

        let summary = hub.close_room("r").await.unwrap().unwrap();
        assert_eq!(summary.message_count, 1);
        assert!(hub.room("r").await.is_none());

        hub.open_room("idle").await.unwrap();
        assert!(hub.close_room("idle").await.unwrap().is_none());
        assert!(hub.close_room("idle").await.is_err());
    }
}
