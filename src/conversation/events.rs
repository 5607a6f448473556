//! Lifecycle events broadcast by a coordinator.
//!
//! Subscribers (a gateway relaying to clients, a recorder) receive these via
//! [`SessionCoordinator::subscribe`](super::coordinator::SessionCoordinator::subscribe).
//! Slow subscribers lag and drop events; the coordinator never waits on them.

use serde::{Deserialize, Serialize};

use super::state::SessionState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ConversationEvent {
    StateChanged {
        session_id: Option<String>,
        from: SessionState,
        to: SessionState,
    },
    ParticipantJoined {
        session_id: String,
        participant_id: String,
        language: String,
    },
    ParticipantLeft {
        session_id: String,
        participant_id: String,
    },
    MessageAppended {
        session_id: String,
        message_id: String,
        speaker_id: String,
        /// Targets that received a translation.
        delivered: usize,
        /// Targets flagged as failed.
        failed: usize,
    },
    SessionEnded {
        session_id: String,
        message_count: usize,
    },
}
