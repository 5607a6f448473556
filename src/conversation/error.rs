//! Error taxonomy for the conversation core.
//!
//! Session-lifecycle errors are returned to the caller and never retried.
//! Per-target translation failures are carried inline as [`TranslationFailure`]
//! so one bad target cannot block delivery to the rest.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::SessionState;

/// Result alias used across the conversation core.
pub type Result<T> = std::result::Result<T, ConversationError>;

/// Errors surfaced by [`SessionCoordinator`](super::coordinator::SessionCoordinator).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConversationError {
    /// `start_session` was called while a session is already running.
    #[error("A conversation session is already active")]
    SessionAlreadyActive,

    /// The operation requires an `Active` session.
    #[error("No active conversation session")]
    NoActiveSession,

    /// Unknown or inactive participant.
    #[error("Participant not found: {0}")]
    ParticipantNotFound(String),

    /// Invalid settings or roster.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Speech recognition failed; the session stays active.
    #[error("Speech recognition failed: {0}")]
    RecognitionFailed(String),

    /// A single target's translation is unavailable.
    #[error("Translation for participant '{participant_id}' failed: {failure}")]
    TranslationFailed {
        participant_id: String,
        failure: TranslationFailure,
    },

    /// Speech synthesis failed.
    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    /// A suspend point exceeded its deadline.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    /// No message with this id in the session log.
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// State machine rejected the requested transition.
    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },

    /// The input was cancelled by a hard shutdown.
    #[error("Operation cancelled by session shutdown")]
    Cancelled,
}

impl ConversationError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn timeout(operation: &'static str, after: std::time::Duration) -> Self {
        Self::Timeout {
            operation,
            after_ms: duration_ms(after),
        }
    }

    /// Whether this error belongs to the session lifecycle group.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::SessionAlreadyActive
                | Self::NoActiveSession
                | Self::ParticipantNotFound(_)
                | Self::InvalidTransition { .. }
        )
    }
}

// ── Per-target failure ───────────────────────────────────────────

/// Why a single fan-out target did not receive a translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranslationFailure {
    /// The translator did not answer within the per-call timeout.
    Timeout { after_ms: u64 },
    /// The translator returned an error.
    Provider { message: String },
    /// The translator answered with blank text.
    EmptyResult,
}

impl std::fmt::Display for TranslationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { after_ms } => write!(f, "timed out after {after_ms}ms"),
            Self::Provider { message } => write!(f, "provider error: {message}"),
            Self::EmptyResult => f.write_str("empty translation"),
        }
    }
}

pub(crate) fn duration_ms(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
