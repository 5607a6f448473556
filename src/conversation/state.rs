//! Session lifecycle state machine.
//!
//! ```text
//! Idle ─▸ Initializing ─▸ Active ⇄ Paused
//!  ▴            │           │        │
//!  │            ▾           ▾        ▾
//!  └──────── Ending ◂───────┴────────┘
//!
//! Error(reason) is reachable from every state except Idle and leads to
//! Active (recover) or Ending.
//! ```

use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`SessionCoordinator`](super::coordinator::SessionCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    /// No session. Initial and terminal state.
    #[default]
    Idle,
    /// Validating roster and settings.
    Initializing,
    /// Accepting input.
    Active,
    /// Session kept alive but input is refused.
    Paused,
    /// Freezing the log and generating the summary.
    Ending,
    /// Faulted; holds the reason.
    Error(String),
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ending => "ending",
            Self::Error(_) => "error",
        }
    }

    /// Whether a session exists in this state.
    pub fn has_session(&self) -> bool {
        !matches!(self, Self::Idle | Self::Initializing)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Whether `self -> next` is a legal edge.
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Idle, Initializing) => true,
            (Initializing, Active) | (Initializing, Idle) => true,
            (Active, Paused) | (Paused, Active) => true,
            (Active, Ending) | (Paused, Ending) | (Error(_), Ending) => true,
            (Ending, Idle) => true,
            (Error(_), Active) => true,
            (Idle, Error(_)) => false,
            (_, Error(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error(reason) => write!(f, "error({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
        assert!(!SessionState::Idle.has_session());
    }

    #[test]
    fn happy_path_edges_are_legal() {
        let path = [
            SessionState::Idle,
            SessionState::Initializing,
            SessionState::Active,
            SessionState::Paused,
            SessionState::Active,
            SessionState::Ending,
            SessionState::Idle,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(&pair[1]),
                "{} -> {} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn error_reachable_from_non_terminal_states_only() {
        let fault = SessionState::Error("translator down".into());
        assert!(!SessionState::Idle.can_transition_to(&fault));
        assert!(SessionState::Initializing.can_transition_to(&fault));
        assert!(SessionState::Active.can_transition_to(&fault));
        assert!(SessionState::Paused.can_transition_to(&fault));
        assert!(fault.can_transition_to(&SessionState::Active));
        assert!(fault.can_transition_to(&SessionState::Ending));
        assert!(!fault.can_transition_to(&SessionState::Paused));
    }

    #[test]
    fn illegal_edges_are_rejected() {
        assert!(!SessionState::Idle.can_transition_to(&SessionState::Active));
        assert!(!SessionState::Idle.can_transition_to(&SessionState::Ending));
        assert!(!SessionState::Paused.can_transition_to(&SessionState::Paused));
        assert!(!SessionState::Ending.can_transition_to(&SessionState::Active));
    }

    #[test]
    fn display_includes_error_reason() {
        assert_eq!(SessionState::Active.to_string(), "active");
        assert_eq!(
            SessionState::Error("mic lost".into()).to_string(),
            "error(mic lost)"
        );
    }
}
