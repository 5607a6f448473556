use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::conversation::types::SessionSettings;

/// Top-level `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RelayConfig {
    pub conversation: ConversationConfig,
    /// Defaults applied to sessions started without explicit settings.
    pub session: SessionSettings,
    pub logging: LoggingConfig,
}

// ── Conversation pipeline ────────────────────────────────────────

/// Coordinator limits and collaborator timeouts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ConversationConfig {
    /// Upper bound on in-flight translator calls for one message.
    pub max_concurrent_translations: usize,
    pub translation_timeout_ms: u64,
    pub recognition_timeout_ms: u64,
    pub synthesis_timeout_ms: u64,
    /// Deadline for one `submit_input` call, end to end.
    pub submit_timeout_ms: u64,
    /// Messages kept in the rolling context window.
    pub context_window: usize,
    /// Messages considered for health and flow.
    pub health_window: usize,
    /// Recent average above this marks the session degraded.
    pub degraded_threshold_ms: u64,
    /// Consecutive total-outage messages before the session faults. 0 disables.
    pub max_consecutive_outages: u32,
    /// Capacity of the event broadcast channel.
    pub event_buffer: usize,
    /// Rooms a hub may hold open at once.
    pub max_rooms: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_translations: 6,
            translation_timeout_ms: 5_000,
            recognition_timeout_ms: 10_000,
            synthesis_timeout_ms: 10_000,
            submit_timeout_ms: 30_000,
            context_window: 50,
            health_window: 10,
            degraded_threshold_ms: 2_000,
            max_consecutive_outages: 5,
            event_buffer: 64,
            max_rooms: 16,
        }
    }
}

impl ConversationConfig {
    pub fn translation_timeout(&self) -> Duration {
        Duration::from_millis(self.translation_timeout_ms)
    }

    pub fn recognition_timeout(&self) -> Duration {
        Duration::from_millis(self.recognition_timeout_ms)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.synthesis_timeout_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

// ── Logging ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}
