//! Configuration loading.
//!
//! `config.toml` lives in the platform config directory
//! (`~/.config/lingua-relay/config.toml` on Linux) unless a path is given.
//! Every section is optional; missing keys take their defaults.

pub mod schema;

use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::ProjectDirs;

#[allow(unused_imports)]
pub use schema::{ConversationConfig, LoggingConfig, RelayConfig};

use crate::conversation::participants::MIN_PARTICIPANTS;

impl RelayConfig {
    /// Platform default location of `config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lingua-relay").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load and validate a config file. `~` and `$VARS` in the path are expanded.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let expanded = shellexpand::full(path)
            .with_context(|| format!("Failed to expand config path {path}"))?;
        let path = Path::new(expanded.as_ref());

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {e}", path.display()))?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load `path` if given, else the default file if it exists, else defaults.
    pub fn load_or_default(path: Option<&str>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(default) if default.exists() => Self::load(&default.to_string_lossy()),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let c = &self.conversation;
        if c.max_concurrent_translations == 0 {
            anyhow::bail!("conversation.max_concurrent_translations must be at least 1");
        }
        for (name, value) in [
            ("translation_timeout_ms", c.translation_timeout_ms),
            ("recognition_timeout_ms", c.recognition_timeout_ms),
            ("synthesis_timeout_ms", c.synthesis_timeout_ms),
            ("submit_timeout_ms", c.submit_timeout_ms),
        ] {
            if value == 0 {
                anyhow::bail!("conversation.{name} must be greater than zero");
            }
        }
        if c.context_window == 0 || c.health_window == 0 {
            anyhow::bail!("conversation.context_window and health_window must be at least 1");
        }
        if c.max_rooms == 0 {
            anyhow::bail!("conversation.max_rooms must be at least 1");
        }
        if self.session.max_participants < MIN_PARTICIPANTS {
            anyhow::bail!("session.max_participants must be at least {MIN_PARTICIPANTS}");
        }
        Ok(())
    }

    /// JSON schema of `config.toml`, pretty-printed.
    pub fn json_schema() -> anyhow::Result<String> {
        let schema = schemars::schema_for!(RelayConfig);
        serde_json::to_string_pretty(&schema).context("Failed to serialize config schema")
    }
}
