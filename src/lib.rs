//! Multi-party real-time conversation translation.
//!
//! A [`conversation::SessionCoordinator`] owns one conversation: every
//! utterance is recognized, translated once per listener in parallel,
//! annotated and appended to an ordered log with running metrics.

pub mod config;
pub mod conversation;
pub mod logging;
