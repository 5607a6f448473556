//! Rolling conversation context.
//!
//! The tracker owns a bounded window of recent utterances and turns each
//! incoming utterance into a [`ContextSnapshot`]. Topic and relevance come from
//! a [`ContextAnalyzer`]; the tracker only maintains the window, the snapshot
//! ids and the session-wide topic trail.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::traits::ContextAnalyzer;
use super::types::{ContextSnapshot, ConversationMessage};

/// Default rolling window size.
pub const DEFAULT_CONTEXT_WINDOW: usize = 50;

/// One utterance retained in the rolling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub message_id: String,
    pub speaker_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Bounded history plus topic trail for one session.
#[derive(Debug, Clone)]
pub struct ContextTracker {
    window: VecDeque<ContextEntry>,
    capacity: usize,
    current_topic: Option<String>,
    /// Distinct topics in the order they first became current.
    topics: Vec<String>,
    topic_shifts: u64,
}

impl ContextTracker {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            current_topic: None,
            topics: Vec::new(),
            topic_shifts: 0,
        }
    }

    /// Analyze `utterance` against the current window.
    ///
    /// Does not modify the window; call [`record`](Self::record) once the
    /// message is appended.
    pub fn snapshot(
        &self,
        analyzer: &dyn ContextAnalyzer,
        utterance: &str,
        speaker_id: &str,
    ) -> ContextSnapshot {
        let history: Vec<ContextEntry> = self.window.iter().cloned().collect();
        let analysis = analyzer.analyze(utterance, speaker_id, &history);

        ContextSnapshot {
            context_id: uuid::Uuid::new_v4().to_string(),
            topic: analysis.topic,
            relevance_score: analysis.relevance.clamp(0.0, 1.0),
            history_len: history.len(),
            taken_at: Utc::now(),
        }
    }

    /// Push an appended message into the window, evicting the oldest entry
    /// when full, and advance the topic trail.
    pub fn record(&mut self, message: &ConversationMessage) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(ContextEntry {
            message_id: message.id.clone(),
            speaker_id: message.speaker_id.clone(),
            text: message.original_text.clone(),
            timestamp: message.timestamp,
        });

        if let Some(topic) = &message.context.topic {
            if self.current_topic.as_ref() != Some(topic) {
                if self.current_topic.is_some() {
                    self.topic_shifts += 1;
                }
                if !self.topics.contains(topic) {
                    self.topics.push(topic.clone());
                }
                self.current_topic = Some(topic.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn current_topic(&self) -> Option<&str> {
        self.current_topic.as_deref()
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    pub fn topic_shifts(&self) -> u64 {
        self.topic_shifts
    }

    pub fn entries(&self) -> impl Iterator<Item = &ContextEntry> {
        self.window.iter()
    }

}

impl Default for ContextTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_WINDOW)
    }
}
