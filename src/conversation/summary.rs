//! End-of-session summary.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metrics::SessionMetrics;
use super::types::{ConversationMessage, ConversationParticipant};

/// Recap of one session, computed from its (frozen) message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub message_count: usize,
    /// Everyone who took part, including participants who left.
    pub participant_count: usize,
    pub language_count: usize,
    pub languages: Vec<String>,
    pub average_quality: f64,
    pub average_processing_ms: f64,
    pub translations_delivered: u64,
    pub translation_failures: u64,
    pub flow_score: Option<f64>,
    pub topics: Vec<String>,
    /// Times the detected topic changed between consecutive messages.
    pub topic_shifts: u64,
    /// Messages per speaker id.
    pub messages_by_speaker: BTreeMap<String, usize>,
    pub insights: Vec<String>,
}

/// Inputs borrowed from the coordinator while the log is frozen.
pub struct SummaryInput<'a> {
    pub session_id: &'a str,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub participants: &'a [ConversationParticipant],
    pub messages: &'a [ConversationMessage],
    pub metrics: &'a SessionMetrics,
    pub topics: &'a [String],
    pub topic_shifts: u64,
}

pub fn summarize(input: SummaryInput<'_>) -> ConversationSummary {
    let languages: BTreeSet<String> = input
        .participants
        .iter()
        .map(|p| p.language.to_string())
        .collect();

    let mut messages_by_speaker: BTreeMap<String, usize> = BTreeMap::new();
    for message in input.messages {
        *messages_by_speaker.entry(message.speaker_id.clone()).or_default() += 1;
    }

    let duration_ms = u64::try_from(
        input
            .ended_at
            .signed_duration_since(input.started_at)
            .num_milliseconds()
            .max(0),
    )
    .unwrap_or(0);

    let insights = insights(&input, &messages_by_speaker);

    ConversationSummary {
        session_id: input.session_id.to_string(),
        started_at: input.started_at,
        ended_at: input.ended_at,
        duration_ms,
        message_count: input.messages.len(),
        participant_count: input.participants.len(),
        language_count: languages.len(),
        languages: languages.into_iter().collect(),
        average_quality: input.metrics.average_quality,
        average_processing_ms: input.metrics.average_processing_ms,
        translations_delivered: input.metrics.translations_delivered,
        translation_failures: input.metrics.translation_failures,
        flow_score: input.metrics.flow_score,
        topics: input.topics.to_vec(),
        topic_shifts: input.topic_shifts,
        messages_by_speaker,
        insights,
    }
}

fn insights(input: &SummaryInput<'_>, by_speaker: &BTreeMap<String, usize>) -> Vec<String> {
    let mut out = Vec::new();

    if input.messages.is_empty() {
        out.push("No messages were exchanged".to_string());
        return out;
    }

    if let Some((speaker, count)) = by_speaker
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
    {
        let name = input
            .participants
            .iter()
            .find(|p| &p.id == speaker)
            .map_or(speaker.as_str(), |p| p.display_name.as_str());
        out.push(format!("Most active speaker: {name} ({count} messages)"));
    }

    let silent: Vec<&str> = input
        .participants
        .iter()
        .filter(|p| !by_speaker.contains_key(&p.id))
        .map(|p| p.display_name.as_str())
        .collect();
    if !silent.is_empty() {
        out.push(format!("Did not speak: {}", silent.join(", ")));
    }

    let failures = input.metrics.translation_failures;
    if failures > 0 {
        let affected = input.messages.iter().filter(|m| m.has_failures()).count();
        out.push(format!(
            "{failures} translation(s) failed across {affected} message(s)"
        ));
    }

    if input.topics.len() > 1 {
        out.push(format!(
            "Covered {} topics: {} ({} shifts)",
            input.topics.len(),
            input.topics.join(", "),
            input.topic_shifts
        ));
    }

    if input.metrics.average_context_relevance < 0.5 {
        out.push("Conversation drifted frequently between subjects".to_string());
    }

    match input.metrics.flow_score {
        Some(flow) if flow >= 0.6 => out.push("Balanced turn-taking".to_string()),
        Some(_) => out.push("Conversation was dominated by long single-speaker stretches".to_string()),
        None => {}
    }

    out
}
