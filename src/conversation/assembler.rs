//! Message assembly.
//!
//! Pure combination of recognition output, fan-out results, the context
//! snapshot and annotations into one [`ConversationMessage`]. No I/O and no
//! clock reads: ids, timestamps and durations arrive in [`MessageParts`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::fanout::FanOutResult;
use super::types::{
    ContextSnapshot, ConversationMessage, EmotionInfo, LanguageTag, Recognition, ToneInfo,
};

/// Everything needed to build one message.
#[derive(Debug, Clone)]
pub struct MessageParts {
    pub message_id: String,
    pub session_id: String,
    pub speaker_id: String,
    pub speaker_language: LanguageTag,
    pub recognition: Recognition,
    pub fan_out: FanOutResult,
    pub context: ContextSnapshot,
    pub emotion: Option<EmotionInfo>,
    pub tone: Option<ToneInfo>,
    /// Collaborator-supplied score, stored as given.
    pub quality_score: f64,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
}

pub struct MessageAssembler;

impl MessageAssembler {
    /// Build the immutable message.
    ///
    /// Translations keep roster order. Entries targeting the speaker and
    /// repeated target ids are dropped, and a target that has a translation
    /// is never also listed as failed.
    pub fn build(parts: MessageParts) -> ConversationMessage {
        let MessageParts {
            message_id,
            session_id,
            speaker_id,
            speaker_language,
            recognition,
            fan_out,
            context,
            emotion,
            tone,
            quality_score,
            timestamp,
            processing_time_ms,
        } = parts;

        let (translations, failures) = fan_out.into_parts();

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(speaker_id.clone());

        let translations: Vec<_> = translations
            .into_iter()
            .filter(|t| seen.insert(t.target_participant_id.clone()))
            .collect();
        let failed_targets: Vec<_> = failures
            .into_iter()
            .filter(|f| seen.insert(f.participant_id.clone()))
            .collect();

        ConversationMessage {
            id: message_id,
            session_id,
            speaker_id,
            speaker_language,
            original_text: recognition.transcript,
            translations,
            failed_targets,
            timestamp,
            recognition_confidence: recognition.confidence,
            processing_time_ms,
            context,
            emotion,
            tone,
            quality_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::fanout::FanOutTranslator;
    use crate::conversation::stubs::TaggingTranslator;
    use crate::conversation::types::ConversationParticipant;
    use std::sync::Arc;
    use std::time::Duration;

    fn tag(s: &str) -> LanguageTag {
        LanguageTag::parse(s).unwrap()
    }

    fn context() -> ContextSnapshot {
        ContextSnapshot {
            context_id: "ctx-1".into(),
            topic: Some("greeting".into()),
            relevance_score: 1.0,
            history_len: 0,
            taken_at: Utc::now(),
        }
    }

    async fn parts() -> MessageParts {
        let roster = vec![
            ConversationParticipant::new("a", "Ana", tag("en")),
            ConversationParticipant::new("b", "Bruno", tag("es")),
            ConversationParticipant::new("c", "Chloé", tag("fr")),
        ];
        let fanout = FanOutTranslator::new(Arc::new(TaggingTranslator), 4, Duration::from_secs(1));
        let fan_out = fanout
            .translate_all("Hello", "a", &context(), &roster)
            .await
            .unwrap();

        MessageParts {
            message_id: "m-1".into(),
            session_id: "s-1".into(),
            speaker_id: "a".into(),
            speaker_language: tag("en"),
            recognition: Recognition {
                transcript: "Hello".into(),
                confidence: 0.93,
            },
            fan_out,
            context: context(),
            emotion: None,
            tone: None,
            quality_score: 0.42,
            timestamp: DateTime::parse_from_rfc3339("2026-01-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            processing_time_ms: 120,
        }
    }

    #[tokio::test]
    async fn builds_message_in_roster_order() {
        let message = MessageAssembler::build(parts().await);
        assert_eq!(message.id, "m-1");
        assert_eq!(message.original_text, "Hello");
        assert_eq!(message.recognition_confidence, 0.93);
        assert_eq!(message.processing_time_ms, 120);
        let targets: Vec<_> = message
            .translations
            .iter()
            .map(|t| t.target_participant_id.as_str())
            .collect();
        assert_eq!(targets, vec!["b", "c"]);
        assert!(!message.has_failures());
    }

    #[tokio::test]
    async fn quality_score_is_stored_verbatim() {
        let message = MessageAssembler::build(parts().await);
        assert_eq!(message.quality_score, 0.42);
    }

    #[tokio::test]
    async fn never_targets_the_speaker() {
        let mut p = parts().await;
        p.speaker_id = "b".into();
        let message = MessageAssembler::build(p);
        assert!(message.translation_for("b").is_none());
        assert_eq!(message.translations.len(), 1);
    }

    #[tokio::test]
    async fn deterministic_for_same_inputs() {
        let p = parts().await;
        let a = MessageAssembler::build(p.clone());
        let b = MessageAssembler::build(p);
        assert_eq!(a, b);
    }
}
