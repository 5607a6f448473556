//! Data model shared by the conversation pipeline.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::error::TranslationFailure;
use super::state::SessionState;

// ── Language tags ────────────────────────────────────────────────

/// Normalised BCP-47 style language tag (`en`, `es`, `zh-TW`, `pt-BR`).
///
/// The primary subtag is lowercased, a two-letter region is uppercased and
/// `_` separators are accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageTag(String);

impl LanguageTag {
    /// Parse and normalise a tag. Returns `None` for malformed input.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split(['-', '_']);
        let primary = parts.next()?;
        if !(2..=3).contains(&primary.len()) || !primary.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }

        let mut tag = primary.to_ascii_lowercase();
        for sub in parts {
            if sub.is_empty() || sub.len() > 8 || !sub.chars().all(|c| c.is_ascii_alphanumeric()) {
                return None;
            }
            tag.push('-');
            if sub.len() == 2 && sub.chars().all(|c| c.is_ascii_alphabetic()) {
                tag.push_str(&sub.to_ascii_uppercase());
            } else {
                tag.push_str(&sub.to_ascii_lowercase());
            }
        }
        Some(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Primary language subtag (`zh` for `zh-TW`).
    pub fn primary(&self) -> &str {
        self.0.split('-').next().unwrap_or(&self.0)
    }
}

impl TryFrom<String> for LanguageTag {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid language tag: {value:?}"))
    }
}

impl From<LanguageTag> for String {
    fn from(tag: LanguageTag) -> Self {
        tag.0
    }
}

impl std::str::FromStr for LanguageTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid language tag: {s:?}"))
    }
}

impl std::fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Session settings ─────────────────────────────────────────────

/// Conversation style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    /// Free back-and-forth between participants.
    #[default]
    Dialogue,
    /// Many speakers, moderated turns.
    Meeting,
    /// One main speaker, others mostly listen.
    Presentation,
}

/// Requested translation quality tier, forwarded to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Fast,
    #[default]
    Balanced,
    High,
}

/// Per-session settings supplied to `start_session`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SessionSettings {
    pub mode: ConversationMode,
    pub quality: QualityLevel,
    /// Upper bound on simultaneously active participants.
    pub max_participants: usize,
    /// Whether `synthesize_for` is allowed.
    pub synthesis_enabled: bool,
    pub recording_enabled: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            mode: ConversationMode::Dialogue,
            quality: QualityLevel::Balanced,
            max_participants: 10,
            synthesis_enabled: true,
            recording_enabled: false,
        }
    }
}

// ── Participants ─────────────────────────────────────────────────

/// Voice used when synthesizing speech for a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub voice_id: String,
    /// 1.0 = normal speed.
    pub speaking_rate: f32,
    /// Semitone offset from the voice default.
    pub pitch: f32,
}

impl VoiceProfile {
    pub fn new(voice_id: impl Into<String>) -> Self {
        Self {
            voice_id: voice_id.into(),
            speaking_rate: 1.0,
            pitch: 0.0,
        }
    }
}

/// A person taking part in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationParticipant {
    pub id: String,
    pub display_name: String,
    pub language: LanguageTag,
    pub voice_profile: Option<VoiceProfile>,
    /// Inactive participants stay in the roster so old messages still resolve.
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
}

impl ConversationParticipant {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, language: LanguageTag) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            language,
            voice_profile: None,
            is_active: true,
            joined_at: Utc::now(),
        }
    }

    pub fn with_voice(mut self, profile: VoiceProfile) -> Self {
        self.voice_profile = Some(profile);
        self
    }
}

/// Read-only view of the current session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub settings: SessionSettings,
    pub status: SessionState,
    pub participants: Vec<ConversationParticipant>,
    pub message_count: usize,
}

// ── Input ────────────────────────────────────────────────────────

/// Raw PCM audio captured from a participant.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// PCM16LE mono samples.
    pub data: Vec<u8>,
    pub sample_rate: u32,
}

/// What a participant submitted.
#[derive(Debug, Clone, PartialEq)]
pub enum InputPayload {
    Text(String),
    Audio(AudioChunk),
}

impl InputPayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Audio(_))
    }
}

impl From<&str> for InputPayload {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for InputPayload {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Recognizer output (or the wrapped text for text input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub transcript: String,
    pub confidence: f64,
}

/// Translator output for a single target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationOutput {
    pub text: String,
    pub confidence: f64,
}

// ── Translation results ──────────────────────────────────────────

/// One translated rendition of a message for one target participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTranslation {
    pub target_participant_id: String,
    pub source_language: LanguageTag,
    pub target_language: LanguageTag,
    pub text: String,
    pub confidence: f64,
    /// Relevance of the utterance to the running conversation.
    pub context_score: f64,
    pub timestamp: DateTime<Utc>,
}

/// A target that did not receive a translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTarget {
    pub participant_id: String,
    pub target_language: LanguageTag,
    pub failure: TranslationFailure,
}

// ── Context and annotations ──────────────────────────────────────

/// Point-in-time context attached to one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub context_id: String,
    pub topic: Option<String>,
    /// 0.0 (unrelated) ..= 1.0 (on topic).
    pub relevance_score: f64,
    /// Entries in the rolling window when the snapshot was taken.
    pub history_len: usize,
    pub taken_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionInfo {
    pub label: String,
    pub intensity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneInfo {
    pub label: String,
    /// 0.0 casual ..= 1.0 formal.
    pub formality: f32,
}

// ── Message ──────────────────────────────────────────────────────

/// A fully processed utterance. Immutable once appended to the session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: String,
    pub session_id: String,
    pub speaker_id: String,
    pub speaker_language: LanguageTag,
    pub original_text: String,
    /// One entry per target that received a result; never the speaker.
    pub translations: Vec<ConversationTranslation>,
    pub failed_targets: Vec<FailedTarget>,
    pub timestamp: DateTime<Utc>,
    pub recognition_confidence: f64,
    pub processing_time_ms: u64,
    pub context: ContextSnapshot,
    pub emotion: Option<EmotionInfo>,
    pub tone: Option<ToneInfo>,
    pub quality_score: f64,
}

impl ConversationMessage {
    pub fn translation_for(&self, participant_id: &str) -> Option<&ConversationTranslation> {
        self.translations
            .iter()
            .find(|t| t.target_participant_id == participant_id)
    }

    pub fn failure_for(&self, participant_id: &str) -> Option<&FailedTarget> {
        self.failed_targets
            .iter()
            .find(|f| f.participant_id == participant_id)
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_targets.is_empty()
    }
}

/// Synthesized speech for one target of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    pub message_id: String,
    pub participant_id: String,
    /// PCM16LE mono.
    pub data: Vec<u8>,
    pub sample_rate: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_tag_normalises_case_and_separator() {
        assert_eq!(LanguageTag::parse("EN").unwrap().as_str(), "en");
        assert_eq!(LanguageTag::parse("zh_tw").unwrap().as_str(), "zh-TW");
        assert_eq!(LanguageTag::parse("pt-br").unwrap().as_str(), "pt-BR");
        assert_eq!(LanguageTag::parse("sr-Latn").unwrap().as_str(), "sr-latn");
        assert_eq!(LanguageTag::parse("zh-TW").unwrap().primary(), "zh");
    }

    #[test]
    fn language_tag_rejects_garbage() {
        assert!(LanguageTag::parse("").is_none());
        assert!(LanguageTag::parse("e").is_none());
        assert!(LanguageTag::parse("english").is_none());
        assert!(LanguageTag::parse("en-").is_none());
        assert!(LanguageTag::parse("12").is_none());
    }

    #[test]
    fn language_tag_deserialize_validates() {
        let tag: LanguageTag = serde_json::from_str("\"ES\"").unwrap();
        assert_eq!(tag.as_str(), "es");
        assert!(serde_json::from_str::<LanguageTag>("\"not a tag\"").is_err());
    }

    #[test]
    fn session_settings_defaults() {
        let settings = SessionSettings::default();
        assert_eq!(settings.max_participants, 10);
        assert_eq!(settings.mode, ConversationMode::Dialogue);
        assert_eq!(settings.quality, QualityLevel::Balanced);
        assert!(settings.synthesis_enabled);
        assert!(!settings.recording_enabled);
    }

    #[test]
    fn participant_starts_active() {
        let p = ConversationParticipant::new("a", "Alice", LanguageTag::parse("en").unwrap())
            .with_voice(VoiceProfile::new("alloy"));
        assert!(p.is_active);
        assert_eq!(p.voice_profile.unwrap().speaking_rate, 1.0);
    }
}
