//! Collaborator contracts consumed by the conversation core.
//!
//! Concrete engines (speech models, MT backends, TTS voices, heuristics)
//! implement these traits; the core only talks to them through `Arc<dyn _>`
//! handles bundled in [`Collaborators`]. Provider errors stay `anyhow` at
//! this boundary and are mapped to typed errors by the coordinator.

use std::sync::Arc;

use async_trait::async_trait;

use super::context::ContextEntry;
use super::types::{
    AudioChunk, ConversationMessage, ConversationTranslation, EmotionInfo, LanguageTag,
    Recognition, ToneInfo, TranslationOutput, VoiceProfile,
};

/// Speech-to-text.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, audio: &AudioChunk, language: &LanguageTag) -> anyhow::Result<Recognition>;
}

/// Machine translation; called once per fan-out target.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source: &LanguageTag,
        target: &LanguageTag,
    ) -> anyhow::Result<TranslationOutput>;
}

/// Text-to-speech.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Returns PCM16LE mono audio and its sample rate.
    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&VoiceProfile>,
        emotion: Option<&EmotionInfo>,
        tone: Option<&ToneInfo>,
    ) -> anyhow::Result<(Vec<u8>, u32)>;
}

/// Emotion, tone, quality and flow heuristics. Pure and non-suspending.
pub trait Annotator: Send + Sync {
    fn analyze_emotion(&self, text: &str, speaker_id: &str) -> Option<EmotionInfo>;

    fn analyze_tone(&self, text: &str, speaker_id: &str) -> Option<ToneInfo>;

    fn score_quality(&self, recognition: &Recognition, translations: &[ConversationTranslation]) -> f64;

    /// Conversation flow over a recent window (called with 2+ messages).
    fn score_flow(&self, recent: &[ConversationMessage]) -> f64;
}

/// Topic and relevance extraction over the rolling history window.
pub trait ContextAnalyzer: Send + Sync {
    fn analyze(&self, utterance: &str, speaker_id: &str, history: &[ContextEntry]) -> ContextAnalysis;
}

/// Analyzer verdict for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextAnalysis {
    pub topic: Option<String>,
    pub relevance: f64,
}

// ── Collaborator bundle ──────────────────────────────────────────

/// Handles to every external collaborator a coordinator needs.
#[derive(Clone)]
pub struct Collaborators {
    pub recognizer: Arc<dyn Recognizer>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub annotator: Arc<dyn Annotator>,
    pub context_analyzer: Arc<dyn ContextAnalyzer>,
}

impl Collaborators {
    /// Bundle wired entirely with the built-in stand-ins from [`super::stubs`].
    pub fn stubbed() -> Self {
        use super::stubs::{
            KeywordContextAnalyzer, NeutralAnnotator, SilentSynthesizer, TaggingTranslator,
            UnavailableRecognizer,
        };

        Self {
            recognizer: Arc::new(UnavailableRecognizer),
            translator: Arc::new(TaggingTranslator),
            synthesizer: Arc::new(SilentSynthesizer::default()),
            annotator: Arc::new(NeutralAnnotator),
            context_analyzer: Arc::new(KeywordContextAnalyzer::default()),
        }
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn Synthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn with_annotator(mut self, annotator: Arc<dyn Annotator>) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn with_context_analyzer(mut self, analyzer: Arc<dyn ContextAnalyzer>) -> Self {
        self.context_analyzer = analyzer;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
