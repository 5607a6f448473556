//! Built-in collaborator stand-ins.
//!
//! Used by the CLI replay command and by tests. None of them talk to a real
//! model: the translator tags text with its language pair, the synthesizer
//! returns silence, and the analyzers are small lexical heuristics.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;

use super::context::ContextEntry;
use super::traits::{Annotator, ContextAnalysis, ContextAnalyzer, Recognizer, Synthesizer, Translator};
use super::types::{
    AudioChunk, ConversationMessage, ConversationTranslation, EmotionInfo, LanguageTag,
    Recognition, ToneInfo, TranslationOutput, VoiceProfile,
};

// ── Recognizer (stub) ────────────────────────────────────────────

/// Recognizer for text-only deployments: every audio input fails.
pub struct UnavailableRecognizer;

#[async_trait]
impl Recognizer for UnavailableRecognizer {
    async fn recognize(&self, audio: &AudioChunk, language: &LanguageTag) -> anyhow::Result<Recognition> {
        tracing::debug!(
            bytes = audio.data.len(),
            language = language.as_str(),
            "Audio submitted without a configured recognizer"
        );
        anyhow::bail!("speech recognition is not configured")
    }
}

// ── Translator (stub) ────────────────────────────────────────────

/// Returns `[src→tgt] text`.
pub struct TaggingTranslator;

#[async_trait]
impl Translator for TaggingTranslator {
    async fn translate(
        &self,
        text: &str,
        source: &LanguageTag,
        target: &LanguageTag,
    ) -> anyhow::Result<TranslationOutput> {
        tracing::trace!(
            source = source.as_str(),
            target = target.as_str(),
            text_len = text.len(),
            "Tagging translation"
        );
        Ok(TranslationOutput {
            text: format!("[{source}→{target}] {text}"),
            confidence: 0.75,
        })
    }
}

// ── Synthesizer (stub) ───────────────────────────────────────────

/// Produces PCM16 silence whose length scales with the word count.
pub struct SilentSynthesizer {
    pub sample_rate: u32,
    pub ms_per_word: u32,
}

impl Default for SilentSynthesizer {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            ms_per_word: 250,
        }
    }
}

#[async_trait]
impl Synthesizer for SilentSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: Option<&VoiceProfile>,
        _emotion: Option<&EmotionInfo>,
        _tone: Option<&ToneInfo>,
    ) -> anyhow::Result<(Vec<u8>, u32)> {
        let words = text.split_whitespace().count();
        if words == 0 {
            anyhow::bail!("nothing to synthesize");
        }

        let rate = voice.map_or(1.0, |v| v.speaking_rate).max(0.25);
        let ms = (words as f64 * f64::from(self.ms_per_word) / f64::from(rate)) as u64;
        let samples = ms * u64::from(self.sample_rate) / 1000;
        let bytes = usize::try_from(samples * 2)?;
        Ok((vec![0u8; bytes], self.sample_rate))
    }
}

// ── Annotator (stub) ─────────────────────────────────────────────

/// Neutral emotion and tone; quality is the mean confidence.
pub struct NeutralAnnotator;

impl Annotator for NeutralAnnotator {
    fn analyze_emotion(&self, _text: &str, _speaker_id: &str) -> Option<EmotionInfo> {
        Some(EmotionInfo {
            label: "neutral".into(),
            intensity: 0.0,
        })
    }

    fn analyze_tone(&self, _text: &str, _speaker_id: &str) -> Option<ToneInfo> {
        Some(ToneInfo {
            label: "neutral".into(),
            formality: 0.5,
        })
    }

    fn score_quality(&self, recognition: &Recognition, translations: &[ConversationTranslation]) -> f64 {
        let total: f64 = recognition.confidence + translations.iter().map(|t| t.confidence).sum::<f64>();
        let count = 1 + translations.len();
        (total / count as f64).clamp(0.0, 1.0)
    }

    /// Share of adjacent message pairs where the speaker changed.
    fn score_flow(&self, recent: &[ConversationMessage]) -> f64 {
        if recent.len() < 2 {
            return 1.0;
        }
        let turns = recent
            .windows(2)
            .filter(|pair| pair[0].speaker_id != pair[1].speaker_id)
            .count();
        turns as f64 / (recent.len() - 1) as f64
    }
}

// ── Context analyzer (stub) ──────────────────────────────────────

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "because", "been", "before", "could", "does", "from", "have",
    "here", "just", "like", "more", "much", "only", "should", "some", "than", "that", "their",
    "them", "then", "there", "these", "they", "this", "very", "want", "what", "when", "where",
    "which", "will", "with", "would", "your",
];

/// Dominant-keyword topic and lexical-overlap relevance.
pub struct KeywordContextAnalyzer {
    pub min_word_len: usize,
}

impl Default for KeywordContextAnalyzer {
    fn default() -> Self {
        Self { min_word_len: 4 }
    }
}

impl KeywordContextAnalyzer {
    fn keywords<'a>(&self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        let min = self.min_word_len;
        text.split(|c: char| !c.is_alphanumeric())
            .filter(move |w| w.chars().count() >= min)
            .map(str::to_lowercase)
            .filter(|w| !STOPWORDS.contains(&w.as_str()))
    }
}

impl ContextAnalyzer for KeywordContextAnalyzer {
    fn analyze(&self, utterance: &str, _speaker_id: &str, history: &[ContextEntry]) -> ContextAnalysis {
        let current: HashSet<String> = self.keywords(utterance).collect();

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for entry in history {
            for word in self.keywords(&entry.text) {
                *counts.entry(word).or_default() += 1;
            }
        }

        let relevance = if history.is_empty() {
            1.0
        } else if current.is_empty() {
            0.5
        } else {
            let shared = current.iter().filter(|w| counts.contains_key(*w)).count();
            shared as f64 / current.len() as f64
        };

        for word in &current {
            *counts.entry(word.clone()).or_default() += 1;
        }
        // BTreeMap order makes ties resolve to the alphabetically first word.
        let topic = counts
            .iter()
            .fold(None::<(&String, usize)>, |best, (word, &n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((word, n)),
            })
            .map(|(word, _)| word.clone());

        ContextAnalysis { topic, relevance }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tag(s: &str) -> LanguageTag {
        LanguageTag::parse(s).unwrap()
    }

    fn entry(speaker: &str, text: &str) -> ContextEntry {
        ContextEntry {
            message_id: uuid::Uuid::new_v4().to_string(),
            speaker_id: speaker.into(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn tagging_translator_includes_language_pair() {
        let out = TaggingTranslator
            .translate("Hello", &tag("en"), &tag("es"))
            .await
            .unwrap();
        assert_eq!(out.text, "[en→es] Hello");
    }

    #[tokio::test]
    async fn unavailable_recognizer_fails() {
        let audio = AudioChunk {
            data: vec![0; 320],
            sample_rate: 16_000,
        };
        let err = UnavailableRecognizer.recognize(&audio, &tag("en")).await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn silent_synthesizer_scales_with_words() {
        let synth = SilentSynthesizer::default();
        let (one, rate) = synth.synthesize("hola", None, None, None).await.unwrap();
        let (two, _) = synth.synthesize("hola amigo", None, None, None).await.unwrap();
        assert_eq!(rate, 16_000);
        assert_eq!(one.len(), 8_000);
        assert_eq!(two.len(), 2 * one.len());
        assert!(synth.synthesize("   ", None, None, None).await.is_err());
    }

    #[test]
    fn neutral_annotator_quality_is_mean_confidence() {
        let recognition = Recognition {
            transcript: "hi".into(),
            confidence: 1.0,
        };
        let translation = ConversationTranslation {
            target_participant_id: "b".into(),
            source_language: tag("en"),
            target_language: tag("es"),
            text: "hola".into(),
            confidence: 0.5,
            context_score: 1.0,
            timestamp: Utc::now(),
        };
        let score = NeutralAnnotator.score_quality(&recognition, &[translation]);
        assert!((score - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn keyword_analyzer_first_utterance_is_fully_relevant() {
        let analysis = KeywordContextAnalyzer::default().analyze("Budget planning today", "a", &[]);
        assert_eq!(analysis.relevance, 1.0);
        assert!(analysis.topic.is_some());
    }

    #[test]
    fn keyword_analyzer_tracks_dominant_topic() {
        let history = vec![
            entry("a", "The budget review is tomorrow"),
            entry("b", "Which budget line worries you?"),
        ];
        let analysis =
            KeywordContextAnalyzer::default().analyze("Travel budget mostly", "a", &history);
        assert_eq!(analysis.topic.as_deref(), Some("budget"));
        assert!(analysis.relevance > 0.0 && analysis.relevance < 1.0);
    }

    #[test]
    fn keyword_analyzer_unrelated_utterance_scores_zero() {
        let history = vec![entry("a", "Quarterly budget numbers")];
        let analysis = KeywordContextAnalyzer::default().analyze("Weather forecast", "b", &history);
        assert_eq!(analysis.relevance, 0.0);
    }
}
