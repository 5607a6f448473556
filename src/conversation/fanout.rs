//! Concurrent fan-out translation.
//!
//! One utterance is translated for every other active participant. Requests
//! run concurrently through a bounded window (`max_concurrency`), each one
//! under its own timeout. A failing or slow target is recorded as a
//! [`FailedTarget`] and never discards the results of the others.
//!
//! ```text
//!                     ┌─▸ translate(en→es) ─▸ Ok(translation)
//! utterance ─▸ targets├─▸ translate(en→fr) ─▸ Err(Timeout)       ─▸ FanOutResult
//!                     └─▸ same language    ─▸ Ok(pass-through)
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::stream::{self, StreamExt};

use super::error::{duration_ms, ConversationError, Result, TranslationFailure};
use super::traits::Translator;
use super::types::{ContextSnapshot, ConversationParticipant, ConversationTranslation, FailedTarget};

/// Default bound on simultaneous translator calls.
pub const DEFAULT_MAX_CONCURRENCY: usize = 6;

/// Per-target outcome.
pub type TargetOutcome = std::result::Result<ConversationTranslation, FailedTarget>;

// ── Fan-out result ───────────────────────────────────────────────

/// Outcomes of one fan-out, keyed by target participant id.
#[derive(Debug, Clone, Default)]
pub struct FanOutResult {
    outcomes: HashMap<String, TargetOutcome>,
    /// Target ids in roster order.
    order: Vec<String>,
    /// How many targets needed a translator call.
    dispatched: usize,
}

impl FanOutResult {
    pub fn get(&self, participant_id: &str) -> Option<&TargetOutcome> {
        self.outcomes.get(participant_id)
    }

    /// Outcomes in roster order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TargetOutcome)> {
        self.order
            .iter()
            .filter_map(|id| self.outcomes.get(id).map(|o| (id.as_str(), o)))
    }

    pub fn successes(&self) -> impl Iterator<Item = &ConversationTranslation> {
        self.iter().filter_map(|(_, o)| o.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &FailedTarget> {
        self.iter().filter_map(|(_, o)| o.as_ref().err())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Every target received a translation.
    pub fn is_complete(&self) -> bool {
        self.failure_count() == 0
    }

    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Translator calls were made and none of them succeeded.
    pub fn is_outage(&self) -> bool {
        self.dispatched > 0 && self.failure_count() == self.dispatched
    }

    /// Split into (translations, failures), both in roster order.
    pub fn into_parts(mut self) -> (Vec<ConversationTranslation>, Vec<FailedTarget>) {
        let mut translations = Vec::new();
        let mut failures = Vec::new();
        for id in &self.order {
            match self.outcomes.remove(id) {
                Some(Ok(t)) => translations.push(t),
                Some(Err(f)) => failures.push(f),
                None => {}
            }
        }
        (translations, failures)
    }
}

// ── Fan-out translator ───────────────────────────────────────────

/// Dispatches one translation per target with bounded parallelism.
pub struct FanOutTranslator {
    translator: Arc<dyn Translator>,
    max_concurrency: usize,
    per_call_timeout: Duration,
}

impl FanOutTranslator {
    pub fn new(translator: Arc<dyn Translator>, max_concurrency: usize, per_call_timeout: Duration) -> Self {
        Self {
            translator,
            max_concurrency: max_concurrency.max(1),
            per_call_timeout,
        }
    }

    /// Translate `text` from `source_id` for every other active participant.
    ///
    /// Targets that share the speaker's language get a pass-through copy
    /// without a translator call. Fails only when the speaker is not an
    /// active member of `roster`.
    pub async fn translate_all(
        &self,
        text: &str,
        source_id: &str,
        context: &ContextSnapshot,
        roster: &[ConversationParticipant],
    ) -> Result<FanOutResult> {
        let source = roster
            .iter()
            .find(|p| p.id == source_id && p.is_active)
            .ok_or_else(|| ConversationError::ParticipantNotFound(source_id.to_string()))?;

        let targets: Vec<&ConversationParticipant> = roster
            .iter()
            .filter(|p| p.is_active && p.id != source.id)
            .collect();

        let mut result = FanOutResult {
            outcomes: HashMap::with_capacity(targets.len()),
            order: targets.iter().map(|p| p.id.clone()).collect(),
            dispatched: 0,
        };

        let (same_language, remote): (Vec<_>, Vec<_>) = targets
            .into_iter()
            .partition(|p| p.language == source.language);

        for target in same_language {
            result.outcomes.insert(
                target.id.clone(),
                Ok(ConversationTranslation {
                    target_participant_id: target.id.clone(),
                    source_language: source.language.clone(),
                    target_language: target.language.clone(),
                    text: text.to_string(),
                    confidence: 1.0,
                    context_score: context.relevance_score,
                    timestamp: Utc::now(),
                }),
            );
        }

        if remote.is_empty() {
            return Ok(result);
        }

        result.dispatched = remote.len();
        let window = self.max_concurrency.min(remote.len());
        tracing::debug!(
            speaker = source_id,
            targets = remote.len(),
            window,
            "Dispatching fan-out translation"
        );

        let pending: Vec<_> = remote
            .into_iter()
            .map(|target| async move {
                let outcome = self.translate_one(text, source, target, context).await;
                (target.id.clone(), outcome)
            })
            .collect();
        let outcomes: Vec<(String, TargetOutcome)> = stream::iter(pending)
            .buffer_unordered(window)
            .collect()
            .await;

        result.outcomes.extend(outcomes);
        Ok(result)
    }

    /// Translate for a single target under the per-call timeout.
    pub async fn translate_one(
        &self,
        text: &str,
        source: &ConversationParticipant,
        target: &ConversationParticipant,
        context: &ContextSnapshot,
    ) -> TargetOutcome {
        let started = Instant::now();
        let call = self
            .translator
            .translate(text, &source.language, &target.language);

        let failure = match tokio::time::timeout(self.per_call_timeout, call).await {
            Ok(Ok(output)) if !output.text.trim().is_empty() => {
                tracing::trace!(
                    target_id = target.id.as_str(),
                    latency_ms = duration_ms(started.elapsed()),
                    "Target translated"
                );
                return Ok(ConversationTranslation {
                    target_participant_id: target.id.clone(),
                    source_language: source.language.clone(),
                    target_language: target.language.clone(),
                    text: output.text,
                    confidence: output.confidence.clamp(0.0, 1.0),
                    context_score: context.relevance_score,
                    timestamp: Utc::now(),
                });
            }
            Ok(Ok(_)) => TranslationFailure::EmptyResult,
            Ok(Err(e)) => TranslationFailure::Provider {
                message: format!("{e:#}"),
            },
            Err(_) => TranslationFailure::Timeout {
                after_ms: duration_ms(self.per_call_timeout),
            },
        };

        tracing::warn!(
            target_id = target.id.as_str(),
            target_language = target.language.as_str(),
            failure = %failure,
            "Target translation failed, continuing with remaining targets"
        );

        Err(FailedTarget {
            participant_id: target.id.clone(),
            target_language: target.language.clone(),
            failure,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::types::{LanguageTag, TranslationOutput};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tag(s: &str) -> LanguageTag {
        LanguageTag::parse(s).unwrap()
    }

    fn roster(langs: &[(&str, &str)]) -> Vec<ConversationParticipant> {
        langs
            .iter()
            .map(|(id, lang)| ConversationParticipant::new(*id, *id, tag(lang)))
            .collect()
    }

    fn context() -> ContextSnapshot {
        ContextSnapshot {
            context_id: "ctx".into(),
            topic: None,
            relevance_score: 0.8,
            history_len: 0,
            taken_at: Utc::now(),
        }
    }

    /// Fails for one language, sleeps for another, and tracks peak concurrency.
    #[derive(Default)]
    struct ScriptedTranslator {
        fail_for: Option<&'static str>,
        slow_for: Option<&'static str>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for ScriptedTranslator {
        async fn translate(
            &self,
            text: &str,
            source: &LanguageTag,
            target: &LanguageTag,
        ) -> anyhow::Result<TranslationOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = if Some(target.as_str()) == self.slow_for { 10_000 } else { 20 };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if Some(target.as_str()) == self.fail_for {
                anyhow::bail!("no model for {source}->{target}");
            }
            Ok(TranslationOutput {
                text: format!("{text} ({target})"),
                confidence: 0.9,
            })
        }
    }

    #[tokio::test]
    async fn produces_one_entry_per_other_participant() {
        let translator = Arc::new(ScriptedTranslator::default());
        let fanout = FanOutTranslator::new(translator, 6, Duration::from_secs(1));
        let roster = roster(&[("a", "en"), ("b", "es"), ("c", "fr"), ("d", "de")]);

        let result = fanout.translate_all("Hello", "a", &context(), &roster).await.unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.is_complete());
        assert!(result.get("a").is_none());
        let ids: Vec<_> = result.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["b", "c", "d"]);

        let b = result.get("b").unwrap().as_ref().unwrap();
        assert_eq!(b.source_language.as_str(), "en");
        assert_eq!(b.target_language.as_str(), "es");
        assert_eq!(b.context_score, 0.8);
    }

    #[tokio::test]
    async fn one_failure_keeps_other_results() {
        let translator = Arc::new(ScriptedTranslator {
            fail_for: Some("fr"),
            ..Default::default()
        });
        let fanout = FanOutTranslator::new(translator, 6, Duration::from_secs(1));
        let roster = roster(&[("a", "en"), ("b", "es"), ("c", "fr"), ("d", "de")]);

        let result = fanout.translate_all("Hello", "a", &context(), &roster).await.unwrap();
        assert_eq!(result.success_count(), 2);
        assert_eq!(result.failure_count(), 1);
        assert!(!result.is_outage());
        let failed = result.get("c").unwrap().as_ref().unwrap_err();
        assert!(matches!(failed.failure, TranslationFailure::Provider { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_target_times_out_without_blocking_others() {
        let translator = Arc::new(ScriptedTranslator {
            slow_for: Some("de"),
            ..Default::default()
        });
        let fanout = FanOutTranslator::new(translator, 6, Duration::from_millis(500));
        let roster = roster(&[("a", "en"), ("b", "es"), ("d", "de")]);

        let result = fanout.translate_all("Hello", "a", &context(), &roster).await.unwrap();
        assert!(result.get("b").unwrap().is_ok());
        let failed = result.get("d").unwrap().as_ref().unwrap_err();
        assert_eq!(failed.failure, TranslationFailure::Timeout { after_ms: 500 });
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let translator = Arc::new(ScriptedTranslator::default());
        let fanout = FanOutTranslator::new(translator.clone(), 2, Duration::from_secs(1));
        let roster = roster(&[
            ("a", "en"),
            ("b", "es"),
            ("c", "fr"),
            ("d", "de"),
            ("e", "it"),
            ("f", "ja"),
        ]);

        let result = fanout.translate_all("Hello", "a", &context(), &roster).await.unwrap();
        assert_eq!(result.success_count(), 5);
        assert!(translator.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn same_language_targets_skip_the_translator() {
        let translator = Arc::new(ScriptedTranslator::default());
        let fanout = FanOutTranslator::new(translator.clone(), 6, Duration::from_secs(1));
        let roster = roster(&[("a", "en"), ("b", "en")]);

        let result = fanout.translate_all("Hello", "a", &context(), &roster).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.dispatched(), 0);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 0);
        let b = result.get("b").unwrap().as_ref().unwrap();
        assert_eq!(b.text, "Hello");
        assert_eq!(b.confidence, 1.0);
    }

    #[tokio::test]
    async fn inactive_participants_are_skipped() {
        let translator = Arc::new(ScriptedTranslator::default());
        let fanout = FanOutTranslator::new(translator, 6, Duration::from_secs(1));
        let mut roster = roster(&[("a", "en"), ("b", "es"), ("c", "fr")]);
        roster[2].is_active = false;

        let result = fanout.translate_all("Hello", "a", &context(), &roster).await.unwrap();
        assert_eq!(result.len(), 1);
        assert!(result.get("c").is_none());
    }

    #[tokio::test]
    async fn unknown_source_is_rejected() {
        let translator = Arc::new(ScriptedTranslator::default());
        let fanout = FanOutTranslator::new(translator, 6, Duration::from_secs(1));
        let roster = roster(&[("a", "en"), ("b", "es")]);

        let err = fanout.translate_all("Hello", "zz", &context(), &roster).await.unwrap_err();
        assert_eq!(err, ConversationError::ParticipantNotFound("zz".into()));
    }

    #[tokio::test]
    async fn total_failure_is_an_outage() {
        let translator = Arc::new(ScriptedTranslator {
            fail_for: Some("es"),
            ..Default::default()
        });
        let fanout = FanOutTranslator::new(translator, 6, Duration::from_secs(1));
        let roster = roster(&[("a", "en"), ("b", "es")]);

        let result = fanout.translate_all("Hello", "a", &context(), &roster).await.unwrap();
        assert!(result.is_outage());
        let (translations, failures) = result.into_parts();
        assert!(translations.is_empty());
        assert_eq!(failures.len(), 1);
    }
}
