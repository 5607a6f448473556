//! Session coordinator: lifecycle, admission and the per-input pipeline.
//!
//! ## Pipeline
//!
//! ```text
//! submit_input ─▸ admission slot ─▸ recognize (audio only)
//!                                       │
//!                                       ▾
//!                              context snapshot ─▸ fan-out translate ─▸ annotate
//!                                                                          │
//!                      metrics.update ◂── append to log ◂── assemble ◂─────┘
//! ```
//!
//! ## Concurrency
//!
//! - The coordinator is the only owner of the roster, the message log, the
//!   context window and the metrics. They live behind a `parking_lot` mutex
//!   that is never held across an await; other components receive copies.
//! - `submit_input` and `end_session` queue on a FIFO admission slot, so at
//!   most one input is in the pipeline per session and log order equals
//!   submission order. Only the fan-out inside one input runs in parallel.
//! - `end_session` waits for the in-flight input; `shutdown` cancels it.
//! - Separate coordinators share nothing.

use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::ConversationConfig;

use super::assembler::{MessageAssembler, MessageParts};
use super::context::ContextTracker;
use super::error::{duration_ms, ConversationError, Result};
use super::events::ConversationEvent;
use super::fanout::FanOutTranslator;
use super::metrics::{HealthReport, MetricsAggregator, SessionMetrics};
use super::participants::{ParticipantRegistry, MIN_PARTICIPANTS};
use super::state::SessionState;
use super::summary::{summarize, ConversationSummary, SummaryInput};
use super::traits::Collaborators;
use super::types::{
    ConversationMessage, ConversationParticipant, ConversationSession, ConversationTranslation,
    InputPayload, Recognition, SessionSettings, SynthesizedAudio,
};

// ── Owned session record ─────────────────────────────────────────

struct SessionRecord {
    id: String,
    created_at: DateTime<Utc>,
    settings: SessionSettings,
    participants: ParticipantRegistry,
    log: Vec<ConversationMessage>,
    context: ContextTracker,
    metrics: MetricsAggregator,
    /// Consecutive messages whose every translator call failed.
    consecutive_outages: u32,
}

impl SessionRecord {
    fn view(&self, status: &SessionState) -> ConversationSession {
        ConversationSession {
            id: self.id.clone(),
            created_at: self.created_at,
            settings: self.settings.clone(),
            status: status.clone(),
            participants: self.participants.all().to_vec(),
            message_count: self.log.len(),
        }
    }

    fn summary(&self, ended_at: DateTime<Utc>) -> ConversationSummary {
        summarize(SummaryInput {
            session_id: &self.id,
            started_at: self.created_at,
            ended_at,
            participants: self.participants.all(),
            messages: &self.log,
            metrics: self.metrics.metrics(),
            topics: self.context.topics(),
            topic_shifts: self.context.topic_shifts(),
        })
    }
}

#[derive(Default)]
struct CoordinatorState {
    state: SessionState,
    session: Option<SessionRecord>,
    last_summary: Option<ConversationSummary>,
}

impl CoordinatorState {
    fn active_session(&self) -> Result<&SessionRecord> {
        match (&self.state, &self.session) {
            (SessionState::Active, Some(record)) => Ok(record),
            _ => Err(ConversationError::NoActiveSession),
        }
    }

    /// Session record for operations allowed in Active, Paused and Error.
    fn live_session_mut(&mut self) -> Result<&mut SessionRecord> {
        match &self.state {
            SessionState::Active | SessionState::Paused | SessionState::Error(_) => {
                self.session.as_mut().ok_or(ConversationError::NoActiveSession)
            }
            _ => Err(ConversationError::NoActiveSession),
        }
    }
}

/// What the pipeline needs from the session, copied out under the lock.
struct Admission {
    session_id: String,
    speaker: ConversationParticipant,
    roster: Vec<ConversationParticipant>,
}

// ── Coordinator ──────────────────────────────────────────────────

/// Single owner of one conversation session at a time.
pub struct SessionCoordinator {
    config: ConversationConfig,
    collaborators: Collaborators,
    fan_out: FanOutTranslator,
    inner: Mutex<CoordinatorState>,
    admission: tokio::sync::Mutex<()>,
    events: broadcast::Sender<ConversationEvent>,
    cancel: Mutex<CancellationToken>,
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator").finish_non_exhaustive()
    }
}

impl SessionCoordinator {
    pub fn new(config: ConversationConfig, collaborators: Collaborators) -> Self {
        let fan_out = FanOutTranslator::new(
            collaborators.translator.clone(),
            config.max_concurrent_translations,
            config.translation_timeout(),
        );
        let (events, _) = broadcast::channel(config.event_buffer.max(1));

        Self {
            config,
            collaborators,
            fan_out,
            inner: Mutex::new(CoordinatorState::default()),
            admission: tokio::sync::Mutex::new(()),
            events,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// Receive lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state.clone()
    }

    /// Read-only view of the current session.
    pub fn session(&self) -> Option<ConversationSession> {
        let inner = self.inner.lock();
        inner.session.as_ref().map(|s| s.view(&inner.state))
    }

    /// Copy of the message log.
    pub fn messages(&self) -> Vec<ConversationMessage> {
        let inner = self.inner.lock();
        inner
            .session
            .as_ref()
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    pub fn metrics(&self) -> Option<SessionMetrics> {
        let inner = self.inner.lock();
        inner.session.as_ref().map(|s| s.metrics.metrics().clone())
    }

    fn emit(&self, event: ConversationEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn transition(&self, inner: &mut CoordinatorState, next: SessionState) -> Result<()> {
        if !inner.state.can_transition_to(&next) {
            return Err(ConversationError::InvalidTransition {
                from: inner.state.clone(),
                to: next,
            });
        }

        let from = std::mem::replace(&mut inner.state, next.clone());
        let session_id = inner.session.as_ref().map(|s| s.id.clone());
        tracing::info!(
            session_id = session_id.as_deref().unwrap_or("-"),
            from = %from,
            to = %next,
            "Conversation session state changed"
        );
        self.emit(ConversationEvent::StateChanged {
            session_id,
            from,
            to: next,
        });
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Start a session with the given roster.
    pub fn start_session(
        &self,
        participants: Vec<ConversationParticipant>,
        settings: SessionSettings,
    ) -> Result<ConversationSession> {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Idle {
            tracing::warn!(state = %inner.state, "Rejected start_session: session already running");
            return Err(ConversationError::SessionAlreadyActive);
        }

        self.transition(&mut inner, SessionState::Initializing)?;

        let validated = if settings.max_participants < MIN_PARTICIPANTS {
            Err(ConversationError::config(format!(
                "max_participants must be at least {MIN_PARTICIPANTS}"
            )))
        } else {
            ParticipantRegistry::with_roster(participants, settings.max_participants)
        };

        let registry = match validated {
            Ok(registry) => registry,
            Err(e) => {
                tracing::warn!(error = %e, "Session configuration rejected");
                self.transition(&mut inner, SessionState::Idle)?;
                return Err(e);
            }
        };

        if registry.active_language_count() < 2 {
            tracing::warn!(
                participants = registry.len(),
                "Single-language session: translations will pass text through unchanged"
            );
        }

        let record = SessionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            settings,
            participants: registry,
            log: Vec::new(),
            context: ContextTracker::new(self.config.context_window),
            metrics: MetricsAggregator::new(self.config.health_window),
            consecutive_outages: 0,
        };
        tracing::info!(
            session_id = %record.id,
            participants = record.participants.len(),
            languages = record.participants.active_language_count(),
            mode = ?record.settings.mode,
            "Starting conversation session"
        );

        inner.session = Some(record);
        inner.last_summary = None;
        *self.cancel.lock() = CancellationToken::new();
        self.transition(&mut inner, SessionState::Active)?;

        let view = inner
            .session
            .as_ref()
            .map(|s| s.view(&inner.state))
            .ok_or(ConversationError::NoActiveSession)?;
        Ok(view)
    }

    /// End the session after any in-flight input finishes.
    ///
    /// Freezes the log, produces the summary and clears roster and log.
    pub async fn end_session(&self) -> Result<ConversationSummary> {
        let _slot = self.admission.lock().await;

        let mut inner = self.inner.lock();
        if !matches!(
            inner.state,
            SessionState::Active | SessionState::Paused | SessionState::Error(_)
        ) || inner.session.is_none()
        {
            return Err(ConversationError::NoActiveSession);
        }

        self.transition(&mut inner, SessionState::Ending)?;
        let record = inner.session.take().ok_or(ConversationError::NoActiveSession)?;
        let summary = record.summary(Utc::now());

        tracing::info!(
            session_id = %record.id,
            messages = summary.message_count,
            participants = summary.participant_count,
            duration_ms = summary.duration_ms,
            "Conversation session ended"
        );

        inner.last_summary = Some(summary.clone());
        self.transition(&mut inner, SessionState::Idle)?;
        self.emit(ConversationEvent::SessionEnded {
            session_id: record.id,
            message_count: summary.message_count,
        });
        Ok(summary)
    }

    /// Cancel any in-flight input and end the session.
    ///
    /// A fresh token is installed afterwards, so later calls see the
    /// lifecycle state instead of the cancellation.
    pub async fn shutdown(&self) -> Result<ConversationSummary> {
        tracing::warn!("Hard shutdown requested, cancelling in-flight input");
        self.cancel.lock().cancel();
        let ended = self.end_session().await;
        *self.cancel.lock() = CancellationToken::new();
        ended
    }

    pub fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.require_session(&inner)?;
        self.transition(&mut inner, SessionState::Paused)
    }

    pub fn resume(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.require_session(&inner)?;
        if inner.state != SessionState::Paused {
            return Err(ConversationError::InvalidTransition {
                from: inner.state.clone(),
                to: SessionState::Active,
            });
        }
        self.transition(&mut inner, SessionState::Active)
    }

    /// Put the session into `Error(reason)`.
    pub fn mark_error(&self, reason: impl Into<String>) -> Result<()> {
        let mut inner = self.inner.lock();
        self.transition(&mut inner, SessionState::Error(reason.into()))
    }

    /// Leave the `Error` state and accept input again.
    pub fn recover(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.require_session(&inner)?;
        if !inner.state.is_error() {
            return Err(ConversationError::InvalidTransition {
                from: inner.state.clone(),
                to: SessionState::Active,
            });
        }
        if let Some(record) = inner.session.as_mut() {
            record.consecutive_outages = 0;
        }
        self.transition(&mut inner, SessionState::Active)
    }

    fn require_session(&self, inner: &CoordinatorState) -> Result<()> {
        if inner.session.is_none() {
            return Err(ConversationError::NoActiveSession);
        }
        Ok(())
    }

    // ── Roster ───────────────────────────────────────────────────

    /// Add a participant mid-session (Active or Paused only).
    pub fn join_participant(&self, participant: ConversationParticipant) -> Result<ConversationParticipant> {
        let mut inner = self.inner.lock();
        if !matches!(inner.state, SessionState::Active | SessionState::Paused) {
            return Err(ConversationError::NoActiveSession);
        }
        let record = inner.session.as_mut().ok_or(ConversationError::NoActiveSession)?;
        let max = record.settings.max_participants;
        let joined = record.participants.join(participant, max)?.clone();
        let session_id = record.id.clone();

        tracing::info!(
            session_id = %session_id,
            participant = %joined.id,
            language = joined.language.as_str(),
            "Participant joined"
        );
        self.emit(ConversationEvent::ParticipantJoined {
            session_id,
            participant_id: joined.id.clone(),
            language: joined.language.to_string(),
        });
        Ok(joined)
    }

    /// Mark a participant inactive. Their past messages remain.
    pub fn leave_participant(&self, participant_id: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let record = inner.live_session_mut()?;
        record.participants.leave(participant_id)?;
        let session_id = record.id.clone();

        tracing::info!(session_id = %session_id, participant = participant_id, "Participant left");
        self.emit(ConversationEvent::ParticipantLeft {
            session_id,
            participant_id: participant_id.to_string(),
        });
        Ok(())
    }

    // ── Input pipeline ───────────────────────────────────────────

    /// Run one utterance through the pipeline and append the result.
    ///
    /// Calls are admitted one at a time in submission order. The whole call
    /// is bounded by `submit_timeout_ms`; a hard shutdown cancels it.
    pub async fn submit_input(
        &self,
        input: impl Into<InputPayload>,
        speaker_id: &str,
    ) -> Result<ConversationMessage> {
        let input = input.into();
        let _slot = self.admission.lock().await;
        let cancel = self.cancel.lock().clone();
        let deadline = self.config.submit_timeout();

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!(speaker = speaker_id, "Input cancelled by shutdown");
                Err(ConversationError::Cancelled)
            }
            outcome = tokio::time::timeout(deadline, self.run_pipeline(input, speaker_id)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(speaker = speaker_id, after_ms = duration_ms(deadline), "Input pipeline timed out");
                        Err(ConversationError::timeout("submit", deadline))
                    }
                }
            }
        }
    }

    async fn run_pipeline(&self, input: InputPayload, speaker_id: &str) -> Result<ConversationMessage> {
        let admission = self.admit(speaker_id)?;
        let started = Instant::now();
        let timestamp = Utc::now();

        let recognition = self.recognize(&input, &admission).await?;

        let context = {
            let inner = self.inner.lock();
            let record = inner.active_session()?;
            if record.id != admission.session_id {
                return Err(ConversationError::NoActiveSession);
            }
            record.context.snapshot(
                self.collaborators.context_analyzer.as_ref(),
                &recognition.transcript,
                speaker_id,
            )
        };

        let fan_out = self
            .fan_out
            .translate_all(&recognition.transcript, speaker_id, &context, &admission.roster)
            .await?;
        let outage = fan_out.is_outage();

        let annotator = &self.collaborators.annotator;
        let translations: Vec<ConversationTranslation> = fan_out.successes().cloned().collect();
        let quality_score = annotator.score_quality(&recognition, &translations);
        let emotion = annotator.analyze_emotion(&recognition.transcript, speaker_id);
        let tone = annotator.analyze_tone(&recognition.transcript, speaker_id);

        let message = MessageAssembler::build(MessageParts {
            message_id: uuid::Uuid::new_v4().to_string(),
            session_id: admission.session_id.clone(),
            speaker_id: speaker_id.to_string(),
            speaker_language: admission.speaker.language.clone(),
            recognition,
            fan_out,
            context,
            emotion,
            tone,
            quality_score,
            timestamp,
            processing_time_ms: duration_ms(started.elapsed()),
        });

        self.append(message, outage)
    }

    /// Validate state and speaker, and copy out what the pipeline needs.
    fn admit(&self, speaker_id: &str) -> Result<Admission> {
        let inner = self.inner.lock();
        let record = inner.active_session()?;
        let speaker = record.participants.require_active(speaker_id)?.clone();

        Ok(Admission {
            session_id: record.id.clone(),
            speaker,
            roster: record.participants.active_snapshot(),
        })
    }

    async fn recognize(&self, input: &InputPayload, admission: &Admission) -> Result<Recognition> {
        let recognition = match input {
            InputPayload::Text(text) => Recognition {
                transcript: text.trim().to_string(),
                confidence: 1.0,
            },
            InputPayload::Audio(audio) => {
                let limit = self.config.recognition_timeout();
                let call = self
                    .collaborators
                    .recognizer
                    .recognize(audio, &admission.speaker.language);

                match tokio::time::timeout(limit, call).await {
                    Ok(Ok(recognition)) => recognition,
                    Ok(Err(e)) => {
                        tracing::warn!(
                            session_id = %admission.session_id,
                            speaker = %admission.speaker.id,
                            error = %e,
                            "Speech recognition failed"
                        );
                        return Err(ConversationError::RecognitionFailed(format!("{e:#}")));
                    }
                    Err(_) => return Err(ConversationError::timeout("recognition", limit)),
                }
            }
        };

        if recognition.transcript.trim().is_empty() {
            return Err(ConversationError::RecognitionFailed(
                "input contained no speech or text".into(),
            ));
        }
        Ok(recognition)
    }

    /// Append to the log and fold into context and metrics, atomically.
    fn append(&self, message: ConversationMessage, outage: bool) -> Result<ConversationMessage> {
        let mut inner = self.inner.lock();
        let threshold = self.config.max_consecutive_outages;

        let record = match inner.session.as_mut() {
            Some(record) if record.id == message.session_id => record,
            _ => return Err(ConversationError::NoActiveSession),
        };

        record.log.push(message.clone());
        record.context.record(&message);
        record.metrics.update(&message);

        if record.log.len() >= 2 {
            let window = self.config.health_window.max(2).min(record.log.len());
            let recent = &record.log[record.log.len() - window..];
            let flow = self.collaborators.annotator.score_flow(recent);
            record.metrics.set_flow_score(flow);
        }

        record.consecutive_outages = if outage { record.consecutive_outages + 1 } else { 0 };
        let outages = record.consecutive_outages;

        tracing::debug!(
            session_id = %message.session_id,
            message_id = %message.id,
            speaker = %message.speaker_id,
            delivered = message.translations.len(),
            failed = message.failed_targets.len(),
            latency_ms = message.processing_time_ms,
            "Message appended"
        );
        self.emit(ConversationEvent::MessageAppended {
            session_id: message.session_id.clone(),
            message_id: message.id.clone(),
            speaker_id: message.speaker_id.clone(),
            delivered: message.translations.len(),
            failed: message.failed_targets.len(),
        });

        if threshold > 0 && outages >= threshold && inner.state == SessionState::Active {
            let reason = format!("translation unavailable for {outages} consecutive messages");
            tracing::error!(session_id = %message.session_id, "{reason}");
            self.transition(&mut inner, SessionState::Error(reason))?;
        }

        Ok(message)
    }

    // ── Follow-up operations ─────────────────────────────────────

    /// Synthesize the translation a target received for a message.
    pub async fn synthesize_for(&self, message_id: &str, participant_id: &str) -> Result<SynthesizedAudio> {
        let (text, voice, emotion, tone) = {
            let mut inner = self.inner.lock();
            let record = inner.live_session_mut()?;
            if !record.settings.synthesis_enabled {
                return Err(ConversationError::config("speech synthesis is disabled for this session"));
            }
            let message = record
                .log
                .iter()
                .find(|m| m.id == message_id)
                .ok_or_else(|| ConversationError::MessageNotFound(message_id.to_string()))?;
            let target = record.participants.require_active(participant_id)?;

            let text = match (message.translation_for(participant_id), message.failure_for(participant_id)) {
                (Some(translation), _) => translation.text.clone(),
                (None, Some(failed)) => {
                    return Err(ConversationError::TranslationFailed {
                        participant_id: participant_id.to_string(),
                        failure: failed.failure.clone(),
                    })
                }
                (None, None) => return Err(ConversationError::ParticipantNotFound(participant_id.to_string())),
            };
            (
                text,
                target.voice_profile.clone(),
                message.emotion.clone(),
                message.tone.clone(),
            )
        };

        let limit = self.config.synthesis_timeout();
        let call = self
            .collaborators
            .synthesizer
            .synthesize(&text, voice.as_ref(), emotion.as_ref(), tone.as_ref());

        match tokio::time::timeout(limit, call).await {
            Ok(Ok((data, sample_rate))) => {
                tracing::debug!(
                    message_id,
                    participant = participant_id,
                    bytes = data.len(),
                    "Synthesized translation"
                );
                Ok(SynthesizedAudio {
                    message_id: message_id.to_string(),
                    participant_id: participant_id.to_string(),
                    data,
                    sample_rate,
                })
            }
            Ok(Err(e)) => {
                tracing::warn!(message_id, participant = participant_id, error = %e, "Synthesis failed");
                Err(ConversationError::SynthesisFailed(format!("{e:#}")))
            }
            Err(_) => Err(ConversationError::timeout("synthesis", limit)),
        }
    }

    /// Re-request one target's translation of a logged message.
    ///
    /// The log is append-only, so the result is returned, not stored.
    pub async fn retry_translation(
        &self,
        message_id: &str,
        participant_id: &str,
    ) -> Result<ConversationTranslation> {
        let (message, source, target) = {
            let mut inner = self.inner.lock();
            let record = inner.live_session_mut()?;
            let message = record
                .log
                .iter()
                .find(|m| m.id == message_id)
                .cloned()
                .ok_or_else(|| ConversationError::MessageNotFound(message_id.to_string()))?;
            if message.speaker_id == participant_id {
                return Err(ConversationError::ParticipantNotFound(participant_id.to_string()));
            }
            let target = record.participants.require_active(participant_id)?.clone();
            let mut source = record
                .participants
                .get(&message.speaker_id)
                .cloned()
                .ok_or_else(|| ConversationError::ParticipantNotFound(message.speaker_id.clone()))?;
            source.language = message.speaker_language.clone();
            (message, source, target)
        };

        tracing::info!(message_id, participant = participant_id, "Retrying target translation");
        self.fan_out
            .translate_one(&message.original_text, &source, &target, &message.context)
            .await
            .map_err(|failed| ConversationError::TranslationFailed {
                participant_id: failed.participant_id,
                failure: failed.failure,
            })
    }

    /// Live summary while a session exists, else the last ended one.
    pub fn get_summary(&self) -> Result<ConversationSummary> {
        let inner = self.inner.lock();
        if let Some(record) = inner.session.as_ref() {
            return Ok(record.summary(Utc::now()));
        }
        inner
            .last_summary
            .clone()
            .ok_or(ConversationError::NoActiveSession)
    }

    pub fn get_health(&self) -> HealthReport {
        let inner = self.inner.lock();
        let threshold = self.config.degraded_threshold_ms;
        match inner.session.as_ref() {
            Some(record) => record.metrics.health(&inner.state, threshold),
            None => MetricsAggregator::default().health(&inner.state, threshold),
        }
    }
}
