//! Session-wide running statistics and health.
//!
//! Fed one appended message at a time by the coordinator, which is the only
//! writer. Averages are folded incrementally and never recomputed from the
//! log.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::state::SessionState;
use super::types::ConversationMessage;

/// Default number of recent messages considered for health.
pub const DEFAULT_HEALTH_WINDOW: usize = 10;

// ── Session metrics ──────────────────────────────────────────────

/// Aggregate statistics for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub message_count: u64,
    pub average_processing_ms: f64,
    pub fastest_processing_ms: Option<u64>,
    pub slowest_processing_ms: Option<u64>,
    pub average_context_relevance: f64,
    pub average_quality: f64,
    /// Latest collaborator flow score; `None` until two messages exist.
    pub flow_score: Option<f64>,
    pub translations_delivered: u64,
    pub translation_failures: u64,
}

/// `avg' = (avg * (n - 1) + x) / n`
fn fold_average(avg: f64, n: u64, x: f64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    (avg * (n - 1) as f64 + x) / n as f64
}

// ── Health ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Recent average processing time above the configured threshold.
    Degraded,
    /// Session is in the `Error` state.
    Critical,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub state: SessionState,
    /// Average over the recent window, if any message was processed.
    pub recent_average_ms: Option<f64>,
    pub threshold_ms: u64,
    pub detail: String,
}

// ── Aggregator ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    metrics: SessionMetrics,
    recent: VecDeque<u64>,
    health_window: usize,
}

impl MetricsAggregator {
    pub fn new(health_window: usize) -> Self {
        let health_window = health_window.max(1);
        Self {
            metrics: SessionMetrics::default(),
            recent: VecDeque::with_capacity(health_window),
            health_window,
        }
    }

    /// Fold one appended message into the running statistics.
    pub fn update(&mut self, message: &ConversationMessage) {
        let m = &mut self.metrics;
        m.message_count += 1;
        let n = m.message_count;
        let ms = message.processing_time_ms;

        m.average_processing_ms = fold_average(m.average_processing_ms, n, ms as f64);
        m.average_context_relevance =
            fold_average(m.average_context_relevance, n, message.context.relevance_score);
        m.average_quality = fold_average(m.average_quality, n, message.quality_score);
        m.fastest_processing_ms = Some(m.fastest_processing_ms.map_or(ms, |f| f.min(ms)));
        m.slowest_processing_ms = Some(m.slowest_processing_ms.map_or(ms, |s| s.max(ms)));
        m.translations_delivered += message.translations.len() as u64;
        m.translation_failures += message.failed_targets.len() as u64;

        if self.recent.len() == self.health_window {
            self.recent.pop_front();
        }
        self.recent.push_back(ms);
    }

    /// Store the latest flow score computed by the annotator.
    pub fn set_flow_score(&mut self, score: f64) {
        self.metrics.flow_score = Some(score.clamp(0.0, 1.0));
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn recent_average_ms(&self) -> Option<f64> {
        if self.recent.is_empty() {
            return None;
        }
        Some(self.recent.iter().sum::<u64>() as f64 / self.recent.len() as f64)
    }

    /// Derive health from the recent window and the session state.
    pub fn health(&self, state: &SessionState, threshold_ms: u64) -> HealthReport {
        let recent_average_ms = self.recent_average_ms();

        let (status, detail) = match (state, recent_average_ms) {
            (SessionState::Error(reason), _) => (HealthStatus::Critical, reason.clone()),
            (_, Some(avg)) if avg > threshold_ms as f64 => (
                HealthStatus::Degraded,
                format!("recent average {avg:.0}ms exceeds {threshold_ms}ms"),
            ),
            (_, Some(avg)) => (HealthStatus::Healthy, format!("recent average {avg:.0}ms")),
            (_, None) => (HealthStatus::Healthy, "no messages processed".to_string()),
        };

        HealthReport {
            status,
            state: state.clone(),
            recent_average_ms,
            threshold_ms,
            detail,
        }
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_HEALTH_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::types::{ContextSnapshot, LanguageTag};
    use chrono::Utc;

    fn message(ms: u64, relevance: f64, quality: f64) -> ConversationMessage {
        ConversationMessage {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: "s".into(),
            speaker_id: "a".into(),
            speaker_language: LanguageTag::parse("en").unwrap(),
            original_text: "hi".into(),
            translations: vec![],
            failed_targets: vec![],
            timestamp: Utc::now(),
            recognition_confidence: 1.0,
            processing_time_ms: ms,
            context: ContextSnapshot {
                context_id: "c".into(),
                topic: None,
                relevance_score: relevance,
                history_len: 0,
                taken_at: Utc::now(),
            },
            emotion: None,
            tone: None,
            quality_score: quality,
        }
    }

    #[test]
    fn running_average_min_and_max() {
        let mut agg = MetricsAggregator::default();
        for ms in [200, 400, 600] {
            agg.update(&message(ms, 1.0, 1.0));
        }
        let m = agg.metrics();
        assert_eq!(m.message_count, 3);
        assert!((m.average_processing_ms - 400.0).abs() < 1e-9);
        assert_eq!(m.fastest_processing_ms, Some(200));
        assert_eq!(m.slowest_processing_ms, Some(600));
    }

    #[test]
    fn relevance_and_quality_are_averaged() {
        let mut agg = MetricsAggregator::default();
        agg.update(&message(10, 1.0, 0.5));
        agg.update(&message(10, 0.5, 1.0));
        assert!((agg.metrics().average_context_relevance - 0.75).abs() < 1e-9);
        assert!((agg.metrics().average_quality - 0.75).abs() < 1e-9);
    }

    #[test]
    fn health_degrades_above_threshold() {
        let mut agg = MetricsAggregator::new(2);
        agg.update(&message(100, 1.0, 1.0));
        assert_eq!(agg.health(&SessionState::Active, 500).status, HealthStatus::Healthy);

        agg.update(&message(3_000, 1.0, 1.0));
        agg.update(&message(3_000, 1.0, 1.0));
        let report = agg.health(&SessionState::Active, 500);
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.recent_average_ms, Some(3_000.0));
    }

    #[test]
    fn error_state_is_critical() {
        let agg = MetricsAggregator::default();
        let report = agg.health(&SessionState::Error("translator down".into()), 500);
        assert_eq!(report.status, HealthStatus::Critical);
        assert_eq!(report.detail, "translator down");
    }

    #[test]
    fn flow_score_is_stored_and_clamped() {
        let mut agg = MetricsAggregator::default();
        assert_eq!(agg.metrics().flow_score, None);
        agg.set_flow_score(0.6);
        assert_eq!(agg.metrics().flow_score, Some(0.6));
        agg.set_flow_score(1.4);
        assert_eq!(agg.metrics().flow_score, Some(1.0));
    }
}
