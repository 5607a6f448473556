//! Session roster.
//!
//! Participants are never removed mid-session: leaving only clears the
//! active flag so historical messages keep resolving their speaker and
//! targets. Roster order is join order and drives translation ordering.

use std::collections::BTreeSet;

use super::error::{ConversationError, Result};
use super::types::{ConversationParticipant, LanguageTag};

/// Minimum roster size. A lone host is a valid session that others join later.
pub const MIN_PARTICIPANTS: usize = 1;

#[derive(Debug, Clone, Default)]
pub struct ParticipantRegistry {
    participants: Vec<ConversationParticipant>,
}

impl ParticipantRegistry {
    /// Validate and adopt an initial roster.
    pub fn with_roster(roster: Vec<ConversationParticipant>, max_participants: usize) -> Result<Self> {
        if roster.len() < MIN_PARTICIPANTS {
            return Err(ConversationError::config("a conversation needs at least one participant"));
        }
        if roster.len() > max_participants {
            return Err(ConversationError::config(format!(
                "{} participants exceed the session limit of {max_participants}",
                roster.len()
            )));
        }

        let mut seen = BTreeSet::new();
        for p in &roster {
            if p.id.trim().is_empty() {
                return Err(ConversationError::config("participant id must not be empty"));
            }
            if !seen.insert(p.id.as_str()) {
                return Err(ConversationError::config(format!(
                    "duplicate participant id: {}",
                    p.id
                )));
            }
        }

        let participants = roster
            .into_iter()
            .map(|mut p| {
                p.is_active = true;
                p
            })
            .collect();
        Ok(Self { participants })
    }

    pub fn get(&self, id: &str) -> Option<&ConversationParticipant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Look up a participant that is still in the conversation.
    pub fn require_active(&self, id: &str) -> Result<&ConversationParticipant> {
        self.get(id)
            .filter(|p| p.is_active)
            .ok_or_else(|| ConversationError::ParticipantNotFound(id.to_string()))
    }

    pub fn active(&self) -> impl Iterator<Item = &ConversationParticipant> {
        self.participants.iter().filter(|p| p.is_active)
    }

    /// Owned copy of the active roster, for handing to other components.
    pub fn active_snapshot(&self) -> Vec<ConversationParticipant> {
        self.active().cloned().collect()
    }

    pub fn all(&self) -> &[ConversationParticipant] {
        &self.participants
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Distinct languages across the whole roster (active or not).
    pub fn languages(&self) -> BTreeSet<LanguageTag> {
        self.participants.iter().map(|p| p.language.clone()).collect()
    }

    pub fn active_language_count(&self) -> usize {
        self.active()
            .map(|p| &p.language)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Add a late joiner, or reactivate a participant who left earlier.
    ///
    /// The active headcount is re-validated against `max_participants`.
    pub fn join(
        &mut self,
        participant: ConversationParticipant,
        max_participants: usize,
    ) -> Result<&ConversationParticipant> {
        if participant.id.trim().is_empty() {
            return Err(ConversationError::config("participant id must not be empty"));
        }
        if self.active_count() >= max_participants {
            return Err(ConversationError::config(format!(
                "session is full ({max_participants} participants)"
            )));
        }

        match self.participants.iter().position(|p| p.id == participant.id) {
            Some(idx) if self.participants[idx].is_active => Err(ConversationError::config(
                format!("participant {} is already in the session", participant.id),
            )),
            Some(idx) => {
                let existing = &mut self.participants[idx];
                existing.display_name = participant.display_name;
                existing.language = participant.language;
                existing.voice_profile = participant.voice_profile;
                existing.is_active = true;
                Ok(&self.participants[idx])
            }
            None => {
                let mut participant = participant;
                participant.is_active = true;
                self.participants.push(participant);
                Ok(&self.participants[self.participants.len() - 1])
            }
        }
    }

    /// Mark a participant inactive.
    pub fn leave(&mut self, id: &str) -> Result<()> {
        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.id == id && p.is_active)
            .ok_or_else(|| ConversationError::ParticipantNotFound(id.to_string()))?;
        participant.is_active = false;
        Ok(())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: &str, lang: &str) -> ConversationParticipant {
        ConversationParticipant::new(id, id.to_uppercase(), LanguageTag::parse(lang).unwrap())
    }

    #[test]
    fn roster_must_not_be_empty() {
        let err = ParticipantRegistry::with_roster(vec![], 10).unwrap_err();
        assert!(matches!(err, ConversationError::Configuration(_)));
    }

    #[test]
    fn single_participant_roster_is_accepted() {
        let reg = ParticipantRegistry::with_roster(vec![p("a", "en")], 10).unwrap();
        assert_eq!(reg.active_count(), 1);
        assert_eq!(reg.active_language_count(), 1);
    }

    #[test]
    fn roster_respects_max_participants() {
        let roster = vec![p("a", "en"), p("b", "es"), p("c", "fr")];
        let err = ParticipantRegistry::with_roster(roster, 2).unwrap_err();
        assert!(err.to_string().contains("exceed"));
    }

    #[test]
    fn roster_rejects_duplicate_ids() {
        let roster = vec![p("a", "en"), p("a", "es")];
        let err = ParticipantRegistry::with_roster(roster, 10).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn leave_keeps_record_but_deactivates() {
        let mut reg = ParticipantRegistry::with_roster(vec![p("a", "en"), p("b", "es")], 10).unwrap();
        reg.leave("b").unwrap();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.active_count(), 1);
        assert!(reg.get("b").is_some());
        assert!(matches!(
            reg.require_active("b"),
            Err(ConversationError::ParticipantNotFound(_))
        ));
        assert!(reg.leave("b").is_err());
    }

    #[test]
    fn late_join_is_validated_against_limit() {
        let mut reg = ParticipantRegistry::with_roster(vec![p("a", "en"), p("b", "es")], 3).unwrap();
        reg.join(p("c", "fr"), 3).unwrap();
        let err = reg.join(p("d", "de"), 3).unwrap_err();
        assert!(err.to_string().contains("full"));
        assert!(reg.join(p("a", "en"), 5).is_err());
    }

    #[test]
    fn rejoin_reactivates_original_record() {
        let mut reg = ParticipantRegistry::with_roster(vec![p("a", "en"), p("b", "es")], 3).unwrap();
        reg.leave("b").unwrap();
        let rejoined = reg.join(p("b", "pt"), 3).unwrap();
        assert!(rejoined.is_active);
        assert_eq!(rejoined.language.as_str(), "pt");
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn language_counts() {
        let reg = ParticipantRegistry::with_roster(
            vec![p("a", "en"), p("b", "es"), p("c", "en")],
            10,
        )
        .unwrap();
        assert_eq!(reg.languages().len(), 2);
        assert_eq!(reg.active_language_count(), 2);
    }
}
