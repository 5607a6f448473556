//! Conversation orchestration core.
//!
//! Coordinates real-time multi-party translated conversations: every
//! utterance from one participant is delivered to every other participant
//! in their own language.
//!
//! ## Architecture
//!
//! ```text
//!  ConversationHub ── room id ──▸ SessionCoordinator (one per room)
//!                                   │  state machine, roster, log
//!                                   │
//!          ┌────────────────────────┼──────────────────────────┐
//!          ▾                        ▾                          ▾
//!     Recognizer            FanOutTranslator             ContextTracker
//!                         (bounded parallel calls)      MetricsAggregator
//!                                   │
//!                                   ▾
//!                          MessageAssembler ─▸ ConversationMessage
//! ```
//!
//! ## Design
//! - Collaborators (recognition, translation, synthesis, annotation,
//!   context analysis) are traits; stand-ins live in [`stubs`]
//! - One translation failure never blocks the other targets
//! - Log order equals submission order
//! - Lifecycle changes are broadcast as [`ConversationEvent`]s

pub mod assembler;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod fanout;
pub mod hub;
pub mod metrics;
pub mod participants;
pub mod state;
pub mod stubs;
pub mod summary;
pub mod traits;
pub mod types;

#[allow(unused_imports)]
pub use coordinator::SessionCoordinator;
#[allow(unused_imports)]
pub use error::{ConversationError, TranslationFailure};
#[allow(unused_imports)]
pub use events::ConversationEvent;
#[allow(unused_imports)]
pub use hub::ConversationHub;
#[allow(unused_imports)]
pub use metrics::{HealthReport, HealthStatus, SessionMetrics};
#[allow(unused_imports)]
pub use state::SessionState;
#[allow(unused_imports)]
pub use summary::ConversationSummary;
#[allow(unused_imports)]
pub use traits::{Annotator, Collaborators, ContextAnalyzer, Recognizer, Synthesizer, Translator};
#[allow(unused_imports)]
pub use types::{
    ConversationMessage, ConversationParticipant, ConversationSession, ConversationTranslation,
    InputPayload, LanguageTag, SessionSettings,
};
