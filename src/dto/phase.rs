use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::RoundPhase;

/// Room phase as exposed to clients (WebSocket and REST).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisiblePhase {
    /// Players are gathering; teams not formed yet.
    Waiting,
    /// The subject-picker team is choosing a subject.
    PickSubject,
    /// The type-picker team is choosing a question type.
    PickType,
    /// A question is live.
    Question,
    /// Answers and scores are displayed.
    Results,
}

impl From<RoundPhase> for VisiblePhase {
    fn from(value: RoundPhase) -> Self {
        match value {
            RoundPhase::Waiting => VisiblePhase::Waiting,
            RoundPhase::PickSubject => VisiblePhase::PickSubject,
            RoundPhase::PickType => VisiblePhase::PickType,
            RoundPhase::Question => VisiblePhase::Question,
            RoundPhase::Results => VisiblePhase::Results,
        }
    }
}
