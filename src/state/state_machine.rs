use thiserror::Error;
use uuid::Uuid;

/// Phases a room cycles through once a game has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundPhase {
    /// Room created, teams not yet formed. Never re-entered.
    Waiting,
    /// The subject-picker team chooses a subject.
    PickSubject,
    /// The other team chooses a question type.
    PickType,
    /// A question is live and teams are voting.
    Question,
    /// Answers and scores are on display.
    Results,
}

/// Events that move a room between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEvent {
    /// Host starts the game from the waiting room.
    StartGame,
    /// A subject was chosen.
    SubjectSelected,
    /// A question came back from the question store.
    QuestionLoaded,
    /// Locked answers are scored and revealed.
    ResultsRevealed,
    /// The round is over; rotation advances.
    RoundEnded,
}

/// Error returned when an event is not meaningful in the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// Phase the machine was in.
    pub from: RoundPhase,
    /// Rejected event.
    pub event: RoundEvent,
}

/// Errors raised when planning a deferred transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// Another deferred transition is still outstanding.
    AlreadyPending,
    /// The event is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors raised when applying a deferred transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// Nothing is pending, typically because a direct transition superseded the plan.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Pending plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// Phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when the plan was created.
        expected: RoundPhase,
        /// Current phase.
        actual: RoundPhase,
    },
    /// Version changed since the plan was created.
    VersionMismatch {
        /// Version the plan expected to produce.
        expected: usize,
        /// Version the machine would produce now.
        actual: usize,
    },
}

/// Errors raised when aborting a deferred transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// Nothing is pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Pending plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned transition.
pub type PlanId = Uuid;

/// A validated transition that waits on outside work (a question lookup) before it is applied.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the plan was made from.
    pub from: RoundPhase,
    /// Phase the plan leads to.
    pub to: RoundPhase,
    /// Event that triggered the plan.
    pub event: RoundEvent,
    /// Version after applying the plan.
    pub version_next: usize,
}

/// Round phase machine for one room.
///
/// Short transitions are fired directly with [`RoundStateMachine::fire`]. The question load,
/// which awaits the question store with the room unlocked, goes through
/// [`plan`](RoundStateMachine::plan) / [`apply`](RoundStateMachine::apply) so that a direct
/// transition fired in the meantime invalidates the outstanding plan.
#[derive(Debug, Clone)]
pub struct RoundStateMachine {
    phase: RoundPhase,
    version: usize,
    pending: Option<Plan>,
}

impl Default for RoundStateMachine {
    fn default() -> Self {
        Self {
            phase: RoundPhase::Waiting,
            version: 0,
            pending: None,
        }
    }
}

impl RoundStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Incremented on every applied transition.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Whether a question load is in flight.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Validate an event without changing anything.
    pub fn check(&self, event: RoundEvent) -> Result<RoundPhase, InvalidTransition> {
        self.compute_transition(event)
    }

    /// Apply an event immediately. Any outstanding plan is discarded.
    pub fn fire(&mut self, event: RoundEvent) -> Result<RoundPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        self.pending = None;
        Ok(next)
    }

    /// Reserve a transition that will be applied once outside work completes.
    pub fn plan(&mut self, event: RoundEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = self
            .compute_transition(event)
            .map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to: next,
            event,
            version_next: self.version + 1,
        };

        self.pending = Some(plan.clone());
        Ok(plan)
    }

    /// Apply a previously planned transition.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<RoundPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        self.phase = plan.to;
        self.version = plan.version_next;
        Ok(self.phase)
    }

    /// Drop a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    fn compute_transition(&self, event: RoundEvent) -> Result<RoundPhase, InvalidTransition> {
        use RoundEvent as E;
        use RoundPhase as P;

        let next = match (self.phase, event) {
            (P::Waiting, E::StartGame) => P::PickSubject,
            (P::PickSubject, E::SubjectSelected) => P::PickType,
            (P::PickSubject | P::PickType | P::Question, E::QuestionLoaded) => P::Question,
            (P::Question, E::ResultsRevealed) => P::Results,
            (P::PickSubject | P::PickType | P::Question | P::Results, E::RoundEnded) => {
                P::PickSubject
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
