//! Room aggregate: membership, teams, phase, picker rotation, votes and scores.
//!
//! A [`Room`] is only ever mutated through `&mut self` while its owner holds the room's
//! mutex (see [`crate::state::room_store`]), which makes every method below a single
//! serialized step for that room.

use std::{collections::HashMap, fmt};

use indexmap::{IndexMap, IndexSet};
use serde::{Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use crate::state::{
    game::{Question, Team},
    rotation::PickerRotation,
    scoring::{RoundResults, score_round},
    state_machine::{
        ApplyError, InvalidTransition, PlanError, PlanId, RoundEvent, RoundPhase,
        RoundStateMachine,
    },
    voting::{Ballots, LockedAnswer, Tally, VoteOutcome},
};

/// Longest accepted room code.
pub const MAX_ROOM_CODE_LEN: usize = 32;
/// Smallest number of teams a game can start with.
pub const MIN_TEAMS: usize = 2;

/// Case-insensitive room identifier, stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomCode(String);

impl RoomCode {
    /// Normalise a client-supplied code.
    pub fn parse(raw: &str) -> Result<Self, RoomError> {
        let trimmed = raw.trim();
        let invalid = |reason| RoomError::InvalidCode {
            code: raw.to_owned(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(invalid("room code cannot be empty"));
        }
        if trimmed.chars().count() > MAX_ROOM_CODE_LEN {
            return Err(invalid("room code is too long"));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid(
                "room code may only contain letters, digits, '-' and '_'",
            ));
        }

        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RoomCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Rule violations raised by the room aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("invalid room code `{code}`: {reason}")]
    InvalidCode { code: String, reason: &'static str },
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// An action that is not a phase event arrived in the wrong phase.
    #[error("{action} is not accepted while in {phase:?}")]
    WrongPhase {
        action: &'static str,
        phase: RoundPhase,
    },
    #[error("a game needs at least two teams (got {count})")]
    NotEnoughTeams { count: usize },
    #[error("team name `{0}` is used more than once")]
    DuplicateTeamName(String),
    #[error("unknown team `{0}`")]
    UnknownTeam(Uuid),
    #[error("connection `{0}` is not in this room")]
    NotMember(Uuid),
    #[error("option `{0}` is not part of the current question")]
    UnknownOption(String),
    #[error("a question is already being loaded")]
    LoadPending,
    #[error("question load was superseded by another transition")]
    StaleLoad,
}

impl From<PlanError> for RoomError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => RoomError::LoadPending,
            PlanError::InvalidTransition(invalid) => RoomError::InvalidTransition(invalid),
        }
    }
}

impl From<ApplyError> for RoomError {
    fn from(_: ApplyError) -> Self {
        RoomError::StaleLoad
    }
}

/// Team requested at game start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamSetup {
    pub name: String,
    pub members: Vec<Uuid>,
}

/// Effects of a connection leaving a room.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Departure {
    /// The connection was in the room.
    pub was_member: bool,
    /// Team roster the connection was removed from.
    pub left_team: Option<Uuid>,
    /// Team that locked because its roster shrank.
    pub relocked: Option<(Uuid, LockedAnswer)>,
    /// Nobody is left; the room must be torn down.
    pub now_empty: bool,
}

/// Per-room state.
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    connections: IndexSet<Uuid>,
    teams: IndexMap<Uuid, Team>,
    machine: RoundStateMachine,
    rotation: PickerRotation,
    selected_subject_id: Option<String>,
    selected_type_id: Option<String>,
    current_question: Option<Question>,
    ballots: Ballots,
    last_results: Option<RoundResults>,
    closed: bool,
}

impl Room {
    pub fn new(code: RoomCode) -> Self {
        Self {
            code,
            connections: IndexSet::new(),
            teams: IndexMap::new(),
            machine: RoundStateMachine::new(),
            rotation: PickerRotation::start(),
            selected_subject_id: None,
            selected_type_id: None,
            current_question: None,
            ballots: Ballots::new(),
            last_results: None,
            closed: false,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn phase(&self) -> RoundPhase {
        self.machine.phase()
    }

    pub fn version(&self) -> usize {
        self.machine.version()
    }

    /// Set once the room was torn down; a closed room must not be joined again.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Connection IDs in join order.
    pub fn connections(&self) -> impl Iterator<Item = &Uuid> {
        self.connections.iter()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn has_connection(&self, connection_id: &Uuid) -> bool {
        self.connections.contains(connection_id)
    }

    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    pub fn team(&self, team_id: &Uuid) -> Option<&Team> {
        self.teams.get(team_id)
    }

    /// Team whose roster holds `connection_id`.
    pub fn team_of(&self, connection_id: &Uuid) -> Option<&Team> {
        self.teams.values().find(|team| team.has_member(connection_id))
    }

    pub fn rotation(&self) -> PickerRotation {
        self.rotation
    }

    /// Team choosing the subject this round.
    pub fn subject_picker_team_id(&self) -> Option<Uuid> {
        self.picker_at(self.rotation.subject_picker_index(self.teams.len()))
    }

    /// Team choosing the question type this round.
    pub fn type_picker_team_id(&self) -> Option<Uuid> {
        self.picker_at(self.rotation.type_picker_index(self.teams.len()))
    }

    fn picker_at(&self, index: usize) -> Option<Uuid> {
        if self.phase() == RoundPhase::Waiting {
            return None;
        }
        self.teams.get_index(index).map(|(team_id, _)| *team_id)
    }

    pub fn selected_subject_id(&self) -> Option<&str> {
        self.selected_subject_id.as_deref()
    }

    pub fn selected_type_id(&self) -> Option<&str> {
        self.selected_type_id.as_deref()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    pub fn locked_answers(&self) -> HashMap<Uuid, LockedAnswer> {
        self.ballots.locked_answers()
    }

    pub fn tally(&self, team_id: &Uuid) -> Option<Tally> {
        self.ballots.ballot(team_id).map(|ballot| ballot.tally())
    }

    /// Results of the last revealed question, kept until the next question loads.
    pub fn last_results(&self) -> Option<&RoundResults> {
        self.last_results.as_ref()
    }

    /// Returns `false` when the connection was already present.
    pub fn add_connection(&mut self, connection_id: Uuid) -> bool {
        self.connections.insert(connection_id)
    }

    /// Remove a connection and drop it from its team roster.
    ///
    /// Votes it already cast stay counted. Its team's ballot is re-checked against the
    /// smaller roster.
    pub fn remove_connection(&mut self, connection_id: &Uuid, now_ms: u64) -> Departure {
        let was_member = self.connections.shift_remove(connection_id);
        let mut departure = Departure {
            was_member,
            now_empty: self.connections.is_empty(),
            ..Departure::default()
        };
        if !was_member {
            return departure;
        }

        departure.left_team = self
            .teams
            .values_mut()
            .find(|team| team.has_member(connection_id))
            .map(|team| {
                team.remove_member(connection_id);
                team.id
            });

        if let Some(team_id) = departure.left_team {
            departure.relocked = self.reevaluate_team(team_id, now_ms);
        }
        departure
    }

    fn reevaluate_team(&mut self, team_id: Uuid, now_ms: u64) -> Option<(Uuid, LockedAnswer)> {
        if self.phase() != RoundPhase::Question {
            return None;
        }
        let roster_size = self.teams.get(&team_id)?.members.len();
        self.ballots
            .reevaluate(team_id, roster_size, now_ms)
            .map(|lock| (team_id, lock))
    }

    /// Form teams and enter the first pick.
    ///
    /// Members not present in the room are dropped; a connection listed in several teams
    /// stays in the first one.
    pub fn start_game(&mut self, setups: Vec<TeamSetup>) -> Result<RoundPhase, RoomError> {
        self.machine.check(RoundEvent::StartGame)?;
        if setups.len() < MIN_TEAMS {
            return Err(RoomError::NotEnoughTeams {
                count: setups.len(),
            });
        }

        let mut seen_names = IndexSet::new();
        let mut assigned = IndexSet::new();
        let mut teams = IndexMap::new();
        for setup in setups {
            let name = setup.name.trim().to_owned();
            if !seen_names.insert(name.to_lowercase()) {
                return Err(RoomError::DuplicateTeamName(name));
            }
            let mut team = Team::new(name);
            team.members = setup
                .members
                .into_iter()
                .filter(|member| self.connections.contains(member) && assigned.insert(*member))
                .collect();
            teams.insert(team.id, team);
        }

        self.teams = teams;
        self.rotation = PickerRotation::start();
        Ok(self.machine.fire(RoundEvent::StartGame)?)
    }

    /// Move a connection into `team_id`, leaving any other roster.
    ///
    /// Rosters are frozen while a question is live: a vote already cast stays on the ballot
    /// of the team it was cast for.
    pub fn join_team(&mut self, connection_id: Uuid, team_id: Uuid) -> Result<(), RoomError> {
        if !self.connections.contains(&connection_id) {
            return Err(RoomError::NotMember(connection_id));
        }
        let phase = self.phase();
        if phase == RoundPhase::Question {
            return Err(RoomError::WrongPhase {
                action: "join-team",
                phase,
            });
        }
        if !self.teams.contains_key(&team_id) {
            return Err(RoomError::UnknownTeam(team_id));
        }

        let previous = self.team_of(&connection_id).map(|team| team.id);
        if previous == Some(team_id) {
            return Ok(());
        }

        if let Some(team) = previous.and_then(|id| self.teams.get_mut(&id)) {
            team.remove_member(&connection_id);
        }
        if let Some(team) = self.teams.get_mut(&team_id) {
            team.members.push(connection_id);
        }
        Ok(())
    }

    /// Record the subject and hand over to the type pick.
    pub fn select_subject(&mut self, subject_id: String) -> Result<RoundPhase, RoomError> {
        let next = self.machine.fire(RoundEvent::SubjectSelected)?;
        self.selected_subject_id = Some(subject_id);
        Ok(next)
    }

    /// Record the question type. Accepted in any phase.
    pub fn select_type(&mut self, type_id: String) {
        self.selected_type_id = Some(type_id);
    }

    /// Reserve the transition into [`RoundPhase::Question`] before the room is unlocked
    /// for the question store lookup.
    pub fn plan_question_load(&mut self) -> Result<PlanId, RoomError> {
        Ok(self.machine.plan(RoundEvent::QuestionLoaded)?.id)
    }

    /// Install a fetched question. Clears every ballot and the previous results.
    pub fn apply_question(
        &mut self,
        plan_id: PlanId,
        question: Question,
    ) -> Result<RoundPhase, RoomError> {
        let next = self.machine.apply(plan_id)?;
        self.selected_subject_id = Some(question.subject_id.clone());
        self.selected_type_id = Some(question.type_id.clone());
        self.current_question = Some(question);
        self.ballots = Ballots::new();
        self.last_results = None;
        Ok(next)
    }

    /// Release a planned load that produced no question.
    pub fn abort_question_load(&mut self, plan_id: PlanId) -> Result<(), RoomError> {
        self.machine
            .abort(plan_id)
            .map_err(|_| RoomError::StaleLoad)
    }

    /// Record a vote for the live question.
    pub fn cast_vote(
        &mut self,
        team_id: Uuid,
        member_id: Uuid,
        option_id: &str,
        now_ms: u64,
    ) -> Result<VoteOutcome, RoomError> {
        let phase = self.phase();
        let question = self
            .current_question
            .as_ref()
            .filter(|_| phase == RoundPhase::Question)
            .ok_or(RoomError::WrongPhase {
                action: "vote",
                phase,
            })?;
        if !question.has_option(option_id) {
            return Err(RoomError::UnknownOption(option_id.to_owned()));
        }
        let roster_size = self
            .teams
            .get(&team_id)
            .ok_or(RoomError::UnknownTeam(team_id))?
            .members
            .len();

        Ok(self
            .ballots
            .cast(team_id, member_id, option_id, roster_size, now_ms))
    }

    /// Score the locked answers and fold the points into team scores.
    pub fn reveal_results(&mut self, speed_bonus: u32) -> Result<&RoundResults, RoomError> {
        self.machine.check(RoundEvent::ResultsRevealed)?;
        let phase = self.phase();
        let question = self.current_question.as_ref().ok_or(RoomError::WrongPhase {
            action: "reveal-results",
            phase,
        })?;

        let results = score_round(
            self.teams.keys().copied(),
            &self.ballots.locked_answers(),
            &question.correct_option_id,
            question.points,
            speed_bonus,
        );
        for answer in &results.answers {
            if let Some(team) = self.teams.get_mut(&answer.team_id) {
                team.score = team.score.saturating_add(answer.points_awarded);
            }
        }

        self.machine.fire(RoundEvent::ResultsRevealed)?;
        let results = self.last_results.insert(results);
        Ok(&*results)
    }

    /// Clear the round and rotate the first picker.
    pub fn end_round(&mut self) -> Result<RoundPhase, RoomError> {
        let next = self.machine.fire(RoundEvent::RoundEnded)?;
        self.selected_subject_id = None;
        self.selected_type_id = None;
        self.current_question = None;
        self.ballots = Ballots::new();
        self.rotation.advance(self.teams.len());
        Ok(next)
    }
}
