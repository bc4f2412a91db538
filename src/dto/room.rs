use std::time::SystemTime;

use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::Difficulty,
    dto::{format_system_time, phase::VisiblePhase},
    state::{
        connections::ConnectionRegistry,
        game::{Question, Team},
        room::Room,
        scoring::{RoundResults, TeamAnswer},
        voting::{LockedAnswer, Tally},
    },
};

/// Connection joined to a room.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MemberView {
    pub connection_id: Uuid,
    pub display_name: Option<String>,
    pub is_host: bool,
    /// Team roster the member is on.
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamView {
    pub id: Uuid,
    pub name: String,
    pub members: Vec<Uuid>,
    pub score: u32,
}

impl From<&Team> for TeamView {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id,
            name: team.name.clone(),
            members: team.members.clone(),
            score: team.score,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OptionView {
    pub id: String,
    pub label: String,
}

/// Live question as shown to players. The correct option is withheld until results.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionView {
    pub id: String,
    pub subject_id: String,
    pub type_id: String,
    pub difficulty: Option<Difficulty>,
    pub prompt: String,
    pub options: Vec<OptionView>,
    pub points: u32,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.clone(),
            subject_id: question.subject_id.clone(),
            type_id: question.type_id.clone(),
            difficulty: question.difficulty,
            prompt: question.prompt.clone(),
            options: question
                .options
                .iter()
                .map(|option| OptionView {
                    id: option.id.clone(),
                    label: option.label.clone(),
                })
                .collect(),
            points: question.points,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OptionCountView {
    pub option_id: String,
    pub votes: usize,
}

/// Current vote distribution of one team.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TallyView {
    pub team_id: Uuid,
    pub counts: Vec<OptionCountView>,
    pub voters: usize,
    /// Option ahead, ties going to the option voted for first.
    pub leading_option_id: Option<String>,
}

impl TallyView {
    pub fn new(team_id: Uuid, tally: Tally) -> Self {
        Self {
            team_id,
            counts: tally
                .counts
                .into_iter()
                .map(|count| OptionCountView {
                    option_id: count.option_id,
                    votes: count.votes,
                })
                .collect(),
            voters: tally.voters,
            leading_option_id: tally.leader,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LockView {
    pub team_id: Uuid,
    pub option_id: String,
    /// Milliseconds since the Unix epoch.
    pub locked_at_ms: u64,
}

impl LockView {
    pub fn new(team_id: Uuid, lock: &LockedAnswer) -> Self {
        Self {
            team_id,
            option_id: lock.option_id.clone(),
            locked_at_ms: lock.locked_at_ms,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamAnswerView {
    pub team_id: Uuid,
    pub option_id: Option<String>,
    pub locked_at_ms: Option<u64>,
    pub correct: bool,
    pub points_awarded: u32,
}

impl From<&TeamAnswer> for TeamAnswerView {
    fn from(answer: &TeamAnswer) -> Self {
        Self {
            team_id: answer.team_id,
            option_id: answer.option_id.clone(),
            locked_at_ms: answer.locked_at_ms,
            correct: answer.correct,
            points_awarded: answer.points_awarded,
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResultsView {
    pub correct_option_id: String,
    pub answers: Vec<TeamAnswerView>,
    /// Team that earned the speed bonus.
    pub fastest_team_id: Option<Uuid>,
}

impl From<&RoundResults> for ResultsView {
    fn from(results: &RoundResults) -> Self {
        Self {
            correct_option_id: results.correct_option_id.clone(),
            answers: results.answers.iter().map(Into::into).collect(),
            fastest_team_id: results.fastest_team_id,
        }
    }
}

/// Everything a client needs to render a room from scratch.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSnapshot {
    pub room_code: String,
    pub phase: VisiblePhase,
    /// Incremented on every phase transition.
    pub version: usize,
    pub members: Vec<MemberView>,
    pub teams: Vec<TeamView>,
    pub first_picker_index: usize,
    pub subject_picker_team_id: Option<Uuid>,
    pub type_picker_team_id: Option<Uuid>,
    pub selected_subject_id: Option<String>,
    pub selected_type_id: Option<String>,
    pub question: Option<QuestionView>,
    pub tallies: Vec<TallyView>,
    pub locks: Vec<LockView>,
    pub last_results: Option<ResultsView>,
    /// RFC 3339 time the snapshot was taken.
    pub generated_at: String,
}

impl RoomSnapshot {
    pub fn build(room: &Room, registry: &ConnectionRegistry) -> Self {
        let locked = room.locked_answers();
        Self {
            room_code: room.code().to_string(),
            phase: room.phase().into(),
            version: room.version(),
            members: member_views(room, registry),
            teams: team_views(room),
            first_picker_index: room.rotation().first_picker_index(),
            subject_picker_team_id: room.subject_picker_team_id(),
            type_picker_team_id: room.type_picker_team_id(),
            selected_subject_id: room.selected_subject_id().map(str::to_owned),
            selected_type_id: room.selected_type_id().map(str::to_owned),
            question: room.current_question().map(Into::into),
            tallies: room
                .teams()
                .filter_map(|team| room.tally(&team.id).map(|tally| TallyView::new(team.id, tally)))
                .collect(),
            locks: room
                .teams()
                .filter_map(|team| locked.get(&team.id).map(|lock| LockView::new(team.id, lock)))
                .collect(),
            last_results: room.last_results().map(Into::into),
            generated_at: format_system_time(SystemTime::now()),
        }
    }
}

/// Row of the room listing.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSummary {
    pub room_code: String,
    pub members: usize,
    pub phase: VisiblePhase,
}

impl From<&Room> for RoomSummary {
    fn from(room: &Room) -> Self {
        Self {
            room_code: room.code().to_string(),
            members: room.connection_count(),
            phase: room.phase().into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomSummary>,
}

/// Members of `room` in join order, enriched with registry identity.
pub fn member_views(room: &Room, registry: &ConnectionRegistry) -> Vec<MemberView> {
    room.connections()
        .map(|connection_id| {
            let identity = registry.identity(connection_id);
            MemberView {
                connection_id: *connection_id,
                display_name: identity.as_ref().and_then(|id| id.display_name.clone()),
                is_host: identity.is_some_and(|id| id.is_host),
                team_id: room.team_of(connection_id).map(|team| team.id),
            }
        })
        .collect()
}

pub fn team_views(room: &Room) -> Vec<TeamView> {
    room.teams().map(Into::into).collect()
}
