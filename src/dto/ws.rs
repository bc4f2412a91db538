use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::Difficulty,
    dto::{
        phase::VisiblePhase,
        room::{LockView, MemberView, QuestionView, ResultsView, RoomSnapshot, TallyView, TeamView},
        validation::{validate_identifier, validate_name, validate_room_code},
    },
    error::ErrorCode,
};

/// Team requested by the host when starting a game.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct TeamRequest {
    pub name: String,
    /// Connection IDs to place on the team. Unknown IDs are ignored.
    #[serde(default)]
    pub members: Vec<Uuid>,
}

/// Messages accepted from room WebSocket clients.
///
/// Every message except `join` is routed by `room_code` to a room the sender already joined.
#[skip_serializing_none]
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Join (or create) a room. Leaves any other room first.
    Join {
        room_code: String,
        display_name: Option<String>,
        #[serde(default)]
        is_host: bool,
    },
    Leave {
        room_code: String,
    },
    /// Host only. Without teams, the configured default teams are created and players
    /// are spread across them.
    StartGame {
        room_code: String,
        #[serde(default)]
        teams: Vec<TeamRequest>,
    },
    JoinTeam {
        room_code: String,
        team_id: Uuid,
    },
    SelectSubject {
        room_code: String,
        subject_id: String,
    },
    SelectType {
        room_code: String,
        type_id: String,
    },
    LoadQuestion {
        room_code: String,
        subject_id: String,
        type_id: String,
        difficulty: Option<Difficulty>,
    },
    /// Cast or change a vote. `member_id` defaults to the sender's connection ID.
    Vote {
        room_code: String,
        team_id: Uuid,
        member_id: Option<Uuid>,
        option_id: String,
    },
    RevealResults {
        room_code: String,
    },
    RoundEnded {
        room_code: String,
    },
}

/// Failure to turn a text frame into a [`ClientMessage`].
#[derive(Debug, Error)]
pub enum InboundMessageError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("invalid message: {0}")]
    Invalid(#[from] ValidationErrors),
}

impl ClientMessage {
    /// Parse and validate a text frame.
    pub fn from_json_str(raw: &str) -> Result<Self, InboundMessageError> {
        let message: Self = serde_json::from_str(raw)?;
        message.validate()?;
        Ok(message)
    }

    pub fn room_code(&self) -> &str {
        match self {
            Self::Join { room_code, .. }
            | Self::Leave { room_code }
            | Self::StartGame { room_code, .. }
            | Self::JoinTeam { room_code, .. }
            | Self::SelectSubject { room_code, .. }
            | Self::SelectType { room_code, .. }
            | Self::LoadQuestion { room_code, .. }
            | Self::Vote { room_code, .. }
            | Self::RevealResults { room_code }
            | Self::RoundEnded { room_code } => room_code,
        }
    }

    /// Wire name of the message, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::StartGame { .. } => "start-game",
            Self::JoinTeam { .. } => "join-team",
            Self::SelectSubject { .. } => "select-subject",
            Self::SelectType { .. } => "select-type",
            Self::LoadQuestion { .. } => "load-question",
            Self::Vote { .. } => "vote",
            Self::RevealResults { .. } => "reveal-results",
            Self::RoundEnded { .. } => "round-ended",
        }
    }
}

impl Validate for ClientMessage {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Err(e) = validate_room_code(self.room_code()) {
            errors.add("room_code", e);
        }

        match self {
            Self::Join {
                display_name: Some(name),
                ..
            } => {
                if let Err(e) = validate_name(name) {
                    errors.add("display_name", e);
                }
            }
            Self::StartGame { teams, .. } => {
                for team in teams {
                    if let Err(e) = validate_name(&team.name) {
                        errors.add("teams", e);
                    }
                }
            }
            Self::SelectSubject { subject_id, .. } => {
                if let Err(e) = validate_identifier(subject_id) {
                    errors.add("subject_id", e);
                }
            }
            Self::SelectType { type_id, .. } => {
                if let Err(e) = validate_identifier(type_id) {
                    errors.add("type_id", e);
                }
            }
            Self::LoadQuestion {
                subject_id,
                type_id,
                ..
            } => {
                if let Err(e) = validate_identifier(subject_id) {
                    errors.add("subject_id", e);
                }
                if let Err(e) = validate_identifier(type_id) {
                    errors.add("type_id", e);
                }
            }
            Self::Vote { option_id, .. } => {
                if let Err(e) = validate_identifier(option_id) {
                    errors.add("option_id", e);
                }
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Notifications pushed to room WebSocket clients.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every socket.
    Welcome { connection_id: Uuid },
    /// Full room state, sent to a connection right after it joins.
    RoomSnapshot { snapshot: Box<RoomSnapshot> },
    MembershipChanged {
        room_code: String,
        members: Vec<MemberView>,
    },
    TeamsChanged {
        room_code: String,
        teams: Vec<TeamView>,
    },
    PhaseChanged {
        room_code: String,
        phase: VisiblePhase,
        version: usize,
        subject_picker_team_id: Option<Uuid>,
        type_picker_team_id: Option<Uuid>,
    },
    SubjectSelected {
        room_code: String,
        subject_id: String,
        selected_by: Uuid,
    },
    TypeSelected {
        room_code: String,
        type_id: String,
        selected_by: Uuid,
    },
    QuestionLoaded {
        room_code: String,
        question: QuestionView,
    },
    VoteTally {
        room_code: String,
        tally: TallyView,
    },
    TeamLocked {
        room_code: String,
        lock: LockView,
    },
    ResultsRevealed {
        room_code: String,
        results: ResultsView,
        teams: Vec<TeamView>,
    },
    RoundEnded {
        room_code: String,
        next_subject_picker_team_id: Option<Uuid>,
        next_type_picker_team_id: Option<Uuid>,
        teams: Vec<TeamView>,
    },
    /// Sent only to the connection whose message failed.
    Error { code: ErrorCode, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kebab_case_messages() {
        let raw = r#"{"type":"load-question","room_code":"abc","subject_id":"history","type_id":"mcq","difficulty":"hard"}"#;
        match ClientMessage::from_json_str(raw).unwrap() {
            ClientMessage::LoadQuestion {
                difficulty,
                subject_id,
                ..
            } => {
                assert_eq!(difficulty, Some(Difficulty::Hard));
                assert_eq!(subject_id, "history");
            }
            other => panic!("unexpected message {other:?}"),
        }

        let join = ClientMessage::from_json_str(r#"{"type":"join","room_code":"abc"}"#).unwrap();
        assert_eq!(join.kind(), "join");
        assert!(matches!(join, ClientMessage::Join { is_host: false, display_name: None, .. }));
    }

    #[test]
    fn rejects_invalid_payloads() {
        assert!(matches!(
            ClientMessage::from_json_str(r#"{"type":"join","room_code":"has space"}"#),
            Err(InboundMessageError::Invalid(_))
        ));
        assert!(matches!(
            ClientMessage::from_json_str(r#"{"type":"dance","room_code":"abc"}"#),
            Err(InboundMessageError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::from_json_str(
                r#"{"type":"vote","room_code":"abc","team_id":"not-a-uuid","option_id":"a"}"#
            ),
            Err(InboundMessageError::Malformed(_))
        ));
    }

    #[test]
    fn server_messages_are_tagged_and_skip_empty_fields() {
        let message = ServerMessage::PhaseChanged {
            room_code: "ABC".into(),
            phase: VisiblePhase::PickSubject,
            version: 1,
            subject_picker_team_id: None,
            type_picker_team_id: None,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "phase_changed");
        assert_eq!(value["phase"], "pick_subject");
        assert!(value.get("subject_picker_team_id").is_none());
    }
}
