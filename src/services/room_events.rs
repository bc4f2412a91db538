//! Broadcast gateway: turns room mutations into outbound WebSocket messages.
//!
//! Callers invoke these helpers while they still hold the room lock, so every connection in
//! a room sees that room's notifications in the order the mutations happened.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dto::{
        room::{LockView, ResultsView, RoomSnapshot, TallyView, member_views, team_views},
        ws::ServerMessage,
    },
    error::ServiceError,
    state::{
        SharedState,
        room::Room,
        scoring::RoundResults,
        voting::{LockedAnswer, Tally},
    },
};

/// Queue `message` for a single connection. Returns `false` when it is gone.
pub fn send_to(state: &SharedState, connection_id: &Uuid, message: ServerMessage) -> bool {
    let Some(tx) = state.connections().sender(connection_id) else {
        debug!(connection_id = %connection_id, "dropping message for unknown connection");
        return false;
    };
    if tx.send(message).is_err() {
        debug!(connection_id = %connection_id, "dropping message for closed connection");
        return false;
    }
    true
}

/// Report a failed request to the connection that sent it.
pub fn send_error(state: &SharedState, connection_id: &Uuid, err: &ServiceError) {
    send_to(
        state,
        connection_id,
        ServerMessage::Error {
            code: err.code(),
            message: err.to_string(),
        },
    );
}

fn send_room(state: &SharedState, room: &Room, message: ServerMessage) {
    let unreachable = room
        .connections()
        .filter(|connection_id| !send_to(state, connection_id, message.clone()))
        .count();
    if unreachable > 0 {
        warn!(room = %room.code(), unreachable, "room members unreachable; waiting for their disconnect");
    }
}

/// Full room state for a connection that just joined.
pub fn send_snapshot(state: &SharedState, room: &Room, connection_id: &Uuid) {
    let snapshot = RoomSnapshot::build(room, state.connections());
    send_to(
        state,
        connection_id,
        ServerMessage::RoomSnapshot {
            snapshot: Box::new(snapshot),
        },
    );
}

pub fn broadcast_membership(state: &SharedState, room: &Room) {
    let members = member_views(room, state.connections());
    send_room(
        state,
        room,
        ServerMessage::MembershipChanged {
            room_code: room.code().to_string(),
            members,
        },
    );
}

pub fn broadcast_teams(state: &SharedState, room: &Room) {
    send_room(
        state,
        room,
        ServerMessage::TeamsChanged {
            room_code: room.code().to_string(),
            teams: team_views(room),
        },
    );
}

pub fn broadcast_phase(state: &SharedState, room: &Room) {
    send_room(
        state,
        room,
        ServerMessage::PhaseChanged {
            room_code: room.code().to_string(),
            phase: room.phase().into(),
            version: room.version(),
            subject_picker_team_id: room.subject_picker_team_id(),
            type_picker_team_id: room.type_picker_team_id(),
        },
    );
}

pub fn broadcast_subject_selected(state: &SharedState, room: &Room, subject_id: &str, by: Uuid) {
    send_room(
        state,
        room,
        ServerMessage::SubjectSelected {
            room_code: room.code().to_string(),
            subject_id: subject_id.to_owned(),
            selected_by: by,
        },
    );
}

pub fn broadcast_type_selected(state: &SharedState, room: &Room, type_id: &str, by: Uuid) {
    send_room(
        state,
        room,
        ServerMessage::TypeSelected {
            room_code: room.code().to_string(),
            type_id: type_id.to_owned(),
            selected_by: by,
        },
    );
}

/// Publish the live question without its correct answer.
pub fn broadcast_question_loaded(state: &SharedState, room: &Room) {
    let Some(question) = room.current_question() else {
        warn!(room = %room.code(), "question loaded notification without a question");
        return;
    };
    send_room(
        state,
        room,
        ServerMessage::QuestionLoaded {
            room_code: room.code().to_string(),
            question: question.into(),
        },
    );
}

pub fn broadcast_tally(state: &SharedState, room: &Room, team_id: Uuid, tally: Tally) {
    send_room(
        state,
        room,
        ServerMessage::VoteTally {
            room_code: room.code().to_string(),
            tally: TallyView::new(team_id, tally),
        },
    );
}

pub fn broadcast_lock(state: &SharedState, room: &Room, team_id: Uuid, lock: &LockedAnswer) {
    send_room(
        state,
        room,
        ServerMessage::TeamLocked {
            room_code: room.code().to_string(),
            lock: LockView::new(team_id, lock),
        },
    );
}

pub fn broadcast_results(state: &SharedState, room: &Room, results: &RoundResults) {
    send_room(
        state,
        room,
        ServerMessage::ResultsRevealed {
            room_code: room.code().to_string(),
            results: ResultsView::from(results),
            teams: team_views(room),
        },
    );
}

pub fn broadcast_round_ended(state: &SharedState, room: &Room) {
    send_room(
        state,
        room,
        ServerMessage::RoundEnded {
            room_code: room.code().to_string(),
            next_subject_picker_team_id: room.subject_picker_team_id(),
            next_type_picker_team_id: room.type_picker_team_id(),
            teams: team_views(room),
        },
    );
}
