//! Service helpers that expose read-only projections of the live rooms.

use crate::{
    dto::room::{RoomListResponse, RoomSnapshot, RoomSummary},
    error::ServiceError,
    state::{SharedState, room::RoomCode},
};

/// Summaries of every live room, ordered by code.
pub async fn list_rooms(state: &SharedState, limit: Option<usize>) -> RoomListResponse {
    let mut rooms = Vec::new();
    for room in state.rooms().rooms() {
        let guard = room.lock().await;
        if !guard.is_closed() {
            rooms.push(RoomSummary::from(&*guard));
        }
    }
    rooms.sort_by(|a, b| a.room_code.cmp(&b.room_code));
    if let Some(limit) = limit {
        rooms.truncate(limit);
    }
    RoomListResponse { rooms }
}

/// Snapshot of one room, identical to what a joining connection receives.
pub async fn room_snapshot(state: &SharedState, raw_code: &str) -> Result<RoomSnapshot, ServiceError> {
    let code = RoomCode::parse(raw_code)?;
    let room = state
        .rooms()
        .get(&code)
        .ok_or_else(|| ServiceError::UnknownRoom(code.to_string()))?;
    let guard = room.lock().await;
    if guard.is_closed() {
        return Err(ServiceError::UnknownRoom(code.to_string()));
    }
    Ok(RoomSnapshot::build(&guard, state.connections()))
}
