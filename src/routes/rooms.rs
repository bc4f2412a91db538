use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use axum_valid::Valid;
use serde::Deserialize;
use utoipa::IntoParams;
use validator::Validate;

use crate::{
    dto::room::{RoomListResponse, RoomSnapshot},
    error::AppError,
    services::public_service,
    state::SharedState,
};

/// Paging for the room listing.
#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct ListRoomsQuery {
    /// Maximum number of rooms returned, ordered by room code.
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<usize>,
}

/// Read-only room projections.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/{code}", get(get_room))
}

/// List live rooms with their member count and phase.
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    params(ListRoomsQuery),
    responses(
        (status = 200, description = "Live rooms", body = RoomListResponse),
        (status = 400, description = "Invalid query")
    )
)]
pub async fn list_rooms(
    State(state): State<SharedState>,
    Valid(Query(query)): Valid<Query<ListRoomsQuery>>,
) -> Json<RoomListResponse> {
    Json(public_service::list_rooms(&state, query.limit).await)
}

/// Full snapshot of one room, as sent to a joining client.
#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code, case-insensitive")),
    responses(
        (status = 200, description = "Room snapshot", body = RoomSnapshot),
        (status = 400, description = "Malformed room code"),
        (status = 404, description = "No live room with this code")
    )
)]
pub async fn get_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(public_service::room_snapshot(&state, &code).await?))
}
