//! Room operations behind every inbound WebSocket message.
//!
//! Each operation locks exactly one room for the duration of its mutation and publishes the
//! resulting notifications before releasing it. The only I/O, the question store lookup in
//! [`load_question`], runs with the room unlocked.

use std::{sync::Arc, time::Duration};

use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{Difficulty, QuestionEntity},
        question_store::QuestionStore,
    },
    dto::ws::{ClientMessage, TeamRequest},
    error::ServiceError,
    services::room_events,
    state::{
        SharedState,
        room::{Room, RoomCode, TeamSetup},
        room_store::SharedRoom,
        voting::VoteOutcome,
    },
};

/// Route a validated client message to its room operation.
pub async fn handle_client_message(
    state: &SharedState,
    connection_id: Uuid,
    message: ClientMessage,
) -> Result<(), ServiceError> {
    match message {
        ClientMessage::Join {
            room_code,
            display_name,
            is_host,
        } => join(state, connection_id, &room_code, display_name, is_host).await,
        ClientMessage::Leave { room_code } => leave(state, connection_id, &room_code).await,
        ClientMessage::StartGame { room_code, teams } => {
            start_game(state, connection_id, &room_code, teams).await
        }
        ClientMessage::JoinTeam { room_code, team_id } => {
            join_team(state, connection_id, &room_code, team_id).await
        }
        ClientMessage::SelectSubject {
            room_code,
            subject_id,
        } => select_subject(state, connection_id, &room_code, subject_id).await,
        ClientMessage::SelectType { room_code, type_id } => {
            select_type(state, connection_id, &room_code, type_id).await
        }
        ClientMessage::LoadQuestion {
            room_code,
            subject_id,
            type_id,
            difficulty,
        } => load_question(state, connection_id, &room_code, subject_id, type_id, difficulty).await,
        ClientMessage::Vote {
            room_code,
            team_id,
            member_id,
            option_id,
        } => {
            vote(
                state,
                connection_id,
                &room_code,
                team_id,
                member_id.unwrap_or(connection_id),
                option_id,
            )
            .await
        }
        ClientMessage::RevealResults { room_code } => {
            reveal_results(state, connection_id, &room_code).await
        }
        ClientMessage::RoundEnded { room_code } => {
            round_ended(state, connection_id, &room_code).await
        }
    }
}

/// Join (or create) a room, leaving the previous room if it was a different one.
pub async fn join(
    state: &SharedState,
    connection_id: Uuid,
    raw_code: &str,
    display_name: Option<String>,
    is_host: bool,
) -> Result<(), ServiceError> {
    let code = RoomCode::parse(raw_code)?;
    if state.connections().get(&connection_id).is_none() {
        return Err(ServiceError::NotFound(format!(
            "connection `{connection_id}` is not registered"
        )));
    }

    if let Some(previous) = state.connections().current_room(&connection_id)
        && previous != code
    {
        state.connections().leave_room(&connection_id, &previous);
        depart(state, connection_id, &previous).await;
    }

    loop {
        let room = state.rooms().get_or_create(&code);
        let mut guard = room.lock().await;
        // torn down between lookup and lock; the map no longer holds it
        if guard.is_closed() {
            continue;
        }

        state
            .connections()
            .join_room(&connection_id, code.clone(), display_name, is_host);
        let added = guard.add_connection(connection_id);
        info!(
            room = %code,
            connection_id = %connection_id,
            is_host,
            rejoin = !added,
            "connection joined room"
        );

        room_events::send_snapshot(state, &guard, &connection_id);
        room_events::broadcast_membership(state, &guard);
        return Ok(());
    }
}

pub async fn leave(
    state: &SharedState,
    connection_id: Uuid,
    raw_code: &str,
) -> Result<(), ServiceError> {
    let code = RoomCode::parse(raw_code)?;
    if !state.connections().leave_room(&connection_id, &code) {
        return Err(not_member(&code));
    }
    depart(state, connection_id, &code).await;
    Ok(())
}

/// Forget a closed socket and remove it from its room.
pub async fn disconnect(state: &SharedState, connection_id: Uuid) {
    if let Some(code) = state.connections().unregister(&connection_id) {
        depart(state, connection_id, &code).await;
    }
}

async fn depart(state: &SharedState, connection_id: Uuid, code: &RoomCode) {
    let Some(room) = state.rooms().get(code) else {
        return;
    };
    let mut guard = room.lock().await;
    let departure = guard.remove_connection(&connection_id, now_ms());
    if !departure.was_member {
        return;
    }
    info!(room = %code, connection_id = %connection_id, "connection left room");

    if departure.now_empty {
        guard.close();
        state.rooms().remove(code, &room);
        info!(room = %code, "room empty; torn down");
        return;
    }

    room_events::broadcast_membership(state, &guard);
    if departure.left_team.is_some() {
        room_events::broadcast_teams(state, &guard);
    }
    if let Some((team_id, lock)) = departure.relocked {
        info!(room = %code, team_id = %team_id, option_id = %lock.option_id, "team locked after roster change");
        room_events::broadcast_lock(state, &guard, team_id, &lock);
    }
}

/// Host only. Without explicit teams the configured default teams are created and the
/// other members are dealt onto them in join order.
pub async fn start_game(
    state: &SharedState,
    connection_id: Uuid,
    raw_code: &str,
    teams: Vec<TeamRequest>,
) -> Result<(), ServiceError> {
    let room = member_room(state, connection_id, raw_code)?;
    let mut guard = lock_member(&room, connection_id).await?;
    if !state.connections().is_host(&connection_id) {
        return Err(ServiceError::Unauthorized(
            "only the host can start the game".into(),
        ));
    }

    let setups = if teams.is_empty() {
        default_setups(state, &guard)
    } else {
        teams
            .into_iter()
            .map(|team| TeamSetup {
                name: team.name,
                members: team.members,
            })
            .collect()
    };

    guard.start_game(setups)?;
    info!(room = %guard.code(), teams = guard.teams().count(), "game started");
    room_events::broadcast_teams(state, &guard);
    room_events::broadcast_membership(state, &guard);
    room_events::broadcast_phase(state, &guard);
    Ok(())
}

fn default_setups(state: &SharedState, room: &Room) -> Vec<TeamSetup> {
    let mut setups = state
        .config()
        .default_team_names()
        .iter()
        .map(|name| TeamSetup {
            name: name.clone(),
            members: Vec::new(),
        })
        .collect::<Vec<_>>();
    if setups.is_empty() {
        return setups;
    }

    let players = room
        .connections()
        .filter(|id| !state.connections().is_host(id))
        .copied();
    let team_count = setups.len();
    for (index, player) in players.enumerate() {
        setups[index % team_count].members.push(player);
    }
    setups
}

pub async fn join_team(
    state: &SharedState,
    connection_id: Uuid,
    raw_code: &str,
    team_id: Uuid,
) -> Result<(), ServiceError> {
    let room = member_room(state, connection_id, raw_code)?;
    let mut guard = lock_member(&room, connection_id).await?;

    guard.join_team(connection_id, team_id)?;
    debug!(room = %guard.code(), connection_id = %connection_id, team_id = %team_id, "member joined team");
    room_events::broadcast_teams(state, &guard);
    room_events::broadcast_membership(state, &guard);
    Ok(())
}

pub async fn select_subject(
    state: &SharedState,
    connection_id: Uuid,
    raw_code: &str,
    subject_id: String,
) -> Result<(), ServiceError> {
    let room = member_room(state, connection_id, raw_code)?;
    let mut guard = lock_member(&room, connection_id).await?;

    guard.select_subject(subject_id.clone())?;
    room_events::broadcast_subject_selected(state, &guard, &subject_id, connection_id);
    room_events::broadcast_phase(state, &guard);
    Ok(())
}

pub async fn select_type(
    state: &SharedState,
    connection_id: Uuid,
    raw_code: &str,
    type_id: String,
) -> Result<(), ServiceError> {
    let room = member_room(state, connection_id, raw_code)?;
    let mut guard = lock_member(&room, connection_id).await?;

    guard.select_type(type_id.clone());
    room_events::broadcast_type_selected(state, &guard, &type_id, connection_id);
    Ok(())
}

/// Fetch a question and enter the question phase.
///
/// The transition is planned first, so a second load for the same room is rejected while
/// this one is in flight, and a `round-ended` arriving meanwhile makes this load stale.
pub async fn load_question(
    state: &SharedState,
    connection_id: Uuid,
    raw_code: &str,
    subject_id: String,
    type_id: String,
    difficulty: Option<Difficulty>,
) -> Result<(), ServiceError> {
    let room = member_room(state, connection_id, raw_code)?;
    let plan_id = {
        let mut guard = lock_member(&room, connection_id).await?;
        guard.plan_question_load()?
    };

    let fetched = fetch_question(state, &subject_id, &type_id, difficulty).await;

    let mut guard = room.lock().await;
    if guard.is_closed() {
        debug!(room = %guard.code(), "room torn down during question load");
        return Ok(());
    }
    match fetched {
        Ok(entity) => {
            let question_id = entity.id.clone();
            guard.apply_question(plan_id, entity.into())?;
            info!(room = %guard.code(), question_id = %question_id, "question loaded");
            room_events::broadcast_question_loaded(state, &guard);
            room_events::broadcast_phase(state, &guard);
            Ok(())
        }
        Err(err) => {
            if guard.abort_question_load(plan_id).is_err() {
                debug!(room = %guard.code(), "failed question load was already superseded");
            }
            Err(err)
        }
    }
}

async fn fetch_question(
    state: &SharedState,
    subject_id: &str,
    type_id: &str,
    difficulty: Option<Difficulty>,
) -> Result<QuestionEntity, ServiceError> {
    let unavailable = || ServiceError::NoQuestionsAvailable {
        subject_id: subject_id.to_owned(),
        type_id: type_id.to_owned(),
    };

    if state.is_degraded().await {
        warn!("question store degraded; no question can be loaded");
        return Err(unavailable());
    }
    let Some(store) = state.question_store().await else {
        warn!("no question store installed");
        return Err(unavailable());
    };
    let timeout = state.config().question_timeout();

    let mut found = query_store(&store, timeout, subject_id, type_id, difficulty).await?;
    if found.is_none() && difficulty.is_some() {
        debug!(subject_id, type_id, "no question for difficulty; retrying without it");
        found = query_store(&store, timeout, subject_id, type_id, None).await?;
    }
    found.ok_or_else(unavailable)
}

async fn query_store(
    store: &Arc<dyn QuestionStore>,
    timeout: Duration,
    subject_id: &str,
    type_id: &str,
    difficulty: Option<Difficulty>,
) -> Result<Option<QuestionEntity>, ServiceError> {
    let lookup = store.find_question(subject_id.to_owned(), type_id.to_owned(), difficulty);
    match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(found)) => Ok(found),
        Ok(Err(err)) => {
            warn!(error = %err, subject_id, type_id, "question store lookup failed");
            Err(ServiceError::NoQuestionsAvailable {
                subject_id: subject_id.to_owned(),
                type_id: type_id.to_owned(),
            })
        }
        Err(_) => {
            warn!(?timeout, subject_id, type_id, "question store lookup timed out");
            Err(ServiceError::Timeout)
        }
    }
}

/// Record a vote. A member already on a roster may only vote for that team.
pub async fn vote(
    state: &SharedState,
    connection_id: Uuid,
    raw_code: &str,
    team_id: Uuid,
    member_id: Uuid,
    option_id: String,
) -> Result<(), ServiceError> {
    let room = member_room(state, connection_id, raw_code)?;
    let mut guard = lock_member(&room, connection_id).await?;

    if !guard.has_connection(&member_id) {
        return Err(ServiceError::NotMember(format!(
            "member `{member_id}` is not in room `{}`",
            guard.code()
        )));
    }
    if let Some(team) = guard.team_of(&member_id)
        && team.id != team_id
    {
        return Err(ServiceError::InvalidInput(format!(
            "member `{member_id}` plays for team `{}`",
            team.id
        )));
    }

    match guard.cast_vote(team_id, member_id, &option_id, now_ms())? {
        VoteOutcome::Pending(tally) => {
            room_events::broadcast_tally(state, &guard, team_id, tally);
        }
        VoteOutcome::Locked(lock, tally) => {
            info!(
                room = %guard.code(),
                team_id = %team_id,
                option_id = %lock.option_id,
                "team answer locked"
            );
            room_events::broadcast_tally(state, &guard, team_id, tally);
            room_events::broadcast_lock(state, &guard, team_id, &lock);
        }
        VoteOutcome::AlreadyLocked(_) => {
            debug!(room = %guard.code(), team_id = %team_id, "vote after lock recorded only");
        }
    }
    Ok(())
}

pub async fn reveal_results(
    state: &SharedState,
    connection_id: Uuid,
    raw_code: &str,
) -> Result<(), ServiceError> {
    let room = member_room(state, connection_id, raw_code)?;
    let mut guard = lock_member(&room, connection_id).await?;

    let results = guard.reveal_results(state.config().speed_bonus())?.clone();
    info!(
        room = %guard.code(),
        correct = results.answers.iter().filter(|answer| answer.correct).count(),
        fastest = ?results.fastest_team_id,
        "results revealed"
    );
    room_events::broadcast_results(state, &guard, &results);
    room_events::broadcast_phase(state, &guard);
    Ok(())
}

pub async fn round_ended(
    state: &SharedState,
    connection_id: Uuid,
    raw_code: &str,
) -> Result<(), ServiceError> {
    let room = member_room(state, connection_id, raw_code)?;
    let mut guard = lock_member(&room, connection_id).await?;

    guard.end_round()?;
    debug!(room = %guard.code(), first_picker = guard.rotation().first_picker_index(), "round ended");
    room_events::broadcast_round_ended(state, &guard);
    room_events::broadcast_phase(state, &guard);
    Ok(())
}

/// Resolve the room a non-join message addresses.
fn member_room(
    state: &SharedState,
    connection_id: Uuid,
    raw_code: &str,
) -> Result<SharedRoom, ServiceError> {
    let code = RoomCode::parse(raw_code)?;
    let room = state
        .rooms()
        .get(&code)
        .ok_or_else(|| ServiceError::UnknownRoom(code.to_string()))?;
    if state.connections().current_room(&connection_id).as_ref() != Some(&code) {
        return Err(not_member(&code));
    }
    Ok(room)
}

async fn lock_member(
    room: &SharedRoom,
    connection_id: Uuid,
) -> Result<MutexGuard<'_, Room>, ServiceError> {
    let guard = room.lock().await;
    if guard.is_closed() || !guard.has_connection(&connection_id) {
        return Err(not_member(guard.code()));
    }
    Ok(guard)
}

fn not_member(code: &RoomCode) -> ServiceError {
    ServiceError::NotMember(format!("connection has not joined room `{code}`"))
}

/// Wall-clock milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    let millis = time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    u64::try_from(millis).unwrap_or_default()
}
