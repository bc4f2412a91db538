use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

use trivia_rooms::{
    config::AppConfig,
    dao::{
        models::{Difficulty, QuestionEntity, QuestionOptionEntity},
        question_store::{MemoryQuestionStore, QuestionStore},
        storage::StorageResult,
    },
    dto::{phase::VisiblePhase, room::LockView, ws::{ClientMessage, ServerMessage}},
    error::{ErrorCode, ServiceError},
    services::{public_service, room_service},
    state::{AppState, SharedState},
};

const ROOM: &str = "quiz-night";

/// Channel-backed stand-in for a WebSocket client.
struct Client {
    id: Uuid,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Client {
    fn connect(state: &SharedState) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        state.connections().register(id, tx);
        Self { id, rx }
    }

    async fn send(&self, state: &SharedState, message: Value) -> Result<(), ServiceError> {
        let message = ClientMessage::from_json_str(&message.to_string()).unwrap();
        room_service::handle_client_message(state, self.id, message).await
    }

    async fn join(&self, state: &SharedState, room: &str, is_host: bool) {
        self.send(
            state,
            json!({"type": "join", "room_code": room, "display_name": "player", "is_host": is_host}),
        )
        .await
        .unwrap();
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn locks(&mut self) -> Vec<LockView> {
        self.drain()
            .into_iter()
            .filter_map(|message| match message {
                ServerMessage::TeamLocked { lock, .. } => Some(lock),
                _ => None,
            })
            .collect()
    }
}

fn question(id: &str, subject: &str, difficulty: Option<Difficulty>, points: u32) -> QuestionEntity {
    QuestionEntity {
        id: id.into(),
        subject_id: subject.into(),
        type_id: "multiple_choice".into(),
        difficulty,
        prompt: format!("{id}?"),
        options: ["a", "b", "c"]
            .into_iter()
            .map(|option| QuestionOptionEntity {
                id: option.into(),
                label: option.to_uppercase(),
            })
            .collect(),
        correct_option_id: "a".into(),
        points,
    }
}

async fn state_with(questions: Vec<QuestionEntity>) -> SharedState {
    let store = MemoryQuestionStore::new(questions);
    AppState::with_question_store(AppConfig::default().with_speed_bonus(5), Arc::new(store)).await
}

async fn history_state() -> SharedState {
    state_with(vec![question("h1", "history", Some(Difficulty::Easy), 10)]).await
}

/// Host plus one roster per entry of `team_sizes`, game started and question loaded.
async fn running_room(
    state: &SharedState,
    room: &str,
    team_sizes: &[usize],
) -> (Client, Vec<Uuid>, Vec<Vec<Client>>) {
    let host = Client::connect(state);
    host.join(state, room, true).await;

    let mut rosters = Vec::new();
    for _ in team_sizes {
        rosters.push(Vec::new());
    }
    for (roster, size) in rosters.iter_mut().zip(team_sizes) {
        for _ in 0..*size {
            let player = Client::connect(state);
            player.join(state, room, false).await;
            roster.push(player);
        }
    }

    let teams = rosters
        .iter()
        .enumerate()
        .map(|(index, roster)| {
            json!({
                "name": format!("Team {index}"),
                "members": roster.iter().map(|player| player.id).collect::<Vec<_>>(),
            })
        })
        .collect::<Vec<_>>();
    host.send(state, json!({"type": "start-game", "room_code": room, "teams": teams}))
        .await
        .unwrap();
    host.send(
        state,
        json!({"type": "load-question", "room_code": room, "subject_id": "history", "type_id": "multiple_choice"}),
    )
    .await
    .unwrap();

    let snapshot = public_service::room_snapshot(state, room).await.unwrap();
    let team_ids = snapshot.teams.iter().map(|team| team.id).collect();
    (host, team_ids, rosters)
}

async fn vote(state: &SharedState, player: &Client, team_id: Uuid, option: &str) {
    player
        .send(
            state,
            json!({"type": "vote", "room_code": ROOM, "team_id": team_id, "option_id": option}),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn three_member_team_locks_on_the_deciding_vote() {
    let state = history_state().await;
    let (mut host, teams, rosters) = running_room(&state, ROOM, &[3, 1]).await;
    host.drain();

    vote(&state, &rosters[0][0], teams[0], "a").await;
    vote(&state, &rosters[0][1], teams[0], "b").await;
    assert!(host.locks().is_empty());

    vote(&state, &rosters[0][2], teams[0], "a").await;
    let locks = host.locks();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].team_id, teams[0]);
    assert_eq!(locks[0].option_id, "a");

    // locked answers never move
    vote(&state, &rosters[0][0], teams[0], "c").await;
    vote(&state, &rosters[0][1], teams[0], "c").await;
    assert!(host.locks().is_empty());
    let snapshot = public_service::room_snapshot(&state, ROOM).await.unwrap();
    assert_eq!(snapshot.locks[0].option_id, "a");
}

#[tokio::test]
async fn split_two_member_team_waits_for_a_tie_break() {
    let state = history_state().await;
    let (mut host, teams, rosters) = running_room(&state, ROOM, &[2, 1]).await;
    host.drain();

    vote(&state, &rosters[0][0], teams[0], "a").await;
    vote(&state, &rosters[0][1], teams[0], "b").await;
    assert!(host.locks().is_empty());

    // a member changing their mind breaks the tie
    vote(&state, &rosters[0][1], teams[0], "a").await;
    let locks = host.locks();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].option_id, "a");
}

#[tokio::test]
async fn reveal_awards_speed_bonus_and_round_end_rotates_picker() {
    let state = history_state().await;
    let (mut host, teams, rosters) = running_room(&state, ROOM, &[1, 1, 1]).await;

    vote(&state, &rosters[1][0], teams[1], "a").await;
    vote(&state, &rosters[0][0], teams[0], "a").await;
    vote(&state, &rosters[2][0], teams[2], "b").await;
    host.drain();

    host.send(&state, json!({"type": "reveal-results", "room_code": ROOM}))
        .await
        .unwrap();
    let (results, standings) = host
        .drain()
        .into_iter()
        .find_map(|message| match message {
            ServerMessage::ResultsRevealed { results, teams, .. } => Some((results, teams)),
            _ => None,
        })
        .unwrap();
    assert_eq!(results.fastest_team_id, Some(teams[1]));
    let scores = standings.iter().map(|team| team.score).collect::<Vec<_>>();
    assert_eq!(scores, vec![10, 15, 0]);

    for expected_picker in [1, 2, 0] {
        host.send(&state, json!({"type": "round-ended", "room_code": ROOM}))
            .await
            .unwrap();
        let snapshot = public_service::room_snapshot(&state, ROOM).await.unwrap();
        assert_eq!(snapshot.phase, VisiblePhase::PickSubject);
        assert_eq!(snapshot.subject_picker_team_id, Some(teams[expected_picker]));
        assert!(snapshot.question.is_none());
        assert!(snapshot.locks.is_empty());
        assert!(snapshot.last_results.is_some());
    }
}

#[tokio::test]
async fn missing_questions_leave_the_phase_unchanged() {
    let state = history_state().await;
    let host = Client::connect(&state);
    host.join(&state, ROOM, true).await;
    let player = Client::connect(&state);
    player.join(&state, ROOM, false).await;
    host.send(&state, json!({"type": "start-game", "room_code": ROOM}))
        .await
        .unwrap();

    let err = host
        .send(
            &state,
            json!({"type": "load-question", "room_code": ROOM, "subject_id": "geography", "type_id": "multiple_choice"}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoQuestionsAvailable);
    let snapshot = public_service::room_snapshot(&state, ROOM).await.unwrap();
    assert_eq!(snapshot.phase, VisiblePhase::PickSubject);

    // the failed load released its reservation, so a retry goes through
    host.send(
        &state,
        json!({"type": "load-question", "room_code": ROOM, "subject_id": "history", "type_id": "multiple_choice"}),
    )
    .await
    .unwrap();
    let snapshot = public_service::room_snapshot(&state, ROOM).await.unwrap();
    assert_eq!(snapshot.phase, VisiblePhase::Question);
}

#[tokio::test]
async fn unmatched_difficulty_falls_back_to_any_difficulty() {
    let state = history_state().await;
    let (host, _, _) = running_room(&state, ROOM, &[1, 1]).await;
    host.send(&state, json!({"type": "reveal-results", "room_code": ROOM}))
        .await
        .unwrap();
    host.send(&state, json!({"type": "round-ended", "room_code": ROOM}))
        .await
        .unwrap();

    host.send(
        &state,
        json!({"type": "load-question", "room_code": ROOM, "subject_id": "history", "type_id": "multiple_choice", "difficulty": "hard"}),
    )
    .await
    .unwrap();
    let snapshot = public_service::room_snapshot(&state, ROOM).await.unwrap();
    assert_eq!(snapshot.question.map(|question| question.id), Some("h1".to_owned()));
}

#[tokio::test]
async fn degraded_store_reports_no_questions() {
    let state = AppState::new(AppConfig::default());
    let host = Client::connect(&state);
    host.join(&state, ROOM, true).await;
    Client::connect(&state).join(&state, ROOM, false).await;
    host.send(&state, json!({"type": "start-game", "room_code": ROOM}))
        .await
        .unwrap();

    let err = host
        .send(
            &state,
            json!({"type": "load-question", "room_code": ROOM, "subject_id": "history", "type_id": "multiple_choice"}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoQuestionsAvailable);
}

#[tokio::test]
async fn default_teams_deal_players_round_robin() {
    let state = history_state().await;
    let host = Client::connect(&state);
    host.join(&state, ROOM, true).await;
    let players = (0..3).map(|_| Client::connect(&state)).collect::<Vec<_>>();
    for player in &players {
        player.join(&state, ROOM, false).await;
    }

    let err = players[0]
        .send(&state, json!({"type": "start-game", "room_code": ROOM}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Unauthorized);

    host.send(&state, json!({"type": "start-game", "room_code": ROOM}))
        .await
        .unwrap();
    let snapshot = public_service::room_snapshot(&state, ROOM).await.unwrap();
    let names = snapshot.teams.iter().map(|team| team.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["Red", "Blue"]);
    assert_eq!(snapshot.teams[0].members, vec![players[0].id, players[2].id]);
    assert_eq!(snapshot.teams[1].members, vec![players[1].id]);
    assert_eq!(snapshot.subject_picker_team_id, Some(snapshot.teams[0].id));
}

#[tokio::test]
async fn empty_room_is_torn_down_and_rejoined_fresh() {
    let state = history_state().await;
    let (host, _, rosters) = running_room(&state, ROOM, &[1, 1]).await;

    for player in rosters.iter().flatten() {
        room_service::disconnect(&state, player.id).await;
    }
    host.send(&state, json!({"type": "leave", "room_code": ROOM}))
        .await
        .unwrap();
    assert!(state.rooms().is_empty());
    assert!(matches!(
        public_service::room_snapshot(&state, ROOM).await,
        Err(ServiceError::UnknownRoom(_))
    ));

    let mut newcomer = Client::connect(&state);
    newcomer.join(&state, ROOM, true).await;
    let snapshot = newcomer
        .drain()
        .into_iter()
        .find_map(|message| match message {
            ServerMessage::RoomSnapshot { snapshot } => Some(snapshot),
            _ => None,
        })
        .unwrap();
    assert_eq!(snapshot.phase, VisiblePhase::Waiting);
    assert_eq!(snapshot.version, 0);
    assert!(snapshot.teams.is_empty());
    assert_eq!(snapshot.members.len(), 1);
}

#[tokio::test]
async fn messages_for_other_rooms_are_rejected_locally() {
    let state = history_state().await;
    let alice = Client::connect(&state);
    alice.join(&state, "room-a", true).await;
    let bob = Client::connect(&state);
    bob.join(&state, "room-b", true).await;

    let err = alice
        .send(&state, json!({"type": "reveal-results", "room_code": "room-b"}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotMember);

    let err = alice
        .send(&state, json!({"type": "round-ended", "room_code": "nowhere"}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnknownRoom);

    let err = alice
        .send(&state, json!({"type": "reveal-results", "room_code": "room-a"}))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidTransition);

    let snapshot = public_service::room_snapshot(&state, "room-b").await.unwrap();
    assert_eq!(snapshot.phase, VisiblePhase::Waiting);
}

#[tokio::test]
async fn departed_voter_still_counts_and_roster_shrink_locks() {
    let state = history_state().await;
    let (mut host, teams, rosters) = running_room(&state, ROOM, &[2, 1]).await;

    vote(&state, &rosters[0][0], teams[0], "b").await;
    assert!(host.locks().is_empty());

    // the voter leaves; the teammate left behind is outvoted by the departed ballot
    room_service::disconnect(&state, rosters[0][0].id).await;
    let locks = host.locks();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].team_id, teams[0]);
    assert_eq!(locks[0].option_id, "b");
}

#[tokio::test]
async fn two_unanimous_voters_lock_a_four_member_team() {
    let state = history_state().await;
    let (mut host, teams, rosters) = running_room(&state, ROOM, &[4, 1]).await;
    host.drain();

    vote(&state, &rosters[0][0], teams[0], "a").await;
    vote(&state, &rosters[0][1], teams[0], "a").await;
    let locks = host.locks();
    assert_eq!(locks.len(), 1);
    assert_eq!(locks[0].option_id, "a");
}

#[tokio::test]
async fn team_switch_is_rejected_while_a_question_is_live() {
    let state = history_state().await;
    let (_host, teams, rosters) = running_room(&state, ROOM, &[2, 2]).await;
    let mover = &rosters[0][0];
    vote(&state, mover, teams[0], "b").await;

    let err = mover
        .send(
            &state,
            json!({"type": "join-team", "room_code": ROOM, "team_id": teams[1]}),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidTransition);

    let snapshot = public_service::room_snapshot(&state, ROOM).await.unwrap();
    assert!(snapshot.teams[0].members.contains(&mover.id));
    assert!(!snapshot.teams[1].members.contains(&mover.id));
    assert!(snapshot.locks.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rooms_do_not_interfere() {
    let state = history_state().await;

    let play = |code: &'static str| {
        let state = state.clone();
        async move {
            let (host, teams, rosters) = running_room(&state, code, &[2, 2]).await;
            for (team, roster) in teams.iter().zip(&rosters) {
                for player in roster {
                    player
                        .send(
                            &state,
                            json!({"type": "vote", "room_code": code, "team_id": team, "option_id": "a"}),
                        )
                        .await
                        .unwrap();
                }
            }
            host.send(&state, json!({"type": "reveal-results", "room_code": code}))
                .await
                .unwrap();
            let snapshot = public_service::room_snapshot(&state, code).await.unwrap();
            snapshot.teams.iter().map(|team| team.score).collect::<Vec<_>>()
        }
    };

    let (a, b) = tokio::join!(tokio::spawn(play("alpha")), tokio::spawn(play("beta")));
    assert_eq!(a.unwrap(), vec![15, 10]);
    assert_eq!(b.unwrap(), vec![15, 10]);
    assert_eq!(state.rooms().len(), 2);
}

/// Store whose lookups park until the test releases them.
struct GatedStore {
    question: QuestionEntity,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl GatedStore {
    fn new() -> Self {
        Self {
            question: question("h1", "history", None, 10),
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

impl QuestionStore for GatedStore {
    fn find_question(
        &self,
        _subject_id: String,
        _type_id: String,
        _difficulty: Option<Difficulty>,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let question = self.question.clone();
        let entered = self.entered.clone();
        let release = self.release.clone();
        Box::pin(async move {
            entered.notify_one();
            release.notified().await;
            Ok(Some(question))
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

async fn gated_state(config: AppConfig) -> (SharedState, Arc<Notify>, Arc<Notify>) {
    let store = GatedStore::new();
    let (entered, release) = (store.entered.clone(), store.release.clone());
    let state = AppState::with_question_store(config, Arc::new(store)).await;
    (state, entered, release)
}

/// Host plus two players with the default teams, waiting for the first subject.
async fn started_room(state: &SharedState, room: &str) -> Client {
    let host = Client::connect(state);
    host.join(state, room, true).await;
    for _ in 0..2 {
        Client::connect(state).join(state, room, false).await;
    }
    host.send(state, json!({"type": "start-game", "room_code": room}))
        .await
        .unwrap();
    host
}

#[tokio::test]
async fn rooms_stay_responsive_while_a_question_loads() {
    let (state, entered, release) = gated_state(AppConfig::default()).await;
    let host = started_room(&state, ROOM).await;
    let other_host = Client::connect(&state);
    other_host.join(&state, "side-room", true).await;
    Client::connect(&state).join(&state, "side-room", false).await;

    let loading = tokio::spawn({
        let state = state.clone();
        let host_id = host.id;
        async move {
            room_service::load_question(
                &state,
                host_id,
                ROOM,
                "history".into(),
                "multiple_choice".into(),
                None,
            )
            .await
        }
    });
    entered.notified().await;

    // same room: a join and a selection go through while the lookup is parked
    let mut newcomer = Client::connect(&state);
    tokio::time::timeout(Duration::from_secs(1), newcomer.join(&state, ROOM, false))
        .await
        .expect("join waited on the question lookup");
    tokio::time::timeout(
        Duration::from_secs(1),
        host.send(&state, json!({"type": "select-type", "room_code": ROOM, "type_id": "multiple_choice"})),
    )
    .await
    .expect("select-type waited on the question lookup")
    .unwrap();
    let snapshot = public_service::room_snapshot(&state, ROOM).await.unwrap();
    assert_eq!(snapshot.phase, VisiblePhase::PickSubject);
    assert_eq!(snapshot.members.len(), 4);

    // another room is not held up either
    tokio::time::timeout(
        Duration::from_secs(1),
        other_host.send(&state, json!({"type": "start-game", "room_code": "side-room"})),
    )
    .await
    .expect("other room waited on the question lookup")
    .unwrap();

    release.notify_one();
    loading.await.unwrap().unwrap();
    let snapshot = public_service::room_snapshot(&state, ROOM).await.unwrap();
    assert_eq!(snapshot.phase, VisiblePhase::Question);
    assert!(newcomer.drain().iter().any(|message| matches!(
        message,
        ServerMessage::QuestionLoaded { .. }
    )));
}

#[tokio::test(start_paused = true)]
async fn slow_lookup_times_out_without_changing_phase() {
    let config = AppConfig::default().with_question_timeout(Duration::from_millis(200));
    let (state, _entered, release) = gated_state(config).await;
    let host = started_room(&state, ROOM).await;
    let load = json!({"type": "load-question", "room_code": ROOM, "subject_id": "history", "type_id": "multiple_choice"});

    let err = host.send(&state, load.clone()).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Timeout);
    let snapshot = public_service::room_snapshot(&state, ROOM).await.unwrap();
    assert_eq!(snapshot.phase, VisiblePhase::PickSubject);
    assert!(snapshot.question.is_none());

    // the timed-out load released its reservation
    release.notify_one();
    host.send(&state, load).await.unwrap();
    let snapshot = public_service::room_snapshot(&state, ROOM).await.unwrap();
    assert_eq!(snapshot.phase, VisiblePhase::Question);
}
