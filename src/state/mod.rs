pub mod connections;
pub mod game;
pub mod room;
pub mod room_store;
pub mod rotation;
pub mod scoring;
pub mod state_machine;
pub mod voting;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::question_store::QuestionStore};

use self::{connections::ConnectionRegistry, room_store::RoomStore};

pub type SharedState = Arc<AppState>;

/// Central application state: rooms, live connections and the question store handle.
pub struct AppState {
    config: AppConfig,
    question_store: RwLock<Option<Arc<dyn QuestionStore>>>,
    degraded: watch::Sender<bool>,
    rooms: RoomStore,
    connections: ConnectionRegistry,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a question store is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            question_store: RwLock::new(None),
            degraded: degraded_tx,
            rooms: RoomStore::new(),
            connections: ConnectionRegistry::new(),
        })
    }

    /// Shortcut for tests and single-process setups: state with a store already installed.
    pub async fn with_question_store(
        config: AppConfig,
        store: Arc<dyn QuestionStore>,
    ) -> SharedState {
        let state = Self::new(config);
        state.set_question_store(store).await;
        state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn rooms(&self) -> &RoomStore {
        &self.rooms
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Obtain a handle to the current question store, if one is installed.
    pub async fn question_store(&self) -> Option<Arc<dyn QuestionStore>> {
        let guard = self.question_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a question store and leave degraded mode.
    pub async fn set_question_store(&self, store: Arc<dyn QuestionStore>) {
        {
            let mut guard = self.question_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current question store and enter degraded mode.
    pub async fn clear_question_store(&self) {
        {
            let mut guard = self.question_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}
