//! Trivia room server entrypoint wiring the WebSocket, REST and question store layers.

use std::{env, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trivia_rooms::{
    config::AppConfig,
    dao::{
        question_store::{MemoryQuestionStore, QuestionStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

const QUESTION_STORE_ENV: &str = "QUESTION_STORE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let questions_path = config.questions_path().map(PathBuf::from);
    let app_state = AppState::new(config);

    spawn_question_store(&app_state, questions_path)?;
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the supervisor for the backend named by `QUESTION_STORE` (default `memory`).
fn spawn_question_store(state: &SharedState, questions_path: Option<PathBuf>) -> anyhow::Result<()> {
    let backend = env::var(QUESTION_STORE_ENV).unwrap_or_else(|_| "memory".into());
    info!(backend = %backend, "selecting question store");

    match backend.as_str() {
        "memory" => {
            if questions_path.is_none() {
                warn!("no questions_path configured; in-memory question store starts empty");
            }
            tokio::spawn(storage_supervisor::run(state.clone(), move || {
                load_memory_store(questions_path.clone())
            }));
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => {
            tokio::spawn(storage_supervisor::run(state.clone(), connect_mongo));
        }
        #[cfg(feature = "couch-store")]
        "couch" => {
            tokio::spawn(storage_supervisor::run(state.clone(), connect_couch));
        }
        other => bail!("unsupported {QUESTION_STORE_ENV} value `{other}`"),
    }
    Ok(())
}

async fn load_memory_store(
    path: Option<PathBuf>,
) -> Result<Arc<dyn QuestionStore>, StorageError> {
    let store = match path {
        Some(path) => MemoryQuestionStore::from_file(&path)?,
        None => MemoryQuestionStore::default(),
    };
    info!(questions = store.len(), "in-memory question store loaded");
    Ok(Arc::new(store))
}

#[cfg(feature = "mongo-store")]
async fn connect_mongo() -> Result<Arc<dyn QuestionStore>, StorageError> {
    use trivia_rooms::dao::question_store::mongodb::{MongoConfig, MongoQuestionStore};

    let config = MongoConfig::from_env().await?;
    let store = MongoQuestionStore::connect(config).await?;
    Ok(Arc::new(store))
}

#[cfg(feature = "couch-store")]
async fn connect_couch() -> Result<Arc<dyn QuestionStore>, StorageError> {
    use trivia_rooms::dao::question_store::couchdb::{CouchConfig, CouchQuestionStore};

    let config = CouchConfig::from_env()?;
    let store = CouchQuestionStore::connect(config).await?;
    Ok(Arc::new(store))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
