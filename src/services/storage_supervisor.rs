use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{question_store::QuestionStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Keep a question store installed in the shared state.
///
/// While the store is missing or unhealthy the state stays degraded and every question load
/// reports no questions available; rooms themselves keep running.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn QuestionStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_question_store(store.clone()).await;
                info!("question store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                while watch_store(&state, store.as_ref()).await {}

                state.clear_question_store().await;
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "question store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// One health poll. Returns `false` once the store is lost for good and has to be rebuilt.
async fn watch_store(state: &SharedState, store: &dyn QuestionStore) -> bool {
    if store.health_check().await.is_ok() {
        if state.is_degraded().await {
            info!("question store healthy again; leaving degraded mode");
            state.update_degraded(false).await;
        }
        sleep(HEALTH_POLL_INTERVAL).await;
        return true;
    }

    let mut reconnect_delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "question store reconnected after failed health check");
                state.update_degraded(false).await;
                sleep(HEALTH_POLL_INTERVAL).await;
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "question store reconnect failed; entering degraded mode");
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "question store reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }

    warn!("exhausted question store reconnect attempts; rebuilding connection");
    false
}
