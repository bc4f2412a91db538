use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report service health, pinging the question store when one is installed.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.question_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "question store health check failed");
            }
        }
        None => warn!("question store unavailable (degraded mode)"),
    }

    let rooms = state.rooms().len();
    let connections = state.connections().len();
    if state.is_degraded().await {
        HealthResponse::degraded(rooms, connections)
    } else {
        HealthResponse::ok(rooms, connections)
    }
}
