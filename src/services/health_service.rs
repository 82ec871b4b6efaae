use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with the health payload, probing the question bank on the way.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_question_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "question bank health check failed");
                return HealthResponse::degraded();
            }
        }
        Err(_) => {
            warn!("question store not installed (degraded mode)");
            return HealthResponse::degraded();
        }
    }

    HealthResponse::ok()
}
