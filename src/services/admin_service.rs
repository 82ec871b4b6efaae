//! Business logic powering the admin REST routes: the opaque PIN capability
//! check plus thin wrappers around the round controller.

use axum::http::{HeaderMap, header};

use crate::{
    dto::{
        admin::{ActionResponse, StartRoundRequest, StartRoundResponse},
        game::StateSnapshot,
    },
    error::ServiceError,
    services::{game_service, round_service},
    state::SharedState,
};

/// Verify the bearer PIN carried in the `Authorization` header.
///
/// The PIN is an opaque shared secret from configuration; no state is touched
/// on failure.
pub fn authorize(state: &SharedState, headers: &HeaderMap) -> Result<(), ServiceError> {
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or_default();

    if provided.is_empty() || provided != state.config().admin_pin() {
        return Err(ServiceError::Unauthorized(
            "admin PIN missing or incorrect".into(),
        ));
    }

    Ok(())
}

/// Start the requested round.
pub async fn start_round(
    state: &SharedState,
    request: StartRoundRequest,
) -> Result<StartRoundResponse, ServiceError> {
    round_service::start_round(state, request.round).await
}

/// Force the current question to conclude (or skip the pacing delays when it
/// already has).
pub async fn next_question(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    let outcome = round_service::advance_question(state).await?;
    Ok(ActionResponse {
        message: match outcome {
            round_service::ConcludeOutcome::Graded => "question graded".into(),
            _ => "advanced".into(),
        },
    })
}

/// Abort the game back to the lobby without grading.
pub async fn force_stop(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    round_service::force_stop(state).await?;
    Ok(ActionResponse {
        message: "stopped".into(),
    })
}

/// Full session snapshot for the admin dashboard.
pub async fn get_state(state: &SharedState) -> StateSnapshot {
    game_service::state_snapshot(state).await
}
