use axum::{Json, Router, extract::State, http::HeaderMap, routing::get, routing::post};
use axum_valid::Valid;

use crate::{
    dto::{
        admin::{ActionResponse, StartRoundRequest, StartRoundResponse},
        game::StateSnapshot,
    },
    error::AppError,
    services::admin_service,
    state::SharedState,
};

/// PIN-guarded routes controlling the game lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/rounds/start", post(start_round))
        .route("/admin/questions/next", post(next_question))
        .route("/admin/stop", post(force_stop))
        .route("/admin/state", get(get_state))
}

/// Start a round. Rounds are strictly sequential; round 1 resets the game.
#[utoipa::path(
    post,
    path = "/admin/rounds/start",
    tag = "admin",
    request_body = StartRoundRequest,
    responses(
        (status = 200, description = "Round started", body = StartRoundResponse),
        (status = 401, description = "Missing or incorrect admin PIN"),
        (status = 409, description = "Sequencing violation"),
        (status = 404, description = "No questions for the round")
    )
)]
pub async fn start_round(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<StartRoundRequest>>,
) -> Result<Json<StartRoundResponse>, AppError> {
    admin_service::authorize(&state, &headers)?;
    let response = admin_service::start_round(&state, payload).await?;
    Ok(Json(response))
}

/// Force the current question to conclude immediately.
#[utoipa::path(
    post,
    path = "/admin/questions/next",
    tag = "admin",
    responses(
        (status = 200, description = "Question concluded or advanced", body = ActionResponse),
        (status = 401, description = "Missing or incorrect admin PIN"),
        (status = 409, description = "No question is being played")
    )
)]
pub async fn next_question(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ActionResponse>, AppError> {
    admin_service::authorize(&state, &headers)?;
    let response = admin_service::next_question(&state).await?;
    Ok(Json(response))
}

/// Abort the game back to the lobby without grading the in-flight question.
#[utoipa::path(
    post,
    path = "/admin/stop",
    tag = "admin",
    responses(
        (status = 200, description = "Game stopped", body = ActionResponse),
        (status = 401, description = "Missing or incorrect admin PIN")
    )
)]
pub async fn force_stop(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ActionResponse>, AppError> {
    admin_service::authorize(&state, &headers)?;
    let response = admin_service::force_stop(&state).await?;
    Ok(Json(response))
}

/// Full session snapshot for the admin dashboard.
#[utoipa::path(
    get,
    path = "/admin/state",
    tag = "admin",
    responses(
        (status = 200, description = "Session snapshot", body = StateSnapshot),
        (status = 401, description = "Missing or incorrect admin PIN")
    )
)]
pub async fn get_state(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<StateSnapshot>, AppError> {
    admin_service::authorize(&state, &headers)?;
    Ok(Json(admin_service::get_state(&state).await))
}
