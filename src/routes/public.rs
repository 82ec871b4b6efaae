use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, header},
    response::IntoResponse,
    routing::get,
};

use crate::{
    dto::public::{GamePhaseResponse, LeaderboardResponse},
    services::leaderboard,
    state::SharedState,
};

/// Public read-only endpoints exposing game state and leaderboard exports.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/phase", get(get_game_phase))
        .route("/leaderboard.json", get(leaderboard_json))
        .route("/leaderboard.csv", get(leaderboard_csv))
}

/// Return the high-level phase the game is currently in.
#[utoipa::path(
    get,
    path = "/public/phase",
    tag = "public",
    responses((status = 200, description = "Current game phase", body = GamePhaseResponse))
)]
pub async fn get_game_phase(State(state): State<SharedState>) -> Json<GamePhaseResponse> {
    let phase = state.phase().await;
    let round = state.session().read().await.current_round;
    let players_online = state.roster().read().await.live_count();

    Json(GamePhaseResponse {
        phase: (&phase).into(),
        round,
        players_online,
    })
}

/// Export the most recent leaderboard snapshot as JSON.
#[utoipa::path(
    get,
    path = "/leaderboard.json",
    tag = "public",
    responses((status = 200, description = "Latest leaderboard snapshot", body = LeaderboardResponse))
)]
pub async fn leaderboard_json(State(state): State<SharedState>) -> Json<LeaderboardResponse> {
    let leaderboard = state.session().read().await.last_leaderboard.clone();
    Json(LeaderboardResponse { leaderboard })
}

/// Export the most recent leaderboard snapshot as a CSV download.
#[utoipa::path(
    get,
    path = "/leaderboard.csv",
    tag = "public",
    responses((status = 200, description = "Latest leaderboard snapshot as CSV", content_type = "text/csv", body = String))
)]
pub async fn leaderboard_csv(State(state): State<SharedState>) -> impl IntoResponse {
    let rows = state.session().read().await.last_leaderboard.clone();
    let csv = leaderboard::to_csv(&rows);

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"techquest_leaderboard.csv\""),
    );
    (headers, csv)
}
