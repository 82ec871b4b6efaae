use utoipa::OpenApi;

/// Aggregated OpenAPI specification for Tech Quest Back.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::admin_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::public::get_game_phase,
        crate::routes::public::leaderboard_json,
        crate::routes::public::leaderboard_csv,
        crate::routes::admin::start_round,
        crate::routes::admin::next_question,
        crate::routes::admin::force_stop,
        crate::routes::admin::get_state,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::sse::AdminHandshake,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::admin::StartRoundRequest,
            crate::dto::admin::StartRoundResponse,
            crate::dto::admin::ActionResponse,
            crate::dto::game::StateSnapshot,
            crate::dto::game::LeaderboardRow,
            crate::dto::public::GamePhaseResponse,
            crate::dto::public::LeaderboardResponse,
            crate::dao::models::QuestionEntity,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "participants", description = "WebSocket operations for participant clients"),
        (name = "public", description = "Read-only game state and exports"),
        (name = "admin", description = "PIN-guarded game control"),
    )
)]
pub struct ApiDoc;
