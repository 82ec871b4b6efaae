use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::{game::LeaderboardRow, phase::VisibleGamePhase};

/// Response exposing the game's global phase as seen by the public.
#[derive(Debug, Serialize, ToSchema)]
pub struct GamePhaseResponse {
    /// Current phase.
    pub phase: VisibleGamePhase,
    /// Round currently (or last) in play, `0` before the first start.
    pub round: u32,
    /// Number of live, identified connections.
    pub players_online: usize,
}

/// Response carrying the most recent full leaderboard snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    /// Ranked rows, most recent snapshot first to last place.
    pub leaderboard: Vec<LeaderboardRow>,
}
