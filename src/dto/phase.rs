use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::GamePhase;

/// Publicly visible game phase exposed to clients (WS/SSE/REST).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisibleGamePhase {
    /// Waiting for the next round to start.
    Lobby,
    /// A round is active and questions are being asked.
    Playing,
    /// A round finished; qualification results are on display.
    RoundFinished,
    /// The game is over; the final leaderboard is frozen.
    GameFinished,
}

impl From<&GamePhase> for VisibleGamePhase {
    fn from(value: &GamePhase) -> Self {
        match value {
            GamePhase::Lobby => VisibleGamePhase::Lobby,
            GamePhase::Playing { .. } => VisibleGamePhase::Playing,
            GamePhase::RoundFinished { .. } => VisibleGamePhase::RoundFinished,
            GamePhase::GameFinished => VisibleGamePhase::GameFinished,
        }
    }
}
