use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::{common::RosterRow, game::LeaderboardRow, phase::VisibleGamePhase};

/// Dispatched payload carried across SSE channels.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    /// Optional SSE event name.
    pub event: Option<String>,
    /// Serialized JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Build an event from a pre-rendered data string.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

/// Initial metadata sent to an admin SSE client when it connects.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminHandshake {
    /// Token identifying the single allowed admin stream.
    pub token: String,
}

/// Broadcast whenever the gameplay phase changes.
#[derive(Debug, Serialize, ToSchema)]
pub struct PhaseChangedEvent {
    /// New phase.
    pub phase: VisibleGamePhase,
    /// Round currently (or last) in play.
    pub round: u32,
    /// One-based number of the question on display, when playing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_number: Option<usize>,
    /// Number of questions in the active round.
    pub total_questions: usize,
}

/// Broadcast when a round starts.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundStartedEvent {
    /// Number of the started round.
    pub round: u32,
}

/// Broadcast when a non-final round completes.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoundFinishedEvent {
    /// Number of the completed round.
    pub round: u32,
    /// Round score required to stay active.
    pub cutoff: i32,
    /// Standings at round end.
    pub leaderboard: Vec<LeaderboardRow>,
}

/// Broadcast when the final round completes.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameFinishedEvent {
    /// The frozen final standings.
    pub leaderboard: Vec<LeaderboardRow>,
}

/// Broadcast with the ranked standings after a question.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardUpdateEvent {
    /// Ranked rows, possibly truncated for broadcast.
    pub leaderboard: Vec<LeaderboardRow>,
}

/// Broadcast whenever the roster changes.
#[derive(Debug, Serialize, ToSchema)]
pub struct LobbyUpdateEvent {
    /// Current roster rows.
    pub players: Vec<RosterRow>,
}
