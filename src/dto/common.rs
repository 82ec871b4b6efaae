use serde::Serialize;
use utoipa::ToSchema;

use crate::state::game::{Player, PlayerStatus};

/// Participation status as exposed to clients and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatusDto {
    /// Scores and may submit answers.
    Active,
    /// Receives broadcasts, never scores.
    Spectator,
    /// Out of the competition.
    Eliminated,
}

impl From<PlayerStatus> for PlayerStatusDto {
    fn from(status: PlayerStatus) -> Self {
        match status {
            PlayerStatus::Active => PlayerStatusDto::Active,
            PlayerStatus::Spectator => PlayerStatusDto::Spectator,
            PlayerStatus::Eliminated => PlayerStatusDto::Eliminated,
        }
    }
}

/// Compact roster row used in lobby updates and the admin snapshot.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RosterRow {
    /// Display name.
    pub name: String,
    /// Durable identity.
    pub roll_number: String,
    /// Cumulative score.
    pub score: i32,
    /// Current participation status.
    pub status: PlayerStatusDto,
}

impl From<&Player> for RosterRow {
    fn from(player: &Player) -> Self {
        Self {
            name: player.name.clone(),
            roll_number: player.roll_number.clone(),
            score: player.score,
            status: player.status.into(),
        }
    }
}
