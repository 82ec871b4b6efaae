//! DTO definitions used by the admin REST API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Request to start a specific round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartRoundRequest {
    /// Round to start; rounds are strictly sequential.
    #[validate(range(min = 1))]
    pub round: u32,
}

/// Response emitted when a round starts.
#[derive(Debug, Serialize, ToSchema)]
pub struct StartRoundResponse {
    /// The started round.
    pub round: u32,
    /// Number of questions loaded for the round.
    pub total_questions: usize,
}

/// Generic action acknowledgement used by admin endpoints.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Human-readable acknowledgement.
    pub message: String,
}
