use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::{
        common::{PlayerStatusDto, RosterRow},
        game::{AnswerResult, LeaderboardRow, QuestionView, RoundStatus, StateSnapshot},
    },
    state::game::AnswerPayload,
};

/// Messages accepted from participant WebSocket clients.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join (or rejoin) the game under a durable identity.
    Join {
        /// Display name.
        name: String,
        /// Durable identity; uppercased server-side before validation.
        roll_number: String,
    },
    /// Submit an answer for the question on display.
    SubmitAnswer {
        /// Id of the question being answered, echoed for bookkeeping.
        question_id: Uuid,
        /// Selected option index or matching pairs.
        #[schema(value_type = Object)]
        payload: AnswerPayload,
    },
    /// Request a full session snapshot.
    GetState,
    /// Anything unrecognised; answered with an error event.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a JSON text frame into a client message.
    pub fn from_json_str(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

/// Messages pushed to participant WebSocket clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Outcome of a join request.
    JoinAck {
        /// Whether the join was accepted.
        success: bool,
        /// Human-readable acknowledgement or rejection reason.
        message: String,
        /// Cumulative score carried by the (possibly rebound) identity.
        #[serde(skip_serializing_if = "Option::is_none")]
        score: Option<i32>,
        /// Participation status after the join.
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<PlayerStatusDto>,
        /// Round currently in play, `0` while in the lobby.
        #[serde(skip_serializing_if = "Option::is_none")]
        round: Option<u32>,
    },
    /// A new question is on display.
    NewQuestion(QuestionView),
    /// Position of the current question within the round.
    QuestionProgress {
        /// One-based question number.
        question_number: usize,
        /// Number of questions in the round.
        total_questions: usize,
    },
    /// A round has started.
    RoundStarted {
        /// Number of the round.
        round: u32,
    },
    /// The countdown for the current question expired.
    TimeUp,
    /// Private grading outcome for the recipient.
    AnswerResult(AnswerResult),
    /// Ranked standings after a question or round.
    LeaderboardUpdate {
        /// Ranked rows, possibly truncated for broadcast.
        leaderboard: Vec<LeaderboardRow>,
    },
    /// Private qualification verdict when a round completes.
    RoundStatus(RoundStatus),
    /// The final round completed; the leaderboard is frozen.
    GameFinished {
        /// The frozen final standings.
        leaderboard: Vec<LeaderboardRow>,
    },
    /// The roster changed (join, reconnect or disconnect).
    LobbyUpdate {
        /// Current roster rows.
        players: Vec<RosterRow>,
    },
    /// Full session snapshot, answering `get_state`.
    GameState(StateSnapshot),
    /// An admin aborted the game back to the lobby.
    GameStopped,
    /// A request failed; carries the reason only, never another player's data.
    Error {
        /// Failure description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_message_parses() {
        let msg = ClientMessage::from_json_str(
            r#"{"type": "join", "name": "Ada", "roll_number": "21CS001"}"#,
        )
        .unwrap();
        assert!(matches!(msg, ClientMessage::Join { .. }));
    }

    #[test]
    fn submit_answer_accepts_choice_and_matching_payloads() {
        let choice = ClientMessage::from_json_str(
            r#"{"type": "submit_answer", "question_id": "7f2f1e7c-0c4f-4d5a-9d7e-2f3c1b2a4d5e", "payload": 2}"#,
        )
        .unwrap();
        match choice {
            ClientMessage::SubmitAnswer { payload, .. } => {
                assert!(matches!(payload, AnswerPayload::Choice(2)))
            }
            other => panic!("unexpected message: {other:?}"),
        }

        let matching = ClientMessage::from_json_str(
            r#"{"type": "submit_answer", "question_id": "7f2f1e7c-0c4f-4d5a-9d7e-2f3c1b2a4d5e", "payload": {"Rust": "cargo"}}"#,
        )
        .unwrap();
        match matching {
            ClientMessage::SubmitAnswer { payload, .. } => {
                assert!(matches!(payload, AnswerPayload::Matching(_)))
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unrecognised_type_falls_back_to_unknown() {
        let msg = ClientMessage::from_json_str(r#"{"type": "bribe_the_host"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Unknown));
    }
}
