//! Named event broadcasting onto the public and admin SSE streams.
//!
//! WebSocket participants receive the same information through
//! [`websocket_service::broadcast_message`](super::websocket_service::broadcast_message);
//! these helpers mirror it for projector screens and the admin dashboard.

use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        common::RosterRow,
        game::{LeaderboardRow, QuestionView},
        sse::{
            GameFinishedEvent, LeaderboardUpdateEvent, LobbyUpdateEvent, PhaseChangedEvent,
            RoundFinishedEvent, RoundStartedEvent, ServerEvent,
        },
    },
    state::{SharedState, state_machine::GamePhase},
};

const EVENT_PHASE_CHANGED: &str = "phase_changed";
const EVENT_ROUND_STARTED: &str = "round.started";
const EVENT_ROUND_FINISHED: &str = "round.finished";
const EVENT_QUESTION_NEW: &str = "question.new";
const EVENT_QUESTION_PROGRESS: &str = "question.progress";
const EVENT_TIME_UP: &str = "question.time_up";
const EVENT_LEADERBOARD_UPDATE: &str = "leaderboard.update";
const EVENT_GAME_FINISHED: &str = "game.finished";
const EVENT_GAME_STOPPED: &str = "game.stopped";
const EVENT_LOBBY_UPDATE: &str = "lobby.update";

/// Broadcast a gameplay phase change with its question context.
pub async fn broadcast_phase_changed(state: &SharedState, phase: &GamePhase) {
    let (round, question_number, total_questions) = {
        let session = state.session().read().await;
        let question_number = match phase {
            GamePhase::Playing { .. } if !session.questions.is_empty() => {
                Some(session.current_index + 1)
            }
            _ => None,
        };
        (
            session.current_round,
            question_number,
            session.questions.len(),
        )
    };

    let payload = PhaseChangedEvent {
        phase: phase.into(),
        round,
        question_number,
        total_questions,
    };
    send_public_event(state, EVENT_PHASE_CHANGED, &payload);
    send_admin_event(state, EVENT_PHASE_CHANGED, &payload);
}

/// Broadcast that a round has started.
pub fn broadcast_round_started(state: &SharedState, round: u32) {
    let payload = RoundStartedEvent { round };
    send_public_event(state, EVENT_ROUND_STARTED, &payload);
    send_admin_event(state, EVENT_ROUND_STARTED, &payload);
}

/// Broadcast a completed round with its cutoff and standings.
pub fn broadcast_round_finished(
    state: &SharedState,
    round: u32,
    cutoff: i32,
    leaderboard: Vec<LeaderboardRow>,
) {
    let payload = RoundFinishedEvent {
        round,
        cutoff,
        leaderboard,
    };
    send_public_event(state, EVENT_ROUND_FINISHED, &payload);
    send_admin_event(state, EVENT_ROUND_FINISHED, &payload);
}

/// Broadcast the sanitized question that just went on display.
pub fn broadcast_new_question(state: &SharedState, view: &QuestionView) {
    send_public_event(state, EVENT_QUESTION_NEW, view);
    send_admin_event(state, EVENT_QUESTION_NEW, view);
}

/// Broadcast the question position within the round.
pub fn broadcast_question_progress(state: &SharedState, question_number: usize, total: usize) {
    #[derive(Serialize)]
    struct Progress {
        question_number: usize,
        total_questions: usize,
    }
    let payload = Progress {
        question_number,
        total_questions: total,
    };
    send_public_event(state, EVENT_QUESTION_PROGRESS, &payload);
    send_admin_event(state, EVENT_QUESTION_PROGRESS, &payload);
}

/// Broadcast that the countdown for the current question expired.
pub fn broadcast_time_up(state: &SharedState) {
    #[derive(Serialize)]
    struct TimeUp {}
    send_public_event(state, EVENT_TIME_UP, &TimeUp {});
    send_admin_event(state, EVENT_TIME_UP, &TimeUp {});
}

/// Broadcast the post-question standings.
pub fn broadcast_leaderboard_update(state: &SharedState, leaderboard: Vec<LeaderboardRow>) {
    let payload = LeaderboardUpdateEvent { leaderboard };
    send_public_event(state, EVENT_LEADERBOARD_UPDATE, &payload);
    send_admin_event(state, EVENT_LEADERBOARD_UPDATE, &payload);
}

/// Broadcast the frozen final standings.
pub fn broadcast_game_finished(state: &SharedState, leaderboard: Vec<LeaderboardRow>) {
    let payload = GameFinishedEvent { leaderboard };
    send_public_event(state, EVENT_GAME_FINISHED, &payload);
    send_admin_event(state, EVENT_GAME_FINISHED, &payload);
}

/// Broadcast that an admin aborted the game back to the lobby.
pub fn broadcast_game_stopped(state: &SharedState) {
    #[derive(Serialize)]
    struct Stopped {}
    send_public_event(state, EVENT_GAME_STOPPED, &Stopped {});
    send_admin_event(state, EVENT_GAME_STOPPED, &Stopped {});
}

/// Broadcast the current roster rows.
pub fn broadcast_lobby_update(state: &SharedState, players: Vec<RosterRow>) {
    let payload = LobbyUpdateEvent { players };
    send_public_event(state, EVENT_LOBBY_UPDATE, &payload);
    send_admin_event(state, EVENT_LOBBY_UPDATE, &payload);
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}

fn send_admin_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.admin_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize admin SSE payload"),
    }
}
