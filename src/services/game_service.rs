//! Participant-facing operations: joining under a durable identity,
//! reconnection, answer submission and state snapshots.

use std::time::SystemTime;

use crate::{
    dto::{
        self,
        common::RosterRow,
        game::{QuestionView, StateSnapshot},
        validation::{validate_player_name, validate_roll_number},
        ws::ServerMessage,
    },
    error::ServiceError,
    services::{sse_events, websocket_service},
    state::{
        SharedState,
        game::{AnswerPayload, AnswerRecord, PlayerStatus, QuestionCycle},
        roster::{ConnectionId, JoinOutcome},
        state_machine::GamePhase,
    },
};

use uuid::Uuid;

/// Result of a successful join, echoed back to the joining socket.
#[derive(Debug, Clone)]
pub struct JoinedPlayer {
    /// Normalized identity the connection is now bound to.
    pub roll_number: String,
    /// Cumulative score carried over (non-zero only on rebinds).
    pub score: i32,
    /// Status after the join.
    pub status: PlayerStatus,
    /// Round currently in play.
    pub round: u32,
    /// Whether an existing record was rebound rather than created.
    pub rebound: bool,
}

/// Bind `connection` to a (possibly returning) identity.
///
/// Validation failures and identity conflicts reject synchronously without
/// touching the roster. On success the lobby update is broadcast and, when a
/// question is on display, the sanitized question is pushed to the joining
/// socket so late joiners and rebinding players catch up immediately.
pub async fn join(
    state: &SharedState,
    connection: ConnectionId,
    name: &str,
    roll_number: &str,
) -> Result<JoinedPlayer, ServiceError> {
    let name = name.trim().to_string();
    let roll_number = roll_number.trim().to_uppercase();

    validate_player_name(&name).map_err(validation_message)?;
    validate_roll_number(&roll_number).map_err(validation_message)?;

    // A brand-new identity is only a full participant while the game has not
    // moved past the lobby yet; once round 1 has started, newcomers watch.
    let (current_round, question_catchup) = {
        let session = state.session().read().await;
        let catchup = session
            .current_question()
            .map(|question| {
                QuestionView::sanitized(question, session.current_index, session.questions.len())
            });
        (session.current_round, catchup)
    };
    let status_for_new = if current_round >= 1 {
        PlayerStatus::Spectator
    } else {
        PlayerStatus::Active
    };

    let (outcome, joined) = {
        let mut roster = state.roster().write().await;
        let outcome = roster.bind(connection, name, roll_number.clone(), status_for_new)?;
        let record = roster
            .record(&roll_number)
            .expect("record exists right after a successful bind");
        (
            outcome,
            JoinedPlayer {
                roll_number: roll_number.clone(),
                score: record.score,
                status: record.status,
                round: current_round,
                rebound: outcome == JoinOutcome::Rebound,
            },
        )
    };

    tracing::info!(
        roll_number = %joined.roll_number,
        rebound = matches!(outcome, JoinOutcome::Rebound),
        "participant joined"
    );

    broadcast_lobby_update(state).await;

    if matches!(state.phase().await, GamePhase::Playing { .. }) {
        if let Some(view) = question_catchup {
            websocket_service::send_to_connection(
                state,
                connection,
                &ServerMessage::NewQuestion(view),
            );
        }
    }

    Ok(joined)
}

/// Store a submission for the question on display.
///
/// The first accepted submission per player and question wins; anything later
/// is rejected without overwriting. Spectators and eliminated players are
/// turned away here, before any state is touched.
pub async fn submit_answer(
    state: &SharedState,
    connection: ConnectionId,
    question_id: Uuid,
    payload: AnswerPayload,
) -> Result<(), ServiceError> {
    if !matches!(state.phase().await, GamePhase::Playing { .. }) {
        return Err(ServiceError::InvalidState(
            "answers are not being accepted right now".into(),
        ));
    }

    let mut session = state.session().write().await;

    if session.cycle != QuestionCycle::Asking {
        return Err(ServiceError::InvalidState(
            "the submission window for this question has closed".into(),
        ));
    }

    let current = session
        .current_question()
        .ok_or_else(|| ServiceError::InvalidState("no question is on display".into()))?;
    if current.id != question_id {
        return Err(ServiceError::InvalidInput(
            "the submitted question is no longer active".into(),
        ));
    }
    let current_id = current.id;

    let key = session.current_key();
    let time_remaining = state.time_remaining();

    let mut roster = state.roster().write().await;
    let roll_number = roster
        .identity(connection)
        .ok_or_else(|| ServiceError::Unauthorized("join before submitting answers".into()))?
        .to_string();

    let sequence = session.next_submission_seq();
    let record = roster
        .record_mut(&roll_number)
        .ok_or_else(|| ServiceError::Unauthorized("join before submitting answers".into()))?;

    if !record.status.is_active() {
        return Err(ServiceError::InvalidState(
            "spectators cannot submit answers".into(),
        ));
    }

    if record.answers.contains_key(&key) {
        return Err(ServiceError::InvalidState(
            "answer already submitted for this question".into(),
        ));
    }

    record.answers.insert(
        key,
        AnswerRecord {
            question_id: current_id,
            payload,
            submitted_at: SystemTime::now(),
            sequence,
            time_remaining,
        },
    );

    Ok(())
}

/// Drop the live binding for a closed socket, preserving the identity record
/// so the player can reconnect with their score intact.
pub async fn disconnect(state: &SharedState, connection: ConnectionId) {
    let released = {
        let mut roster = state.roster().write().await;
        roster.disconnect(connection)
    };

    if let Some(roll_number) = released {
        tracing::info!(roll_number = %roll_number, "participant disconnected");
        broadcast_lobby_update(state).await;
    }
}

/// Build the full session snapshot served to dashboards and `get_state`.
pub async fn state_snapshot(state: &SharedState) -> StateSnapshot {
    let phase = state.phase().await;
    let session = state.session().read().await;
    let roster = state.roster().read().await;

    let question_number = match phase {
        GamePhase::Playing { .. } if !session.questions.is_empty() => {
            Some(session.current_index + 1)
        }
        _ => None,
    };

    StateSnapshot {
        phase: (&phase).into(),
        current_round: session.current_round,
        question_number,
        total_questions: session.questions.len(),
        time_remaining: state.time_remaining(),
        players: roster.players().values().map(RosterRow::from).collect(),
        generated_at: dto::format_system_time(SystemTime::now()),
    }
}

/// Broadcast the current roster to every participant and SSE subscriber.
pub async fn broadcast_lobby_update(state: &SharedState) {
    let players: Vec<RosterRow> = {
        let roster = state.roster().read().await;
        roster.players().values().map(RosterRow::from).collect()
    };

    websocket_service::broadcast_message(
        state,
        &ServerMessage::LobbyUpdate {
            players: players.clone(),
        },
    );
    sse_events::broadcast_lobby_update(state, players);
}

fn validation_message(err: validator::ValidationError) -> ServiceError {
    let message = err
        .message
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|| "invalid join request".into());
    ServiceError::InvalidInput(message)
}
