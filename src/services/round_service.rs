//! The round controller: round lifecycle, question pacing, grading
//! orchestration and the engine loop consuming scheduled timer events.
//!
//! Every mutation below runs either inside [`AppState::run_transition`] or
//! under the engine gate, so timer expiry and admin actions share one
//! critical section and grading can only ever fire once per question.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    dto::{
        admin::StartRoundResponse,
        game::{AnswerResult, QuestionView, RoundStatus},
        ws::ServerMessage,
    },
    error::ServiceError,
    services::{leaderboard, scoring, sse_events, websocket_service},
    state::{
        SharedState,
        game::{PlayerStatus, Question, QuestionCycle},
        state_machine::{GameEvent, GamePhase},
        timer::{ScheduledEvent, schedule_after},
        transitions::run_transition_with_broadcast,
    },
};

/// What an attempt to conclude the current question amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcludeOutcome {
    /// The question was graded by this call.
    Graded,
    /// The question had already been graded; nothing happened.
    AlreadyGraded,
    /// The event was stale (epoch mismatch); nothing happened.
    Stale,
}

/// Start round `round`: sequential gating, question loading, roster reset on
/// round 1, then the first question.
pub async fn start_round(
    state: &SharedState,
    round: u32,
) -> Result<StartRoundResponse, ServiceError> {
    let (total_questions, round_epoch) = run_transition_with_broadcast(
        state,
        GameEvent::StartRound(round),
        move || async move {
            {
                let session = state.session().read().await;
                if round > 1 && !session.completed_rounds.contains(&(round - 1)) {
                    return Err(ServiceError::InvalidState(format!(
                        "cannot start round {round} until round {} is completed",
                        round - 1
                    )));
                }
            }

            let store = state.require_question_store().await?;
            let bank = store.load_all().await?;

            let questions = bank
                .into_iter()
                .filter(|entity| entity.level == round)
                .map(|entity| {
                    Question::try_from(entity).map_err(|err| {
                        ServiceError::InvalidState(format!("question bank invalid: {err}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            if questions.is_empty() {
                return Err(ServiceError::NotFound(format!(
                    "no questions found for round {round}"
                )));
            }

            let total = questions.len();

            {
                let mut roster = state.roster().write().await;
                if round == 1 {
                    roster.reset_for_new_game();
                }
                roster.begin_round(round);
            }

            let round_epoch = {
                let mut session = state.session().write().await;
                if round == 1 {
                    session.completed_rounds.clear();
                }
                session.current_round = round;
                session.questions = questions;
                session.current_index = 0;
                session.cycle = QuestionCycle::Graded;
                session.epoch += 1;
                session.epoch
            };

            Ok((total, round_epoch))
        },
    )
    .await?;

    info!(round, total_questions, "round started");
    websocket_service::broadcast_message(state, &ServerMessage::RoundStarted { round });
    sse_events::broadcast_round_started(state, round);
    crate::services::game_service::broadcast_lobby_update(state).await;

    start_question(state, 0, Some(round_epoch)).await;

    Ok(StartRoundResponse {
        round,
        total_questions,
    })
}

/// Admin force: grade the question on display immediately, or jump ahead when
/// it was already graded and the pacing delays are still running.
pub async fn advance_question(state: &SharedState) -> Result<ConcludeOutcome, ServiceError> {
    let GamePhase::Playing { .. } = state.phase().await else {
        return Err(ServiceError::InvalidState(
            "cannot advance: no round is being played".into(),
        ));
    };

    let epoch = {
        let session = state.session().read().await;
        session.epoch
    };

    match conclude_question(state, epoch).await? {
        ConcludeOutcome::Graded => Ok(ConcludeOutcome::Graded),
        ConcludeOutcome::AlreadyGraded => {
            // Mid-pacing: skip the remaining delay and move on now.
            state.cancel_pacing().await;
            advance_or_complete(state, epoch).await?;
            Ok(ConcludeOutcome::AlreadyGraded)
        }
        ConcludeOutcome::Stale => Err(ServiceError::InvalidState(
            "cannot advance: no question is being played".into(),
        )),
    }
}

/// Abort the game back to the lobby from any phase, without grading.
/// Idempotent: stopping an idle lobby succeeds and changes nothing.
pub async fn force_stop(state: &SharedState) -> Result<(), ServiceError> {
    state.cancel_countdown().await;
    state.cancel_pacing().await;

    run_transition_with_broadcast(state, GameEvent::ForceStop, move || async move {
        let mut session = state.session().write().await;
        // Invalidate every scheduled event that is still in flight.
        session.epoch += 1;
        session.cycle = QuestionCycle::Graded;
        Ok(())
    })
    .await?;

    info!("game force-stopped");
    websocket_service::broadcast_message(state, &ServerMessage::GameStopped);
    sse_events::broadcast_game_stopped(state);
    Ok(())
}

/// Engine loop: consumes scheduled timer events and drives the question
/// lifecycle. Spawned once at startup; exits when the channel closes.
pub async fn run_engine(state: SharedState, mut events: mpsc::UnboundedReceiver<ScheduledEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ScheduledEvent::QuestionDeadline { epoch } => {
                match conclude_question(&state, epoch).await {
                    Ok(ConcludeOutcome::Graded) => {}
                    Ok(outcome) => debug!(?outcome, epoch, "deadline ignored"),
                    Err(err) => warn!(error = %err, epoch, "deadline handling failed"),
                }
            }
            ScheduledEvent::LeaderboardReveal { epoch } => {
                reveal_leaderboard(&state, epoch).await;
            }
            ScheduledEvent::NextQuestion { epoch } => {
                if let Err(err) = advance_or_complete(&state, epoch).await {
                    warn!(error = %err, epoch, "question advance failed");
                }
            }
        }
    }

    debug!("engine loop stopped: scheduled event channel closed");
}

/// Put question `index` on display and start its countdown.
///
/// Re-validates phase (and, when given, the epoch) under the engine gate, so
/// a force stop or restart racing this call turns it into a no-op.
async fn start_question(state: &SharedState, index: usize, expected_epoch: Option<u64>) {
    let _gate = state.engine_gate().await;

    if !matches!(state.phase().await, GamePhase::Playing { .. }) {
        debug!(index, "not starting question: no round is playing");
        return;
    }

    let (view, duration, epoch) = {
        let mut session = state.session().write().await;
        if let Some(expected) = expected_epoch {
            if session.epoch != expected {
                debug!(index, expected, actual = session.epoch, "stale question start");
                return;
            }
        }

        let total = session.questions.len();
        let Some(question) = session.questions.get(index) else {
            warn!(index, total, "question index out of range");
            return;
        };
        let view = QuestionView::sanitized(question, index, total);
        let duration = question.timer_secs;

        session.current_index = index;
        session.cycle = QuestionCycle::Asking;
        session.submission_seq = 0;
        session.epoch += 1;
        (view, duration, session.epoch)
    };

    state.cancel_pacing().await;
    state.start_countdown(duration, epoch).await;

    debug!(
        question_number = view.question_number,
        total = view.total_questions,
        duration,
        "question on display"
    );

    websocket_service::broadcast_message(
        state,
        &ServerMessage::QuestionProgress {
            question_number: view.question_number,
            total_questions: view.total_questions,
        },
    );
    sse_events::broadcast_question_progress(state, view.question_number, view.total_questions);
    websocket_service::broadcast_message(state, &ServerMessage::NewQuestion(view.clone()));
    sse_events::broadcast_new_question(state, &view);
}

/// Conclude the question on display: stop the countdown, grade exactly once,
/// deliver private results, snapshot the leaderboard and schedule the reveal
/// and advance delays.
///
/// Whether reached from timer expiry or an admin force, the engine gate plus
/// the cycle flag make a second grading of the same question impossible.
async fn conclude_question(
    state: &SharedState,
    expected_epoch: u64,
) -> Result<ConcludeOutcome, ServiceError> {
    let _gate = state.engine_gate().await;

    let GamePhase::Playing { round } = state.phase().await else {
        return Ok(ConcludeOutcome::Stale);
    };

    let (question, key, epoch) = {
        let mut session = state.session().write().await;
        if session.epoch != expected_epoch {
            return Ok(ConcludeOutcome::Stale);
        }
        if session.cycle == QuestionCycle::Graded {
            return Ok(ConcludeOutcome::AlreadyGraded);
        }

        let question = session
            .current_question()
            .cloned()
            .ok_or_else(|| ServiceError::InvalidState("no question is on display".into()))?;
        session.cycle = QuestionCycle::Graded;
        (question, session.current_key(), session.epoch)
    };

    state.cancel_countdown().await;

    websocket_service::broadcast_message(state, &ServerMessage::TimeUp);
    sse_events::broadcast_time_up(state);

    let ctx = scoring::RuleContext {
        round,
        duration_secs: question.timer_secs,
        speed_bonus_window_secs: state.config().speed_bonus_window_secs(),
    };

    let (results, rows) = {
        let mut roster = state.roster().write().await;
        let results = scoring::grade_question(&question, &ctx, key, roster.players_mut());
        let rows = leaderboard::build(roster.players());

        let deliveries: Vec<_> = results
            .iter()
            .filter_map(|outcome| {
                roster
                    .connection_for(&outcome.roll_number)
                    .map(|connection| (connection, outcome.clone()))
            })
            .collect();
        (deliveries, rows)
    };

    for (connection, outcome) in results {
        websocket_service::send_to_connection(
            state,
            connection,
            &ServerMessage::AnswerResult(AnswerResult {
                correct: outcome.correct,
                points: outcome.points,
                total_score: outcome.total_score,
                speed_bonus: outcome.speed_bonus,
                first_blood: outcome.first_blood,
                penalty: outcome.penalty,
            }),
        );
    }

    {
        let mut session = state.session().write().await;
        session.last_leaderboard = rows;
    }

    let config = state.config();
    let events = state.scheduled_events();
    state
        .track_pacing(schedule_after(
            config.reveal_delay(),
            ScheduledEvent::LeaderboardReveal { epoch },
            events.clone(),
        ))
        .await;
    state
        .track_pacing(schedule_after(
            config.advance_delay(),
            ScheduledEvent::NextQuestion { epoch },
            events,
        ))
        .await;

    info!(round, question_number = key.index + 1, "question graded");
    Ok(ConcludeOutcome::Graded)
}

/// Broadcast the post-question leaderboard once the reveal delay elapsed.
async fn reveal_leaderboard(state: &SharedState, expected_epoch: u64) {
    let _gate = state.engine_gate().await;

    if !matches!(state.phase().await, GamePhase::Playing { .. }) {
        return;
    }

    let rows = {
        let session = state.session().read().await;
        if session.epoch != expected_epoch || session.cycle != QuestionCycle::Graded {
            return;
        }
        session.last_leaderboard.clone()
    };

    let view = leaderboard::broadcast_view(&rows, state.config().leaderboard_broadcast_limit());
    websocket_service::broadcast_message(
        state,
        &ServerMessage::LeaderboardUpdate {
            leaderboard: view.clone(),
        },
    );
    sse_events::broadcast_leaderboard_update(state, view);
}

/// Move to the next question, or complete the round when exhausted.
async fn advance_or_complete(state: &SharedState, expected_epoch: u64) -> Result<(), ServiceError> {
    let next_index = {
        let session = state.session().read().await;
        if session.epoch != expected_epoch || session.cycle != QuestionCycle::Graded {
            debug!(expected_epoch, "stale advance discarded");
            return Ok(());
        }
        let next = session.current_index + 1;
        if next < session.questions.len() {
            Some(next)
        } else {
            None
        }
    };

    match next_index {
        Some(index) => {
            start_question(state, index, Some(expected_epoch)).await;
            Ok(())
        }
        None => complete_round(state, expected_epoch).await,
    }
}

/// Close out the active round: mark it complete, apply the qualification
/// cutoff (waived on the final round) and either return to the between-rounds
/// lobby or finish the game with a frozen leaderboard.
async fn complete_round(state: &SharedState, expected_epoch: u64) -> Result<(), ServiceError> {
    let GamePhase::Playing { round } = state.phase().await else {
        return Ok(());
    };

    let final_round = state.config().final_round();

    if round >= final_round {
        let rows = run_transition_with_broadcast(state, GameEvent::FinishGame, move || async move {
            let mut session = state.session().write().await;
            if session.epoch != expected_epoch {
                return Err(ServiceError::InvalidState("round already advanced".into()));
            }
            session.completed_rounds.insert(round);

            let roster = state.roster().read().await;
            let rows = leaderboard::build(roster.players());
            session.last_leaderboard = rows.clone();
            Ok(rows)
        })
        .await?;

        info!(round, "game finished");
        websocket_service::broadcast_message(
            state,
            &ServerMessage::GameFinished {
                leaderboard: rows.clone(),
            },
        );
        sse_events::broadcast_game_finished(state, rows);
        return Ok(());
    }

    let (cutoff, rows, verdicts) = run_transition_with_broadcast(
        state,
        GameEvent::CompleteRound,
        move || async move {
            let mut session = state.session().write().await;
            if session.epoch != expected_epoch {
                return Err(ServiceError::InvalidState("round already advanced".into()));
            }
            session.completed_rounds.insert(round);
            let cutoff = session.cutoff();

            let mut roster = state.roster().write().await;
            for player in roster.players_mut().values_mut() {
                if player.status == PlayerStatus::Active && player.round_score(round) < cutoff {
                    player.status = PlayerStatus::Spectator;
                }
            }

            let verdicts: Vec<(String, RoundStatus)> = roster
                .players()
                .iter()
                .map(|(roll, player)| {
                    let qualified = player.status == PlayerStatus::Active;
                    let message = if qualified {
                        format!("Qualified for round {}!", round + 1)
                    } else {
                        format!("Below the cutoff ({cutoff}). Spectating from here on.")
                    };
                    (
                        roll.clone(),
                        RoundStatus {
                            qualified,
                            cutoff,
                            round_score: player.round_score(round),
                            message,
                        },
                    )
                })
                .collect();

            let rows = leaderboard::build(roster.players());
            session.last_leaderboard = rows.clone();
            Ok((cutoff, rows, verdicts))
        },
    )
    .await?;

    info!(round, cutoff, "round completed");
    sse_events::broadcast_round_finished(state, round, cutoff, rows.clone());
    websocket_service::broadcast_message(
        state,
        &ServerMessage::LeaderboardUpdate { leaderboard: rows },
    );

    {
        let roster = state.roster().read().await;
        for (roll, verdict) in verdicts {
            if let Some(connection) = roster.connection_for(&roll) {
                websocket_service::send_to_connection(
                    state,
                    connection,
                    &ServerMessage::RoundStatus(verdict),
                );
            }
        }
    }
    crate::services::game_service::broadcast_lobby_update(state).await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{QuestionEntity, QuestionKindEntity},
            question_store::testing::StaticQuestionStore,
        },
        services::game_service,
        state::{AppState, SharedState, game::AnswerPayload, roster::ConnectionId},
    };
    use std::{sync::Arc, time::Duration};
    use uuid::Uuid;

    fn question(level: u32, timer: u32) -> QuestionEntity {
        QuestionEntity {
            id: Uuid::new_v4(),
            level,
            kind: QuestionKindEntity::Mcq,
            text: "pick one".into(),
            timer,
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_answer: Some(0),
            code_snippet: None,
            match_map: None,
        }
    }

    async fn state_with(
        config: AppConfig,
        bank: Vec<QuestionEntity>,
    ) -> (SharedState, tokio::sync::mpsc::UnboundedReceiver<ScheduledEvent>) {
        let (state, events) = AppState::new(config);
        state
            .install_question_store(Arc::new(StaticQuestionStore::new(bank)))
            .await;
        (state, events)
    }

    async fn join(state: &SharedState, roll: &str) -> ConnectionId {
        let conn = Uuid::new_v4();
        game_service::join(state, conn, &format!("Player {roll}"), roll)
            .await
            .unwrap();
        conn
    }

    async fn epoch(state: &SharedState) -> u64 {
        state.session().read().await.epoch
    }

    async fn submit_correct(state: &SharedState, conn: ConnectionId) {
        let question_id = {
            let session = state.session().read().await;
            session.current_question().unwrap().id
        };
        game_service::submit_answer(state, conn, question_id, AnswerPayload::Choice(0))
            .await
            .unwrap();
    }

    async fn score_of(state: &SharedState, roll: &str) -> i32 {
        state.roster().read().await.record(roll).unwrap().score
    }

    async fn status_of(state: &SharedState, roll: &str) -> PlayerStatus {
        state.roster().read().await.record(roll).unwrap().status
    }

    #[tokio::test(start_paused = true)]
    async fn starting_round_two_first_is_a_sequencing_error() {
        let (state, _events) =
            state_with(AppConfig::default(), vec![question(1, 30), question(2, 30)]).await;

        let err = start_round(&state, 2).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        // Nothing moved: still in the lobby with an untouched session.
        assert_eq!(state.phase().await, GamePhase::Lobby);
        let session = state.session().read().await;
        assert_eq!(session.current_round, 0);
        assert!(session.questions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn starting_a_round_with_no_questions_fails_cleanly() {
        let (state, _events) = state_with(AppConfig::default(), vec![question(2, 30)]).await;

        let err = start_round(&state, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(state.phase().await, GamePhase::Lobby);
    }

    #[tokio::test(start_paused = true)]
    async fn grading_fires_exactly_once_per_question() {
        let (state, _events) = state_with(AppConfig::default(), vec![question(1, 300)]).await;
        let conn = join(&state, "P1").await;

        start_round(&state, 1).await.unwrap();
        submit_correct(&state, conn).await;

        let current = epoch(&state).await;

        // Deadline and forced advance race to the same conclusion; only the
        // first one grades.
        assert_eq!(
            conclude_question(&state, current).await.unwrap(),
            ConcludeOutcome::Graded
        );
        assert_eq!(
            conclude_question(&state, current).await.unwrap(),
            ConcludeOutcome::AlreadyGraded
        );

        // A stale deadline from an earlier question cycle is discarded too.
        assert_eq!(
            conclude_question(&state, current - 1).await.unwrap(),
            ConcludeOutcome::Stale
        );

        // Graded once: base point + speed bonus, not doubled.
        assert_eq!(score_of(&state, "P1").await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn round_one_restart_resets_scores_and_statuses() {
        let (state, _events) = state_with(AppConfig::default(), vec![question(1, 300)]).await;
        let conn = join(&state, "P1").await;

        start_round(&state, 1).await.unwrap();
        submit_correct(&state, conn).await;
        conclude_question(&state, epoch(&state).await).await.unwrap();
        assert_eq!(score_of(&state, "P1").await, 2);

        force_stop(&state).await.unwrap();
        start_round(&state, 1).await.unwrap();

        assert_eq!(score_of(&state, "P1").await, 0);
        assert_eq!(status_of(&state, "P1").await, PlayerStatus::Active);
        assert!(state.session().read().await.completed_rounds.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn force_stop_is_idempotent_and_never_grades() {
        let (state, _events) = state_with(AppConfig::default(), vec![question(1, 300)]).await;
        let conn = join(&state, "P1").await;

        // Stopping an idle lobby is fine.
        force_stop(&state).await.unwrap();

        start_round(&state, 1).await.unwrap();
        submit_correct(&state, conn).await;
        let stale = epoch(&state).await;

        force_stop(&state).await.unwrap();
        force_stop(&state).await.unwrap();
        assert_eq!(state.phase().await, GamePhase::Lobby);

        // The in-flight question was never graded, and its deadline is stale.
        assert_eq!(score_of(&state, "P1").await, 0);
        assert_eq!(
            conclude_question(&state, stale).await.unwrap(),
            ConcludeOutcome::Stale
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cutoff_demotes_below_half_but_waives_the_final_round() {
        // Four questions, cutoff 2; round 3 runs without bonuses so the
        // round score equals the number of correct answers.
        let config = AppConfig::default().with_final_round(4);
        let bank = (0..4).map(|_| question(3, 300)).collect();
        let (state, _events) = state_with(config, bank).await;

        let strong = join(&state, "STRONG").await;
        let weak = join(&state, "WEAK").await;

        {
            let mut session = state.session().write().await;
            session.completed_rounds.insert(1);
            session.completed_rounds.insert(2);
        }

        start_round(&state, 3).await.unwrap();

        for index in 0..4usize {
            // STRONG answers the first two questions, WEAK only the first.
            if index < 2 {
                submit_correct(&state, strong).await;
            }
            if index < 1 {
                submit_correct(&state, weak).await;
            }
            let current = epoch(&state).await;
            conclude_question(&state, current).await.unwrap();
            advance_or_complete(&state, current).await.unwrap();
        }

        assert_eq!(state.phase().await, GamePhase::RoundFinished { round: 3 });
        assert!(state.session().read().await.completed_rounds.contains(&3));
        assert_eq!(status_of(&state, "STRONG").await, PlayerStatus::Active);
        assert_eq!(status_of(&state, "WEAK").await, PlayerStatus::Spectator);
    }

    #[tokio::test(start_paused = true)]
    async fn finishing_the_final_round_freezes_the_leaderboard() {
        let config = AppConfig::default().with_final_round(1);
        let (state, _events) = state_with(config, vec![question(1, 300)]).await;
        let conn = join(&state, "P1").await;

        start_round(&state, 1).await.unwrap();
        submit_correct(&state, conn).await;

        let current = epoch(&state).await;
        conclude_question(&state, current).await.unwrap();
        advance_or_complete(&state, current).await.unwrap();

        assert_eq!(state.phase().await, GamePhase::GameFinished);
        let session = state.session().read().await;
        assert_eq!(session.last_leaderboard.len(), 1);
        assert_eq!(session.last_leaderboard[0].roll_number, "P1");
        assert_eq!(session.last_leaderboard[0].score, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_expiry_drives_the_whole_pipeline_through_the_engine() {
        let config = AppConfig::default().with_final_round(1);
        let (state, events) = state_with(config, vec![question(1, 5)]).await;
        tokio::spawn(run_engine(state.clone(), events));

        let conn = join(&state, "P1").await;
        start_round(&state, 1).await.unwrap();
        submit_correct(&state, conn).await;

        // Countdown (5 s) + reveal (3 s) + advance (8 s), plus slack.
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(state.phase().await, GamePhase::GameFinished);
        assert_eq!(score_of(&state, "P1").await, 2);
    }
}
