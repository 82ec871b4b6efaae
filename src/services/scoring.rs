//! The scoring engine: grades every active player's stored submission for a
//! concluded question and applies the round-specific modifier rules.
//!
//! Grading is a pure pass over the roster, invoked exactly once per question
//! from the engine's critical section; it never touches timers or transport.

use std::time::SystemTime;

use indexmap::IndexMap;

use crate::state::game::{AnswerKey, AnswerPayload, Player, Question, QuestionKey};

/// Round carrying the speed bonus.
const SPEED_BONUS_ROUND: u32 = 1;
/// Round carrying the first-blood bonus.
const FIRST_BLOOD_ROUND: u32 = 2;
/// Round carrying negative marking.
const PENALTY_ROUND: u32 = 3;

/// Base points for a correct answer.
const BASE_POINTS: i32 = 1;
/// Extra points for answering within the speed window in round 1.
const SPEED_BONUS_POINTS: i32 = 1;
/// Extra points for the earliest correct answer in round 2.
const FIRST_BLOOD_POINTS: i32 = 2;
/// Deduction for a wrong answer in round 3.
const PENALTY_POINTS: i32 = -2;

/// Rule inputs for grading one question.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext {
    /// Round the question was asked in.
    pub round: u32,
    /// Countdown duration of the question, in seconds.
    pub duration_secs: u32,
    /// Width of the round-1 speed window, in seconds.
    pub speed_bonus_window_secs: u32,
}

/// Grading outcome for one player.
#[derive(Debug, Clone)]
pub struct GradedAnswer {
    /// Identity the outcome belongs to.
    pub roll_number: String,
    /// Whether the stored submission matched the key.
    pub correct: bool,
    /// Point delta applied by this question.
    pub points: i32,
    /// Cumulative score after applying the delta.
    pub total_score: i32,
    /// Round-1 speed bonus was granted.
    pub speed_bonus: bool,
    /// Round-2 first-blood bonus was granted.
    pub first_blood: bool,
    /// Round-3 negative marking was applied.
    pub penalty: bool,
    /// Acceptance order of the submission, for the first-blood pass.
    submitted_order: Option<(SystemTime, u64)>,
}

/// Whether a submitted payload matches the answer key.
///
/// Matching questions are graded all-or-nothing: every key pair must be
/// matched. A payload of the wrong shape is simply wrong.
pub fn is_correct(key: &AnswerKey, payload: &AnswerPayload) -> bool {
    match (key, payload) {
        (AnswerKey::Choice(expected), AnswerPayload::Choice(submitted)) => submitted == expected,
        (AnswerKey::Matching(pairs), AnswerPayload::Matching(submitted)) => pairs
            .iter()
            .all(|(left, right)| submitted.get(left) == Some(right)),
        _ => false,
    }
}

/// Grade `question` against every active player's stored submission and
/// apply the resulting deltas to cumulative and round scores.
///
/// Spectators and eliminated players are skipped entirely, even when a stray
/// record exists for them. Returns one outcome per active player, in roster
/// order, so the caller can deliver private results.
pub fn grade_question(
    question: &Question,
    ctx: &RuleContext,
    key: QuestionKey,
    players: &mut IndexMap<String, Player>,
) -> Vec<GradedAnswer> {
    let mut results: Vec<GradedAnswer> = Vec::new();

    for (roll_number, player) in players.iter() {
        if !player.status.is_active() {
            continue;
        }

        let mut outcome = GradedAnswer {
            roll_number: roll_number.clone(),
            correct: false,
            points: 0,
            total_score: player.score,
            speed_bonus: false,
            first_blood: false,
            penalty: false,
            submitted_order: None,
        };

        if let Some(record) = player.answers.get(&key) {
            outcome.submitted_order = Some((record.submitted_at, record.sequence));
            outcome.correct = is_correct(&question.key, &record.payload);

            if outcome.correct {
                outcome.points += BASE_POINTS;
                if ctx.round == SPEED_BONUS_ROUND {
                    let elapsed = ctx.duration_secs.saturating_sub(record.time_remaining);
                    if elapsed <= ctx.speed_bonus_window_secs {
                        outcome.points += SPEED_BONUS_POINTS;
                        outcome.speed_bonus = true;
                    }
                }
            } else if ctx.round == PENALTY_ROUND {
                outcome.points += PENALTY_POINTS;
                outcome.penalty = true;
            }
        }

        results.push(outcome);
    }

    if ctx.round == FIRST_BLOOD_ROUND {
        let winner = results
            .iter()
            .enumerate()
            .filter(|(_, outcome)| outcome.correct)
            .filter_map(|(position, outcome)| outcome.submitted_order.map(|order| (position, order)))
            .min_by_key(|&(_, order)| order)
            .map(|(position, _)| position);

        if let Some(position) = winner {
            results[position].points += FIRST_BLOOD_POINTS;
            results[position].first_blood = true;
        }
    }

    for outcome in &mut results {
        if let Some(player) = players.get_mut(&outcome.roll_number) {
            player.score += outcome.points;
            *player.round_scores.entry(ctx.round).or_insert(0) += outcome.points;
            outcome.total_score = player.score;
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::{AnswerRecord, PlayerStatus, QuestionKind};
    use std::time::Duration;
    use uuid::Uuid;

    fn choice_question(level: u32, correct: usize) -> Question {
        Question {
            id: Uuid::new_v4(),
            level,
            kind: QuestionKind::SingleChoice,
            prompt: "pick one".into(),
            code_snippet: None,
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            timer_secs: 30,
            key: AnswerKey::Choice(correct),
        }
    }

    fn ctx(round: u32) -> RuleContext {
        RuleContext {
            round,
            duration_secs: 30,
            speed_bonus_window_secs: 5,
        }
    }

    fn key(round: u32) -> QuestionKey {
        QuestionKey { round, index: 0 }
    }

    fn player_with_answer(
        roll: &str,
        status: PlayerStatus,
        question: &Question,
        round: u32,
        payload: AnswerPayload,
        submitted_at: SystemTime,
        sequence: u64,
        time_remaining: u32,
    ) -> (String, Player) {
        let mut player = Player::new(format!("Player {roll}"), roll.into(), status);
        player.answers.insert(
            key(round),
            AnswerRecord {
                question_id: question.id,
                payload,
                submitted_at,
                sequence,
                time_remaining,
            },
        );
        (roll.into(), player)
    }

    fn silent_player(roll: &str, status: PlayerStatus) -> (String, Player) {
        (
            roll.into(),
            Player::new(format!("Player {roll}"), roll.into(), status),
        )
    }

    fn result_for<'a>(results: &'a [GradedAnswer], roll: &str) -> &'a GradedAnswer {
        results
            .iter()
            .find(|outcome| outcome.roll_number == roll)
            .unwrap()
    }

    #[test]
    fn round_one_speed_bonus_applies_within_five_seconds() {
        let question = choice_question(1, 2);
        let now = SystemTime::now();
        let mut players: IndexMap<String, Player> = [
            // 30 - 25 = 5 seconds elapsed: inside the window.
            player_with_answer(
                "FAST1",
                PlayerStatus::Active,
                &question,
                1,
                AnswerPayload::Choice(2),
                now,
                0,
                25,
            ),
            // 30 - 24 = 6 seconds elapsed: outside the window.
            player_with_answer(
                "SLOW1",
                PlayerStatus::Active,
                &question,
                1,
                AnswerPayload::Choice(2),
                now,
                1,
                24,
            ),
        ]
        .into_iter()
        .collect();

        let results = grade_question(&question, &ctx(1), key(1), &mut players);

        let fast = result_for(&results, "FAST1");
        assert!(fast.correct && fast.speed_bonus);
        assert_eq!(fast.points, 2);

        let slow = result_for(&results, "SLOW1");
        assert!(slow.correct && !slow.speed_bonus);
        assert_eq!(slow.points, 1);

        assert_eq!(players["FAST1"].score, 2);
        assert_eq!(players["FAST1"].round_score(1), 2);
        assert_eq!(players["SLOW1"].score, 1);
    }

    #[test]
    fn round_two_first_blood_has_exactly_one_winner() {
        let question = choice_question(2, 0);
        let t0 = SystemTime::now();
        let mut players: IndexMap<String, Player> = [
            player_with_answer(
                "P3",
                PlayerStatus::Active,
                &question,
                2,
                AnswerPayload::Choice(0),
                t0 + Duration::from_millis(900),
                2,
                10,
            ),
            player_with_answer(
                "P1",
                PlayerStatus::Active,
                &question,
                2,
                AnswerPayload::Choice(0),
                t0 + Duration::from_millis(100),
                0,
                28,
            ),
            player_with_answer(
                "P2",
                PlayerStatus::Active,
                &question,
                2,
                AnswerPayload::Choice(0),
                t0 + Duration::from_millis(500),
                1,
                20,
            ),
        ]
        .into_iter()
        .collect();

        let results = grade_question(&question, &ctx(2), key(2), &mut players);

        assert!(result_for(&results, "P1").first_blood);
        assert_eq!(result_for(&results, "P1").points, 3);
        assert_eq!(result_for(&results, "P2").points, 1);
        assert_eq!(result_for(&results, "P3").points, 1);
        assert_eq!(
            results.iter().filter(|outcome| outcome.first_blood).count(),
            1
        );
    }

    #[test]
    fn first_blood_timestamp_ties_break_by_acceptance_order() {
        let question = choice_question(2, 0);
        let now = SystemTime::now();
        let mut players: IndexMap<String, Player> = [
            player_with_answer(
                "LATER",
                PlayerStatus::Active,
                &question,
                2,
                AnswerPayload::Choice(0),
                now,
                1,
                20,
            ),
            player_with_answer(
                "FIRST",
                PlayerStatus::Active,
                &question,
                2,
                AnswerPayload::Choice(0),
                now,
                0,
                20,
            ),
        ]
        .into_iter()
        .collect();

        let results = grade_question(&question, &ctx(2), key(2), &mut players);
        assert!(result_for(&results, "FIRST").first_blood);
        assert!(!result_for(&results, "LATER").first_blood);
    }

    #[test]
    fn round_three_penalises_wrong_answers_but_not_silence() {
        let question = choice_question(3, 1);
        let now = SystemTime::now();
        let mut players: IndexMap<String, Player> = [
            player_with_answer(
                "WRONG",
                PlayerStatus::Active,
                &question,
                3,
                AnswerPayload::Choice(3),
                now,
                0,
                15,
            ),
            silent_player("QUIET", PlayerStatus::Active),
            player_with_answer(
                "RIGHT",
                PlayerStatus::Active,
                &question,
                3,
                AnswerPayload::Choice(1),
                now,
                1,
                15,
            ),
        ]
        .into_iter()
        .collect();

        let results = grade_question(&question, &ctx(3), key(3), &mut players);

        let wrong = result_for(&results, "WRONG");
        assert!(wrong.penalty);
        assert_eq!(wrong.points, -2);
        assert_eq!(players["WRONG"].score, -2);

        let quiet = result_for(&results, "QUIET");
        assert!(!quiet.penalty);
        assert_eq!(quiet.points, 0);

        assert_eq!(result_for(&results, "RIGHT").points, 1);
    }

    #[test]
    fn spectators_and_eliminated_players_are_never_graded() {
        let question = choice_question(3, 0);
        let now = SystemTime::now();
        let mut players: IndexMap<String, Player> = [
            player_with_answer(
                "GHOST",
                PlayerStatus::Spectator,
                &question,
                3,
                AnswerPayload::Choice(3),
                now,
                0,
                15,
            ),
            player_with_answer(
                "GONE",
                PlayerStatus::Eliminated,
                &question,
                3,
                AnswerPayload::Choice(0),
                now,
                1,
                15,
            ),
        ]
        .into_iter()
        .collect();

        let results = grade_question(&question, &ctx(3), key(3), &mut players);
        assert!(results.is_empty());
        assert_eq!(players["GHOST"].score, 0);
        assert_eq!(players["GONE"].score, 0);
    }

    #[test]
    fn matching_is_all_or_nothing() {
        let pairs: IndexMap<String, String> = [
            ("Rust".to_string(), "cargo".to_string()),
            ("Node".to_string(), "npm".to_string()),
        ]
        .into_iter()
        .collect();
        let key = AnswerKey::Matching(pairs.clone());

        assert!(is_correct(&key, &AnswerPayload::Matching(pairs.clone())));

        let partial: IndexMap<String, String> =
            [("Rust".to_string(), "cargo".to_string())].into_iter().collect();
        assert!(!is_correct(&key, &AnswerPayload::Matching(partial)));

        let scrambled: IndexMap<String, String> = [
            ("Rust".to_string(), "npm".to_string()),
            ("Node".to_string(), "cargo".to_string()),
        ]
        .into_iter()
        .collect();
        assert!(!is_correct(&key, &AnswerPayload::Matching(scrambled)));

        // Payload of the wrong shape is simply wrong.
        assert!(!is_correct(&key, &AnswerPayload::Choice(0)));
    }
}
