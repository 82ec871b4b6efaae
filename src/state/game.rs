use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dto::game::LeaderboardRow;

/// Stable identifier of a question inside the question bank.
pub type QuestionId = Uuid;

/// The kind of answer a question expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    /// Pick one option by index.
    SingleChoice,
    /// Pick one option by index, with an attached code snippet.
    CodeSingleChoice,
    /// Match every left-hand term with its right-hand counterpart.
    Matching,
}

/// Answer key for a question. Never serialized towards participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKey {
    /// Index of the correct option.
    Choice(usize),
    /// Expected left-to-right pairs for a matching question.
    Matching(IndexMap<String, String>),
}

/// Runtime representation of a question loaded into a round.
///
/// Immutable once the round has started; the engine only reads from it.
#[derive(Debug, Clone)]
pub struct Question {
    /// Identifier from the question bank.
    pub id: QuestionId,
    /// Round this question belongs to.
    pub level: u32,
    /// What kind of answer this question expects.
    pub kind: QuestionKind,
    /// Prompt text shown to participants.
    pub prompt: String,
    /// Optional code snippet rendered alongside the prompt.
    pub code_snippet: Option<String>,
    /// Options shown to participants (left-hand terms for matching questions).
    pub options: Vec<String>,
    /// Countdown duration in seconds.
    pub timer_secs: u32,
    /// The answer key this question is graded against.
    pub key: AnswerKey,
}

/// Raw answer payload as submitted by a participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerPayload {
    /// Selected option index for choice questions.
    Choice(usize),
    /// Submitted left-to-right pairs for matching questions.
    Matching(IndexMap<String, String>),
}

/// Key identifying one question slot within a game (round number + position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuestionKey {
    /// Round the question was asked in.
    pub round: u32,
    /// Zero-based position within that round.
    pub index: usize,
}

/// A participant's accepted submission for one question.
///
/// At most one record exists per player and question key; later submissions
/// are rejected, never overwritten.
#[derive(Debug, Clone)]
pub struct AnswerRecord {
    /// Question the payload was submitted against.
    pub question_id: QuestionId,
    /// The raw submitted payload.
    pub payload: AnswerPayload,
    /// Wall-clock acceptance time, used for first-blood ordering.
    pub submitted_at: SystemTime,
    /// Monotonic per-question acceptance counter, breaks timestamp ties.
    pub sequence: u64,
    /// Seconds left on the countdown when the submission was accepted.
    pub time_remaining: u32,
}

/// Participation status of a player within the current game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Scores and may submit answers.
    Active,
    /// Receives every broadcast but never scores again (late joiner or
    /// demoted below the qualification cutoff).
    Spectator,
    /// Removed from competition; kept for exported snapshots.
    Eliminated,
}

impl PlayerStatus {
    /// Whether the scoring engine considers this player at all.
    pub fn is_active(self) -> bool {
        matches!(self, PlayerStatus::Active)
    }
}

/// Durable per-identity record tracked for the lifetime of a game.
#[derive(Debug, Clone)]
pub struct Player {
    /// Display name provided at join time.
    pub name: String,
    /// Durable identity (uppercase alphanumeric roll number).
    pub roll_number: String,
    /// Cumulative score, reset only when round 1 starts.
    pub score: i32,
    /// Score earned per round, keyed by round number.
    pub round_scores: HashMap<u32, i32>,
    /// Current participation status.
    pub status: PlayerStatus,
    /// Accepted submissions, at most one per question key.
    pub answers: HashMap<QuestionKey, AnswerRecord>,
    /// When this identity first joined.
    pub joined_at: SystemTime,
}

impl Player {
    /// Create a fresh record for a first-time joiner.
    pub fn new(name: String, roll_number: String, status: PlayerStatus) -> Self {
        Self {
            name,
            roll_number,
            score: 0,
            round_scores: HashMap::new(),
            status,
            answers: HashMap::new(),
            joined_at: SystemTime::now(),
        }
    }

    /// Score earned so far in the given round.
    pub fn round_score(&self, round: u32) -> i32 {
        self.round_scores.get(&round).copied().unwrap_or(0)
    }
}

/// Lifecycle of the question currently on display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionCycle {
    /// Countdown running, submissions accepted.
    Asking,
    /// Graded; waiting out the leaderboard reveal and advance delays.
    Graded,
}

/// Mutable quiz-session data owned by the engine alongside the state machine.
#[derive(Debug)]
pub struct GameSession {
    /// Round currently (or last) in play; `0` before the first start.
    pub current_round: u32,
    /// Questions of the active round, in authoritative order.
    pub questions: Vec<Question>,
    /// Zero-based index of the question on display.
    pub current_index: usize,
    /// Where the current question is in its lifecycle.
    pub cycle: QuestionCycle,
    /// Rounds that ran to completion since the last full reset.
    pub completed_rounds: HashSet<u32>,
    /// Generation counter guarding scheduled events against stale timers.
    pub epoch: u64,
    /// Monotonic acceptance counter for the current question.
    pub submission_seq: u64,
    /// Most recent full leaderboard snapshot, retained after game end.
    pub last_leaderboard: Vec<LeaderboardRow>,
}

impl Default for GameSession {
    fn default() -> Self {
        Self {
            current_round: 0,
            questions: Vec::new(),
            current_index: 0,
            cycle: QuestionCycle::Graded,
            completed_rounds: HashSet::new(),
            epoch: 0,
            submission_seq: 0,
            last_leaderboard: Vec::new(),
        }
    }
}

impl GameSession {
    /// The question currently on display, if a round is loaded.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    /// Key of the question currently on display.
    pub fn current_key(&self) -> QuestionKey {
        QuestionKey {
            round: self.current_round,
            index: self.current_index,
        }
    }

    /// Hand out the next submission sequence number.
    pub fn next_submission_seq(&mut self) -> u64 {
        let seq = self.submission_seq;
        self.submission_seq += 1;
        seq
    }

    /// Qualification cutoff for the active round: half the question count,
    /// rounded up.
    pub fn cutoff(&self) -> i32 {
        (self.questions.len() as i32 + 1) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_rounds_up() {
        let mut session = GameSession::default();
        let template = Question {
            id: Uuid::new_v4(),
            level: 1,
            kind: QuestionKind::SingleChoice,
            prompt: "p".into(),
            code_snippet: None,
            options: vec!["a".into(), "b".into()],
            timer_secs: 30,
            key: AnswerKey::Choice(0),
        };

        session.questions = vec![template.clone(); 4];
        assert_eq!(session.cutoff(), 2);

        session.questions = vec![template.clone(); 5];
        assert_eq!(session.cutoff(), 3);

        session.questions = vec![template; 1];
        assert_eq!(session.cutoff(), 1);
    }

    #[test]
    fn submission_sequence_is_monotonic() {
        let mut session = GameSession::default();
        assert_eq!(session.next_submission_seq(), 0);
        assert_eq!(session.next_submission_seq(), 1);
        assert_eq!(session.next_submission_seq(), 2);
    }
}
