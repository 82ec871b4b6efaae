use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::{
        common::{PlayerStatusDto, RosterRow},
        phase::VisibleGamePhase,
    },
    state::game::{Question, QuestionKind},
};

/// Question kind as exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKindDto {
    /// Single-choice question.
    Mcq,
    /// Single-choice question with a code snippet.
    Code,
    /// Matching question.
    Match,
}

impl From<QuestionKind> for QuestionKindDto {
    fn from(kind: QuestionKind) -> Self {
        match kind {
            QuestionKind::SingleChoice => QuestionKindDto::Mcq,
            QuestionKind::CodeSingleChoice => QuestionKindDto::Code,
            QuestionKind::Matching => QuestionKindDto::Match,
        }
    }
}

/// Sanitized projection of the question on display.
///
/// Built from the runtime [`Question`] with the answer key stripped; this is
/// the only shape in which questions ever leave the server while a round is
/// running.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionView {
    /// Identifier from the question bank.
    pub id: Uuid,
    /// Round this question belongs to.
    pub round: u32,
    /// Kind discriminator.
    pub kind: QuestionKindDto,
    /// Prompt text.
    pub text: String,
    /// Options shown to participants.
    pub options: Vec<String>,
    /// Code snippet, when the question carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
    /// Countdown duration in seconds.
    pub duration_secs: u32,
    /// One-based position within the round.
    pub question_number: usize,
    /// Number of questions in the round.
    pub total_questions: usize,
}

impl QuestionView {
    /// Project `question` for broadcast, never exposing the answer key.
    pub fn sanitized(question: &Question, index: usize, total: usize) -> Self {
        Self {
            id: question.id,
            round: question.level,
            kind: question.kind.into(),
            text: question.prompt.clone(),
            options: question.options.clone(),
            code_snippet: question.code_snippet.clone(),
            duration_secs: question.timer_secs,
            question_number: index + 1,
            total_questions: total,
        }
    }
}

/// One ranked row of a leaderboard snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaderboardRow {
    /// Dense rank: tied scores share a rank, the next distinct score gets
    /// the following one.
    pub rank: u32,
    /// Display name.
    pub name: String,
    /// Durable identity, also the deterministic tie-break key.
    pub roll_number: String,
    /// Cumulative score.
    pub score: i32,
    /// Participation status at snapshot time.
    pub status: PlayerStatusDto,
}

/// Private per-player grading outcome for one question.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AnswerResult {
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
}

/// Per-player qualification outcome announced when a round completes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundStatus {
    /// Whether the player stays active for the next round.
    pub qualified: bool,
    /// Round score required to qualify.
    pub cutoff: i32,
    /// The player's score in the completed round.
    pub round_score: i32,
    /// Human-readable verdict.
    pub message: String,
}

/// Full session snapshot served to dashboards and `get_state` requests.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StateSnapshot {
    /// Current phase.
    pub phase: VisibleGamePhase,
    /// Round currently (or last) in play; `0` before the first start.
    pub current_round: u32,
    /// One-based number of the question on display, when playing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_number: Option<usize>,
    /// Number of questions in the active round.
    pub total_questions: usize,
    /// Seconds left on the countdown.
    pub time_remaining: u32,
    /// Roster rows for every known identity.
    pub players: Vec<RosterRow>,
    /// Snapshot creation time, RFC 3339.
    pub generated_at: String,
}
