use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::game::{AnswerKey, Question, QuestionKind};

/// Kind discriminator as stored in the question bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKindEntity {
    /// Single-choice question.
    Mcq,
    /// Single-choice question with a code snippet.
    Code,
    /// Matching question.
    Match,
}

/// One question record as persisted in the bank (`data/questions.json`).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEntity {
    /// Stable identifier of the question.
    pub id: Uuid,
    /// Round the question belongs to.
    #[serde(default = "default_level")]
    pub level: u32,
    /// Kind discriminator.
    #[serde(rename = "type")]
    pub kind: QuestionKindEntity,
    /// Prompt text.
    pub text: String,
    /// Countdown duration in seconds.
    #[serde(default = "default_timer")]
    pub timer: u32,
    /// Options shown to participants.
    #[serde(default)]
    pub options: Vec<String>,
    /// Index of the correct option for `mcq`/`code` questions.
    #[serde(default)]
    pub correct_answer: Option<usize>,
    /// Code snippet rendered alongside `code` questions.
    #[serde(default)]
    pub code_snippet: Option<String>,
    /// Expected pairs for `match` questions.
    #[serde(default)]
    pub match_map: Option<IndexMap<String, String>>,
}

fn default_level() -> u32 {
    1
}

fn default_timer() -> u32 {
    30
}

/// Why a persisted question record could not be loaded into a round.
#[derive(Debug, Error)]
pub enum InvalidQuestion {
    /// A choice question is missing its answer index or options.
    #[error("question `{id}` has no valid correct-answer index")]
    MissingChoiceKey {
        /// Offending question.
        id: Uuid,
    },
    /// The answer index points outside the options list.
    #[error("question `{id}` answer index {index} is out of range for {options} options")]
    ChoiceKeyOutOfRange {
        /// Offending question.
        id: Uuid,
        /// Out-of-range index.
        index: usize,
        /// Number of available options.
        options: usize,
    },
    /// A matching question carries no pairs to match.
    #[error("question `{id}` has an empty match map")]
    EmptyMatchMap {
        /// Offending question.
        id: Uuid,
    },
    /// The countdown duration is zero.
    #[error("question `{id}` has a zero-second timer")]
    ZeroTimer {
        /// Offending question.
        id: Uuid,
    },
}

impl TryFrom<QuestionEntity> for Question {
    type Error = InvalidQuestion;

    fn try_from(entity: QuestionEntity) -> Result<Self, Self::Error> {
        if entity.timer == 0 {
            return Err(InvalidQuestion::ZeroTimer { id: entity.id });
        }

        let (kind, key) = match entity.kind {
            QuestionKindEntity::Mcq | QuestionKindEntity::Code => {
                let index = entity
                    .correct_answer
                    .ok_or(InvalidQuestion::MissingChoiceKey { id: entity.id })?;
                if index >= entity.options.len() {
                    return Err(InvalidQuestion::ChoiceKeyOutOfRange {
                        id: entity.id,
                        index,
                        options: entity.options.len(),
                    });
                }
                let kind = match entity.kind {
                    QuestionKindEntity::Code => QuestionKind::CodeSingleChoice,
                    _ => QuestionKind::SingleChoice,
                };
                (kind, AnswerKey::Choice(index))
            }
            QuestionKindEntity::Match => {
                let pairs = entity
                    .match_map
                    .filter(|pairs| !pairs.is_empty())
                    .ok_or(InvalidQuestion::EmptyMatchMap { id: entity.id })?;
                (QuestionKind::Matching, AnswerKey::Matching(pairs))
            }
        };

        Ok(Question {
            id: entity.id,
            level: entity.level,
            kind,
            prompt: entity.text,
            code_snippet: entity.code_snippet,
            options: entity.options,
            timer_secs: entity.timer,
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mcq_entity() -> QuestionEntity {
        QuestionEntity {
            id: Uuid::new_v4(),
            level: 1,
            kind: QuestionKindEntity::Mcq,
            text: "What does `cargo test` run?".into(),
            timer: 30,
            options: vec!["benches".into(), "tests".into()],
            correct_answer: Some(1),
            code_snippet: None,
            match_map: None,
        }
    }

    #[test]
    fn mcq_entity_converts() {
        let question: Question = mcq_entity().try_into().unwrap();
        assert_eq!(question.kind, QuestionKind::SingleChoice);
        assert_eq!(question.key, AnswerKey::Choice(1));
    }

    #[test]
    fn out_of_range_answer_is_rejected() {
        let mut entity = mcq_entity();
        entity.correct_answer = Some(5);
        let err = Question::try_from(entity).unwrap_err();
        assert!(matches!(err, InvalidQuestion::ChoiceKeyOutOfRange { .. }));
    }

    #[test]
    fn match_entity_requires_pairs() {
        let entity = QuestionEntity {
            id: Uuid::new_v4(),
            level: 2,
            kind: QuestionKindEntity::Match,
            text: "Match the tools".into(),
            timer: 45,
            options: vec![],
            correct_answer: None,
            code_snippet: None,
            match_map: Some(IndexMap::new()),
        };
        let err = Question::try_from(entity).unwrap_err();
        assert!(matches!(err, InvalidQuestion::EmptyMatchMap { .. }));
    }

    #[test]
    fn bank_json_round_trips_with_camel_case_fields() {
        let json = r#"{
            "id": "7f2f1e7c-0c4f-4d5a-9d7e-2f3c1b2a4d5e",
            "level": 2,
            "type": "code",
            "text": "What does this print?",
            "timer": 40,
            "options": ["0", "1", "2"],
            "correctAnswer": 2,
            "codeSnippet": "fn main() { println!(\"{}\", 1 + 1); }"
        }"#;

        let entity: QuestionEntity = serde_json::from_str(json).unwrap();
        assert_eq!(entity.kind, QuestionKindEntity::Code);
        assert_eq!(entity.correct_answer, Some(2));

        let question: Question = entity.try_into().unwrap();
        assert_eq!(question.kind, QuestionKind::CodeSingleChoice);
        assert!(question.code_snippet.is_some());
    }
}
