use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dao::storage::{StorageError, StorageResult};

/// Difficulty tier a question can be filtered on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Stable storage representation used in backend queries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

/// One selectable answer of a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionOptionEntity {
    /// Identifier votes refer to.
    pub id: String,
    /// Text shown to players.
    pub label: String,
}

/// Question record as served by a question store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Stable identifier of the question.
    pub id: String,
    /// Subject the question belongs to (e.g. "history").
    pub subject_id: String,
    /// Question type within the subject (e.g. "multiple_choice").
    pub type_id: String,
    /// Optional difficulty tier.
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    /// Question text.
    pub prompt: String,
    /// Answers teams can vote for.
    pub options: Vec<QuestionOptionEntity>,
    /// Identifier of the correct option.
    pub correct_option_id: String,
    /// Base points awarded to every team answering correctly.
    pub points: u32,
}

impl QuestionEntity {
    /// Whether this record matches the requested subject, type and (optional) difficulty.
    pub fn matches(&self, subject_id: &str, type_id: &str, difficulty: Option<Difficulty>) -> bool {
        self.subject_id == subject_id
            && self.type_id == type_id
            && difficulty.is_none_or(|wanted| self.difficulty == Some(wanted))
    }

    /// Reject records that could never be scored.
    pub fn check(self) -> StorageResult<Self> {
        if self.options.is_empty() {
            return Err(StorageError::invalid_record(self.id, "question has no options"));
        }
        if !self
            .options
            .iter()
            .any(|option| option.id == self.correct_option_id)
        {
            return Err(StorageError::invalid_record(
                self.id,
                format!(
                    "correct option `{}` is not one of the options",
                    self.correct_option_id
                ),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: &str) -> QuestionEntity {
        QuestionEntity {
            id: "q1".into(),
            subject_id: "history".into(),
            type_id: "mcq".into(),
            difficulty: Some(Difficulty::Easy),
            prompt: "Who?".into(),
            options: vec![
                QuestionOptionEntity {
                    id: "a".into(),
                    label: "A".into(),
                },
                QuestionOptionEntity {
                    id: "b".into(),
                    label: "B".into(),
                },
            ],
            correct_option_id: correct.into(),
            points: 10,
        }
    }

    #[test]
    fn matches_ignores_difficulty_when_not_requested() {
        let q = question("a");
        assert!(q.matches("history", "mcq", None));
        assert!(q.matches("history", "mcq", Some(Difficulty::Easy)));
        assert!(!q.matches("history", "mcq", Some(Difficulty::Hard)));
        assert!(!q.matches("science", "mcq", None));
    }

    #[test]
    fn check_rejects_unknown_correct_option() {
        assert!(question("a").check().is_ok());
        let err = question("z").check().unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord { ref id, .. } if id == "q1"));
    }
}
