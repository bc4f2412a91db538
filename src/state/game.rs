use uuid::Uuid;

use crate::dao::models::{Difficulty, QuestionEntity, QuestionOptionEntity};

/// Team playing in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Stable identifier for the room's lifetime.
    pub id: Uuid,
    /// Display name shown to players.
    pub name: String,
    /// Connection IDs of the members, in join order.
    pub members: Vec<Uuid>,
    /// Running score. Only ever increases.
    pub score: u32,
}

impl Team {
    /// Build an empty team with a fresh identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            members: Vec::new(),
            score: 0,
        }
    }

    pub fn has_member(&self, connection_id: &Uuid) -> bool {
        self.members.contains(connection_id)
    }

    /// Remove a member, returning whether they were on the roster.
    pub fn remove_member(&mut self, connection_id: &Uuid) -> bool {
        let before = self.members.len();
        self.members.retain(|member| member != connection_id);
        self.members.len() != before
    }
}

/// Answer choice of the live question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOption {
    pub id: String,
    pub label: String,
}

/// Question currently played in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: String,
    pub subject_id: String,
    pub type_id: String,
    pub difficulty: Option<Difficulty>,
    pub prompt: String,
    pub options: Vec<QuestionOption>,
    pub correct_option_id: String,
    /// Base points for a correct answer.
    pub points: u32,
}

impl Question {
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|option| option.id == option_id)
    }
}

impl From<QuestionOptionEntity> for QuestionOption {
    fn from(value: QuestionOptionEntity) -> Self {
        Self {
            id: value.id,
            label: value.label,
        }
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            subject_id: value.subject_id,
            type_id: value.type_id,
            difficulty: value.difficulty,
            prompt: value.prompt,
            options: value.options.into_iter().map(Into::into).collect(),
            correct_option_id: value.correct_option_id,
            points: value.points,
        }
    }
}
