use serde::{Deserialize, Serialize};

use crate::dao::models::{Difficulty, QuestionEntity, QuestionOptionEntity};

/// Shape of a document in the `questions` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoQuestionDocument {
    #[serde(rename = "_id")]
    id: String,
    subject_id: String,
    type_id: String,
    #[serde(default)]
    difficulty: Option<Difficulty>,
    prompt: String,
    options: Vec<MongoOptionDocument>,
    correct_option_id: String,
    #[serde(default = "default_points")]
    points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoOptionDocument {
    id: String,
    label: String,
}

fn default_points() -> u32 {
    10
}

impl From<MongoQuestionDocument> for QuestionEntity {
    fn from(value: MongoQuestionDocument) -> Self {
        Self {
            id: value.id,
            subject_id: value.subject_id,
            type_id: value.type_id,
            difficulty: value.difficulty,
            prompt: value.prompt,
            options: value
                .options
                .into_iter()
                .map(|option| QuestionOptionEntity {
                    id: option.id,
                    label: option.label,
                })
                .collect(),
            correct_option_id: value.correct_option_id,
            points: value.points,
        }
    }
}
