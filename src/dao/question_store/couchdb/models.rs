use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::dao::models::{Difficulty, QuestionEntity, QuestionOptionEntity};

pub const QUESTION_DOC_TYPE: &str = "question";

/// Upper bound on candidates fetched per lookup; one of them is sampled client-side.
pub const FIND_LIMIT: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchQuestionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    pub subject_id: String,
    pub type_id: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    pub prompt: String,
    pub options: Vec<CouchOptionDocument>,
    pub correct_option_id: String,
    #[serde(default = "default_points")]
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchOptionDocument {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct FindResponse {
    pub docs: Vec<CouchQuestionDocument>,
}

fn default_points() -> u32 {
    10
}

impl CouchQuestionDocument {
    pub fn into_entity(self) -> QuestionEntity {
        QuestionEntity {
            id: self.id,
            subject_id: self.subject_id,
            type_id: self.type_id,
            difficulty: self.difficulty,
            prompt: self.prompt,
            options: self
                .options
                .into_iter()
                .map(|option| QuestionOptionEntity {
                    id: option.id,
                    label: option.label,
                })
                .collect(),
            correct_option_id: self.correct_option_id,
            points: self.points,
        }
    }
}

/// Mango query body selecting questions for a subject/type pair.
pub fn question_selector(subject_id: &str, type_id: &str, difficulty: Option<Difficulty>) -> Value {
    let mut selector = json!({
        "type": QUESTION_DOC_TYPE,
        "subject_id": subject_id,
        "type_id": type_id,
    });
    if let (Some(difficulty), Some(map)) = (difficulty, selector.as_object_mut()) {
        map.insert("difficulty".into(), Value::from(difficulty.as_str()));
    }
    json!({ "selector": selector, "limit": FIND_LIMIT })
}

/// Index definition backing [`question_selector`].
pub fn question_index() -> Value {
    json!({
        "index": { "fields": ["type", "subject_id", "type_id"] },
        "name": "question_lookup_idx",
        "type": "json",
    })
}
