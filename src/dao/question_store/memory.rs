use std::{fs, path::Path, sync::Arc};

use futures::future::BoxFuture;
use rand::seq::IndexedRandom;

use crate::dao::{
    models::{Difficulty, QuestionEntity},
    question_store::QuestionStore,
    storage::{StorageError, StorageResult},
};

/// Question store serving a fixed bank loaded once at startup.
#[derive(Clone, Default)]
pub struct MemoryQuestionStore {
    questions: Arc<Vec<QuestionEntity>>,
}

impl MemoryQuestionStore {
    /// Build a store from already validated records.
    pub fn new(questions: Vec<QuestionEntity>) -> Self {
        Self {
            questions: Arc::new(questions),
        }
    }

    /// Load a JSON array of questions from disk, rejecting malformed records.
    pub fn from_file(path: &Path) -> StorageResult<Self> {
        let contents = fs::read_to_string(path).map_err(|source| {
            StorageError::unavailable(format!("reading `{}`", path.display()), source)
        })?;
        let raw: Vec<QuestionEntity> = serde_json::from_str(&contents).map_err(|source| {
            StorageError::unavailable(format!("parsing `{}`", path.display()), source)
        })?;
        let questions = raw
            .into_iter()
            .map(QuestionEntity::check)
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(Self::new(questions))
    }

    /// Number of questions in the bank.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the bank holds no question at all.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    fn pick(
        &self,
        subject_id: &str,
        type_id: &str,
        difficulty: Option<Difficulty>,
    ) -> Option<QuestionEntity> {
        let candidates = self
            .questions
            .iter()
            .filter(|question| question.matches(subject_id, type_id, difficulty))
            .collect::<Vec<_>>();
        candidates.choose(&mut rand::rng()).map(|q| (*q).clone())
    }
}

impl QuestionStore for MemoryQuestionStore {
    fn find_question(
        &self,
        subject_id: String,
        type_id: String,
        difficulty: Option<Difficulty>,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let found = self.pick(&subject_id, &type_id, difficulty);
        Box::pin(async move { Ok(found) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
