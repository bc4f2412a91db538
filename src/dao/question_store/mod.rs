#[cfg(feature = "couch-store")]
pub mod couchdb;
mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

pub use memory::MemoryQuestionStore;

use crate::dao::models::{Difficulty, QuestionEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the question bank the rooms draw their questions from.
///
/// Populating the bank is out of scope for this service: implementations only
/// need to answer lookups and report their own health.
pub trait QuestionStore: Send + Sync {
    /// Return one question matching the subject, type and (optional) difficulty.
    ///
    /// When several questions match, backends pick one at random.
    fn find_question(
        &self,
        subject_id: String,
        type_id: String,
        difficulty: Option<Difficulty>,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
