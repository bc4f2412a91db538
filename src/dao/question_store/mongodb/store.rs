use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Client, Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::MongoQuestionDocument,
};
use crate::dao::{
    models::{Difficulty, QuestionEntity},
    question_store::QuestionStore,
    storage::StorageResult,
};

const QUESTION_COLLECTION_NAME: &str = "questions";

/// Question store backed by a MongoDB `questions` collection.
#[derive(Clone)]
pub struct MongoQuestionStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    // Kept so the connection pool lives as long as the database handle.
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoQuestionStore {
    /// Establish a connection to MongoDB and ensure the lookup index exists.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn collection(&self) -> Collection<MongoQuestionDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoQuestionDocument>(QUESTION_COLLECTION_NAME)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let index = IndexModel::builder()
            .keys(doc! {"subject_id": 1, "type_id": 1, "difficulty": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("question_lookup_idx".to_owned()))
                    .build(),
            )
            .build();

        self.collection()
            .await
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: QUESTION_COLLECTION_NAME,
                index: "subject_id,type_id,difficulty",
                source,
            })?;
        Ok(())
    }

    async fn sample_question(
        &self,
        subject_id: String,
        type_id: String,
        difficulty: Option<Difficulty>,
    ) -> MongoResult<Option<QuestionEntity>> {
        let mut filter = doc! {"subject_id": &subject_id, "type_id": &type_id};
        if let Some(difficulty) = difficulty {
            filter.insert("difficulty", difficulty.as_str());
        }
        let pipeline = vec![doc! {"$match": filter}, doc! {"$sample": {"size": 1}}];

        let to_error = |source| MongoDaoError::FindQuestion {
            subject_id: subject_id.clone(),
            type_id: type_id.clone(),
            source,
        };

        let mut cursor = self
            .collection()
            .await
            .aggregate(pipeline)
            .with_type::<MongoQuestionDocument>()
            .await
            .map_err(to_error)?;

        let document = cursor.try_next().await.map_err(to_error)?;
        Ok(document.map(Into::into))
    }
}

impl QuestionStore for MongoQuestionStore {
    fn find_question(
        &self,
        subject_id: String,
        type_id: String,
        difficulty: Option<Difficulty>,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let found = store
                .sample_question(subject_id, type_id, difficulty)
                .await?;
            found.map(QuestionEntity::check).transpose()
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
