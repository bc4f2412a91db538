use std::sync::Arc;

use futures::future::BoxFuture;
use rand::seq::IndexedRandom;
use reqwest::{Client, Method, StatusCode};
use tracing::debug;

use crate::dao::{
    models::{Difficulty, QuestionEntity},
    question_store::QuestionStore,
    storage::StorageResult,
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchQuestionDocument, FindResponse, question_index, question_selector},
};

/// Question store backed by a CouchDB database queried through Mango `_find`.
#[derive(Clone)]
pub struct CouchQuestionStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchQuestionStore {
    /// Connect to CouchDB, creating the database and lookup index when missing.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        store.ensure_index().await?;
        Ok(store)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.auth {
            Some((ref user, ref pass)) => builder.basic_auth(user.as_ref(), Some(pass.as_ref())),
            None => builder,
        }
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.database_url(), path);
        self.authorize(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn ensure_index(&self) -> CouchResult<()> {
        const INDEX: &str = "_index";
        let response = self
            .request(Method::POST, INDEX)
            .json(&question_index())
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: INDEX.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: INDEX.to_string(),
                status: response.status(),
            })
        }
    }

    async fn find_candidates(
        &self,
        subject_id: &str,
        type_id: &str,
        difficulty: Option<Difficulty>,
    ) -> CouchResult<Vec<CouchQuestionDocument>> {
        const FIND: &str = "_find";
        let response = self
            .request(Method::POST, FIND)
            .json(&question_selector(subject_id, type_id, difficulty))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: FIND.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: FIND.to_string(),
                status: response.status(),
            });
        }

        let payload = response
            .json::<FindResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: FIND.to_string(),
                source,
            })?;
        debug!(
            subject_id,
            type_id,
            candidates = payload.docs.len(),
            "CouchDB question lookup"
        );
        Ok(payload.docs)
    }
}

impl QuestionStore for CouchQuestionStore {
    fn find_question(
        &self,
        subject_id: String,
        type_id: String,
        difficulty: Option<Difficulty>,
    ) -> BoxFuture<'static, StorageResult<Option<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let candidates = store
                .find_candidates(&subject_id, &type_id, difficulty)
                .await?;
            candidates
                .choose(&mut rand::rng())
                .cloned()
                .map(|doc| doc.into_entity().check())
                .transpose()
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
