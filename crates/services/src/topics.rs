//! Topic find-or-create.
//!
//! Creation is insert-first: the store's unique index on the name decides
//! which of two racing writers wins, and the loser reads back the winner's
//! record. Nothing here looks a name up before inserting it.

use std::sync::Arc;

use domains::{AppError, RepoError, Result, Topic, TopicId, TopicRepository};
use tracing::{debug, instrument};

/// Upper bound on insert/re-read rounds. A second round is only needed when
/// the conflicting topic vanished between the insert and the read.
const MAX_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct TopicResolver {
    topics: Arc<dyn TopicRepository>,
}

impl TopicResolver {
    pub fn new(topics: Arc<dyn TopicRepository>) -> Self {
        Self { topics }
    }

    /// Returns the id of the topic called `name`, creating it on first use.
    #[instrument(skip(self))]
    pub async fn find_or_create(&self, name: &str) -> Result<TopicId> {
        for _ in 0..MAX_ATTEMPTS {
            let candidate = Topic {
                id: TopicId::new(),
                name: name.to_string(),
            };
            match self.topics.insert(&candidate).await {
                Ok(()) => {
                    debug!(topic = %candidate.id, "created topic");
                    return Ok(candidate.id);
                }
                Err(RepoError::Conflict(_)) => {
                    if let Some(existing) = self.topics.find_by_name(name).await? {
                        return Ok(existing.id);
                    }
                }
                Err(other) => return Err(other.into()),
            }
        }
        Err(AppError::Internal(format!(
            "topic {name:?} kept conflicting without a readable winner"
        )))
    }

    /// Whether `id` names an existing topic. Update paths never create.
    pub async fn exists(&self, id: TopicId) -> Result<bool> {
        Ok(self.topics.find_by_id(id).await?.is_some())
    }

    pub async fn find(&self, id: TopicId) -> Result<Option<Topic>> {
        Ok(self.topics.find_by_id(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<Topic>> {
        Ok(self.topics.list().await?)
    }
}
