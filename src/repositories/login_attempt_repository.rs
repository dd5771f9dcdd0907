use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson},
    Collection, IndexModel,
};

use crate::{db::Database, errors::AppResult, models::domain::LoginFailure};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoginAttemptRepository: Send + Sync {
    async fn record_failure(&self, failure: LoginFailure) -> AppResult<()>;
    /// Failure times for `key` at or after `since`, oldest first.
    async fn failures_since(&self, key: &str, since: DateTime<Utc>) -> AppResult<Vec<DateTime<Utc>>>;
    async fn clear(&self, key: &str) -> AppResult<u64>;
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}

pub struct MongoLoginAttemptRepository {
    collection: Collection<LoginFailure>,
}

impl MongoLoginAttemptRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.get_collection("login_failures"),
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let models = vec![
            IndexModel::builder().keys(doc! { "key": 1, "failed_at": 1 }).build(),
            IndexModel::builder().keys(doc! { "failed_at": 1 }).build(),
        ];

        let result = self.collection.create_indexes(models).await?;
        log::info!(
            "Ensured login_failures indexes: {}",
            result.index_names.join(", ")
        );
        Ok(())
    }
}

#[async_trait]
impl LoginAttemptRepository for MongoLoginAttemptRepository {
    async fn record_failure(&self, failure: LoginFailure) -> AppResult<()> {
        self.collection.insert_one(&failure).await?;
        Ok(())
    }

    async fn failures_since(&self, key: &str, since: DateTime<Utc>) -> AppResult<Vec<DateTime<Utc>>> {
        let failures: Vec<LoginFailure> = self
            .collection
            .find(doc! { "key": key, "failed_at": { "$gte": to_bson(&since)? } })
            .sort(doc! { "failed_at": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(failures.into_iter().map(|f| f.failed_at).collect())
    }

    async fn clear(&self, key: &str) -> AppResult<u64> {
        let result = self.collection.delete_many(doc! { "key": key }).await?;
        Ok(result.deleted_count)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = self
            .collection
            .delete_many(doc! { "failed_at": { "$lt": to_bson(&cutoff)? } })
            .await?;

        if result.deleted_count > 0 {
            log::info!("Pruned {} stale login failures", result.deleted_count);
        }
        Ok(result.deleted_count)
    }
}
