use async_trait::async_trait;
use chrono::Utc;
use mongodb::{
    bson::{doc, to_bson},
    options::IndexOptions,
    Collection, IndexModel,
};

use crate::{
    db::{is_duplicate_key, Database},
    errors::{AppError, AppResult},
    models::domain::RefreshToken,
};

/// Server-side ledger of issued refresh tokens, keyed by the token's SHA-256.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    async fn create(&self, token: RefreshToken) -> AppResult<RefreshToken>;
    async fn find_by_token_hash(&self, hash: &str) -> AppResult<Option<RefreshToken>>;
    /// Fails with `NotFound` when no token has this hash.
    async fn revoke_by_token_hash(&self, hash: &str) -> AppResult<()>;
    async fn delete_expired(&self) -> AppResult<u64>;
}

pub struct MongoRefreshTokenRepository {
    collection: Collection<RefreshToken>,
}

impl MongoRefreshTokenRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.get_collection("refresh_tokens"),
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let models = vec![
            IndexModel::builder()
                .keys(doc! { "token_hash": 1 })
                .options(IndexOptions::builder().unique(true).name("token_hash_unique".to_string()).build())
                .build(),
            IndexModel::builder().keys(doc! { "user_id": 1 }).build(),
            IndexModel::builder().keys(doc! { "expires_at": 1 }).build(),
        ];

        let result = self.collection.create_indexes(models).await?;
        log::info!(
            "Ensured refresh_tokens indexes: {}",
            result.index_names.join(", ")
        );
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenRepository for MongoRefreshTokenRepository {
    async fn create(&self, token: RefreshToken) -> AppResult<RefreshToken> {
        match self.collection.insert_one(&token).await {
            Ok(_) => Ok(token),
            Err(err) if is_duplicate_key(&err) => Err(AppError::AlreadyExists(
                "Refresh token already exists".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_token_hash(&self, hash: &str) -> AppResult<Option<RefreshToken>> {
        Ok(self.collection.find_one(doc! { "token_hash": hash }).await?)
    }

    async fn revoke_by_token_hash(&self, hash: &str) -> AppResult<()> {
        let result = self
            .collection
            .update_one(doc! { "token_hash": hash }, doc! { "$set": { "revoked": true } })
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound("Refresh token not found".to_string()));
        }
        Ok(())
    }

    async fn delete_expired(&self) -> AppResult<u64> {
        // chrono timestamps serialize as RFC 3339 strings, which sort chronologically.
        let now = to_bson(&Utc::now())?;
        let result = self
            .collection
            .delete_many(doc! { "expires_at": { "$lt": now } })
            .await?;

        if result.deleted_count > 0 {
            log::info!("Pruned {} expired refresh tokens", result.deleted_count);
        }
        Ok(result.deleted_count)
    }
}
