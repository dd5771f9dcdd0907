use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{bson::doc, options::IndexOptions, Collection, IndexModel};

use crate::{
    db::{is_duplicate_key, Database},
    errors::{AppError, AppResult},
    models::domain::{AttemptStatus, QuizAttempt},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizAttemptRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the user already has a started attempt for the quiz.
    async fn create(&self, attempt: QuizAttempt) -> AppResult<QuizAttempt>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<QuizAttempt>>;
    async fn find_active(&self, user_id: &str, quiz_id: &str) -> AppResult<Option<QuizAttempt>>;
    /// Stores a completed attempt only if the stored one is still started.
    /// Returns `false` when another write completed it first.
    async fn complete(&self, attempt: QuizAttempt) -> AppResult<bool>;
    /// Newest first.
    async fn list_by_user(&self, user_id: &str, offset: i64, limit: i64) -> AppResult<(Vec<QuizAttempt>, i64)>;
    /// Number of distinct quizzes the user has at least one completed attempt for.
    async fn count_completed_quizzes(&self, user_id: &str) -> AppResult<u64>;
}

pub struct MongoQuizAttemptRepository {
    collection: Collection<QuizAttempt>,
}

impl MongoQuizAttemptRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("quiz_attempts");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for quiz_attempts collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let active_attempt_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "quiz_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "status": AttemptStatus::Started.as_str() })
                    .name("one_started_attempt_per_user_quiz".to_string())
                    .build(),
            )
            .build();

        let quiz_id_index = IndexModel::builder()
            .keys(doc! { "quiz_id": 1 })
            .options(IndexOptions::builder().name("quiz_id".to_string()).build())
            .build();

        let user_id_index = IndexModel::builder()
            .keys(doc! { "user_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("user_id".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(active_attempt_index).await?;
        self.collection.create_index(quiz_id_index).await?;
        self.collection.create_index(user_id_index).await?;

        log::info!("Successfully created indexes for quiz_attempts collection");
        Ok(())
    }
}

#[async_trait]
impl QuizAttemptRepository for MongoQuizAttemptRepository {
    async fn create(&self, attempt: QuizAttempt) -> AppResult<QuizAttempt> {
        match self.collection.insert_one(&attempt).await {
            Ok(_) => Ok(attempt),
            Err(err) if is_duplicate_key(&err) => Err(AppError::AlreadyExists(
                "An active attempt for this quiz already exists".to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<QuizAttempt>> {
        let attempt = self
            .collection
            .find_one(doc! { "id": id })
            .await?;
        Ok(attempt)
    }

    async fn find_active(&self, user_id: &str, quiz_id: &str) -> AppResult<Option<QuizAttempt>> {
        let attempt = self
            .collection
            .find_one(doc! {
                "user_id": user_id,
                "quiz_id": quiz_id,
                "status": AttemptStatus::Started.as_str(),
            })
            .await?;
        Ok(attempt)
    }

    async fn complete(&self, attempt: QuizAttempt) -> AppResult<bool> {
        let filter = doc! {
            "id": &attempt.id,
            "status": AttemptStatus::Started.as_str(),
        };

        let result = self.collection.replace_one(filter, &attempt).await?;
        Ok(result.matched_count == 1)
    }

    async fn list_by_user(&self, user_id: &str, offset: i64, limit: i64) -> AppResult<(Vec<QuizAttempt>, i64)> {
        let filter = doc! { "user_id": user_id };

        let total = self.collection.count_documents(filter.clone()).await?;

        let attempts = self
            .collection
            .find(filter)
            .sort(doc! { "_id": -1 })
            .skip(offset as u64)
            .limit(limit)
            .await?
            .try_collect()
            .await?;

        Ok((attempts, total as i64))
    }

    async fn count_completed_quizzes(&self, user_id: &str) -> AppResult<u64> {
        let quiz_ids = self
            .collection
            .distinct(
                "quiz_id",
                doc! {
                    "user_id": user_id,
                    "status": AttemptStatus::Completed.as_str(),
                },
            )
            .await?;
        Ok(quiz_ids.len() as u64)
    }
}
