use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, Document},
    options::IndexOptions,
    Collection, IndexModel,
};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::{Quiz, QuizAttempt, QuizCategory, User},
};

/// Filters for the public quiz listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuizFilter {
    /// Case-insensitive substring over title and description.
    pub search: Option<String>,
    pub category: Option<QuizCategory>,
}

impl QuizFilter {
    /// Plain-Rust counterpart of the Mongo filter, for in-memory stores.
    pub fn matches(&self, quiz: &Quiz) -> bool {
        if let Some(category) = self.category {
            if quiz.category != category {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                quiz.title.to_lowercase().contains(&term)
                    || quiz.description.to_lowercase().contains(&term)
            }
            _ => true,
        }
    }

    fn to_document(&self) -> Document {
        let mut filter = doc! {};

        if let Some(category) = self.category {
            filter.insert("category", category.as_str());
        }

        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = regex::escape(term);
            filter.insert(
                "$or",
                vec![
                    doc! { "title": { "$regex": &pattern, "$options": "i" } },
                    doc! { "description": { "$regex": &pattern, "$options": "i" } },
                ],
            );
        }

        filter
    }
}

/// A concurrent write changed the quiz after it was loaded.
pub fn stale_quiz_error() -> AppError {
    AppError::conflict(
        "The quiz was modified by another request. Reload it and try again.",
        None,
    )
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn create(&self, quiz: Quiz) -> AppResult<Quiz>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Quiz>>;
    /// Summaries only: `questions` is not loaded. Newest first.
    async fn list(&self, filter: QuizFilter, offset: i64, limit: i64) -> AppResult<(Vec<Quiz>, i64)>;
    async fn find_many_by_ids(&self, ids: Vec<String>) -> AppResult<Vec<Quiz>>;
    /// Replaces the whole quiz document, questions included, in one write.
    /// The write only lands while the stored `modified_at` still equals
    /// `loaded_modified_at`; otherwise it fails with a conflict.
    async fn replace(&self, quiz: Quiz, loaded_modified_at: DateTime<Utc>) -> AppResult<Quiz>;
    /// Removes the quiz, its attempts and every favourite reference to it.
    async fn delete(&self, id: &str) -> AppResult<()>;
}

pub struct MongoQuizRepository {
    db: Database,
    collection: Collection<Quiz>,
}

impl MongoQuizRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("quizzes");
        Self {
            db: db.clone(),
            collection,
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for quizzes collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let category_index = IndexModel::builder()
            .keys(doc! { "category": 1 })
            .options(IndexOptions::builder().name("category".to_string()).build())
            .build();

        let creator_index = IndexModel::builder()
            .keys(doc! { "creator_id": 1 })
            .options(IndexOptions::builder().name("creator_id".to_string()).build())
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(category_index).await?;
        self.collection.create_index(creator_index).await?;

        log::info!("Successfully created indexes for quizzes collection");
        Ok(())
    }
}

#[async_trait]
impl QuizRepository for MongoQuizRepository {
    async fn create(&self, quiz: Quiz) -> AppResult<Quiz> {
        self.collection.insert_one(&quiz).await?;
        Ok(quiz)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Quiz>> {
        let quiz = self.collection.find_one(doc! { "id": id }).await?;
        Ok(quiz)
    }

    async fn list(&self, filter: QuizFilter, offset: i64, limit: i64) -> AppResult<(Vec<Quiz>, i64)> {
        let filter = filter.to_document();

        let total = self.collection.count_documents(filter.clone()).await? as i64;

        let items: Vec<Quiz> = self
            .collection
            .find(filter)
            .projection(doc! { "questions": 0 })
            .sort(doc! { "_id": -1 })
            .skip(offset as u64)
            .limit(limit)
            .await?
            .try_collect()
            .await?;

        Ok((items, total))
    }

    async fn find_many_by_ids(&self, ids: Vec<String>) -> AppResult<Vec<Quiz>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let quizzes = self
            .collection
            .find(doc! { "id": { "$in": ids } })
            .projection(doc! { "questions": 0 })
            .await?
            .try_collect()
            .await?;
        Ok(quizzes)
    }

    async fn replace(&self, quiz: Quiz, loaded_modified_at: DateTime<Utc>) -> AppResult<Quiz> {
        let filter = doc! { "id": &quiz.id, "modified_at": to_bson(&loaded_modified_at)? };
        let result = self.collection.replace_one(filter, &quiz).await?;

        if result.matched_count == 0 {
            let exists = self.collection.count_documents(doc! { "id": &quiz.id }).await? > 0;
            return Err(if exists {
                stale_quiz_error()
            } else {
                AppError::NotFound(format!("Quiz with id '{}' not found", quiz.id))
            });
        }

        Ok(quiz)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let attempts = self.db.get_collection::<QuizAttempt>("quiz_attempts");
        let users = self.db.get_collection::<User>("users");

        let mut session = self.db.client().start_session().await?;
        session.start_transaction().await?;

        let outcome: AppResult<u64> = async {
            let deleted = self
                .collection
                .delete_one(doc! { "id": id })
                .session(&mut session)
                .await?;
            if deleted.deleted_count == 0 {
                return Ok(0);
            }

            attempts
                .delete_many(doc! { "quiz_id": id })
                .session(&mut session)
                .await?;
            users
                .update_many(
                    doc! { "favourite_quiz_ids": id },
                    doc! {
                        "$pull": { "favourite_quiz_ids": id },
                        "$set": { "modified_at": to_bson(&Utc::now())? },
                    },
                )
                .session(&mut session)
                .await?;

            Ok(deleted.deleted_count)
        }
        .await;

        match outcome {
            Ok(0) => {
                session.abort_transaction().await?;
                Err(AppError::NotFound(format!("Quiz with id '{}' not found", id)))
            }
            Ok(_) => {
                session.commit_transaction().await?;
                Ok(())
            }
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    log::error!("Failed to abort quiz delete transaction: {}", abort_err);
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz(title: &str, description: &str, category: QuizCategory) -> Quiz {
        Quiz::new(title, description, category, false, None, "user-1", vec![])
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = QuizFilter::default();
        assert!(filter.matches(&quiz("Any", "", QuizCategory::Art)));
        assert!(filter.to_document().is_empty());
    }

    #[test]
    fn search_is_case_insensitive_over_title_and_description() {
        let filter = QuizFilter {
            search: Some("PYTHON".to_string()),
            category: None,
        };
        assert!(filter.matches(&quiz("Learn python", "", QuizCategory::Technology)));
        assert!(filter.matches(&quiz("Snakes", "all about Python", QuizCategory::Science)));
        assert!(!filter.matches(&quiz("Rust", "ownership", QuizCategory::Technology)));
    }

    #[test]
    fn search_and_category_combine() {
        let filter = QuizFilter {
            search: Some("python".to_string()),
            category: Some(QuizCategory::Technology),
        };
        assert!(filter.matches(&quiz("Python basics", "", QuizCategory::Technology)));
        assert!(!filter.matches(&quiz("Python snakes", "", QuizCategory::Science)));

        let document = filter.to_document();
        assert_eq!(document.get_str("category").unwrap(), "technology");
        assert!(document.contains_key("$or"));
    }

    #[test]
    fn search_term_is_escaped_for_regex() {
        let filter = QuizFilter {
            search: Some("c++".to_string()),
            category: None,
        };
        let document = filter.to_document();
        let clauses = document.get_array("$or").unwrap();
        let title = clauses[0].as_document().unwrap().get_document("title").unwrap();
        assert_eq!(title.get_str("$regex").unwrap(), r"c\+\+");
    }
}
