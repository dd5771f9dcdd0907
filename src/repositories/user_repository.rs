use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, to_bson, Document},
    options::{IndexOptions, ReplaceOptions},
    Collection, IndexModel,
};

use crate::{
    db::{is_duplicate_key, Database},
    errors::{AppError, AppResult},
    models::domain::User,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Duplicate usernames or emails fail with a field-scoped error.
    async fn create(&self, user: User) -> AppResult<User>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    /// Replaces the user while the stored `modified_at` still equals
    /// `loaded_modified_at`; a concurrent write makes it fail with a conflict.
    async fn update(&self, user: User, loaded_modified_at: DateTime<Utc>) -> AppResult<User>;
}

pub struct MongoUserRepository {
    collection: Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("users");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        for field in ["id", "username", "email"] {
            let options = IndexOptions::builder()
                .unique(true)
                .name(format!("{}_unique", field))
                .build();
            let mut keys = Document::new();
            keys.insert(field, 1);
            let model = IndexModel::builder()
                .keys(keys)
                .options(options)
                .build();

            self.collection.create_index(model).await?;
            log::info!("Created unique index on users.{}", field);
        }

        Ok(())
    }
}

/// Maps a duplicate-key write to the field whose unique index rejected it.
fn duplicate_user_error(err: &mongodb::error::Error) -> AppError {
    duplicate_field_error(&err.to_string())
}

/// The server names the violated index (`index: email_unique dup key: ...`);
/// the offending value itself may contain any text.
fn duplicate_field_error(message: &str) -> AppError {
    if message.contains("index: email_unique") {
        AppError::field("email", "A user with that email already exists.")
    } else {
        AppError::field("username", "A user with that username already exists.")
    }
}

pub fn stale_user_error() -> AppError {
    AppError::conflict(
        "The profile was modified by another request. Reload it and try again.",
        None,
    )
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn create(&self, user: User) -> AppResult<User> {
        match self.collection.insert_one(&user).await {
            Ok(_) => Ok(user),
            Err(err) if is_duplicate_key(&err) => Err(duplicate_user_error(&err)),
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        let user = self.collection.find_one(doc! { "id": id }).await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = self
            .collection
            .find_one(doc! { "username": username })
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = self.collection.find_one(doc! { "email": email }).await?;
        Ok(user)
    }

    async fn update(&self, user: User, loaded_modified_at: DateTime<Utc>) -> AppResult<User> {
        let filter = doc! { "id": &user.id, "modified_at": to_bson(&loaded_modified_at)? };
        let options = ReplaceOptions::builder().upsert(false).build();

        let result = match self
            .collection
            .replace_one(filter, &user)
            .with_options(options)
            .await
        {
            Ok(result) => result,
            Err(err) if is_duplicate_key(&err) => return Err(duplicate_user_error(&err)),
            Err(err) => return Err(err.into()),
        };

        if result.matched_count == 0 {
            let exists = self.collection.count_documents(doc! { "id": &user.id }).await? > 0;
            return Err(if exists {
                stale_user_error()
            } else {
                AppError::NotFound(format!("User with id '{}' not found", user.id))
            });
        }

        Ok(user)
    }
}
