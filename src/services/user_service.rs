use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::{
    errors::{AppError, AppResult},
    models::{
        domain::User,
        dto::{quiz_dto::QuizSummaryDto, request::UpdateProfileRequest, response::ProfileDto},
    },
    repositories::{QuizAttemptRepository, QuizRepository, UserRepository},
};

pub struct UserService {
    users: Arc<dyn UserRepository>,
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<dyn QuizAttemptRepository>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        quizzes: Arc<dyn QuizRepository>,
        attempts: Arc<dyn QuizAttemptRepository>,
    ) -> Self {
        Self {
            users,
            quizzes,
            attempts,
        }
    }

    pub async fn get_profile(&self, user_id: &str) -> AppResult<ProfileDto> {
        let user = self.find_user(user_id).await?;
        self.build_profile(user).await
    }

    pub async fn update_profile(&self, user_id: &str, request: UpdateProfileRequest) -> AppResult<ProfileDto> {
        request.validate()?;

        let mut user = self.find_user(user_id).await?;

        if let Some(email) = request.email {
            if email != user.email {
                if let Some(other) = self.users.find_by_email(&email).await? {
                    if other.id != user.id {
                        return Err(AppError::field("email", "A user with that email already exists."));
                    }
                }
                user.email = email;
            }
        }
        if let Some(first_name) = request.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = request.last_name {
            user.last_name = last_name;
        }
        if let Some(avatar) = request.avatar {
            user.avatar = Some(avatar).filter(|a| !a.is_empty());
        }
        if let Some(about) = request.about {
            user.about = Some(about);
        }
        if let Some(ids) = request.favourite_quiz_ids {
            user.favourite_quiz_ids = self.existing_quiz_ids(ids).await?;
        }

        let loaded_modified_at = std::mem::replace(&mut user.modified_at, Utc::now());
        let user = self.users.update(user, loaded_modified_at).await?;
        log::info!("Profile of user {} updated", user.id);

        self.build_profile(user).await
    }

    /// Collapses duplicates and rejects ids that reference no quiz.
    async fn existing_quiz_ids(&self, ids: Vec<String>) -> AppResult<Vec<String>> {
        let mut seen = HashSet::new();
        let ids: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();

        let found: HashSet<String> = self
            .quizzes
            .find_many_by_ids(ids.clone())
            .await?
            .into_iter()
            .map(|quiz| quiz.id)
            .collect();

        if let Some(missing) = ids.iter().find(|id| !found.contains(*id)) {
            return Err(AppError::field(
                "favourite_quiz_ids",
                format!("Invalid pk \"{}\" - object does not exist.", missing),
            ));
        }

        Ok(ids)
    }

    async fn build_profile(&self, user: User) -> AppResult<ProfileDto> {
        let quizzes = self
            .quizzes
            .find_many_by_ids(user.favourite_quiz_ids.clone())
            .await?;
        // Keep the user's own ordering of favourites.
        let favourites = user
            .favourite_quiz_ids
            .iter()
            .filter_map(|id| quizzes.iter().find(|quiz| &quiz.id == id))
            .map(QuizSummaryDto::from)
            .collect();

        let completed = self.attempts.count_completed_quizzes(&user.id).await?;

        Ok(ProfileDto::new(user, favourites, completed))
    }

    async fn find_user(&self, user_id: &str) -> AppResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id '{}' not found", user_id)))
    }
}
