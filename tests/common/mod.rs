#![allow(dead_code, unused_macros)]

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use quizhub_server::{
    app_state::{AppState, Repositories},
    config::Config,
    errors::{AppError, AppResult},
    models::domain::{AttemptStatus, LoginFailure, Quiz, QuizAttempt, RefreshToken, User},
    repositories::{
        quiz_repository::stale_quiz_error, user_repository::stale_user_error, LoginAttemptRepository,
        QuizAttemptRepository, QuizFilter, QuizRepository, RefreshTokenRepository, UserRepository,
    },
};

/// Shared backing store so a quiz delete can cascade like the Mongo transaction does.
/// Vectors keep insertion order, which stands in for `_id` order.
#[derive(Default)]
pub struct InMemoryStore {
    pub users: RwLock<Vec<User>>,
    pub quizzes: RwLock<Vec<Quiz>>,
    pub attempts: RwLock<Vec<QuizAttempt>>,
    pub refresh_tokens: RwLock<Vec<RefreshToken>>,
    pub login_failures: RwLock<Vec<LoginFailure>>,
}

pub struct InMemoryUserRepository(pub Arc<InMemoryStore>);
pub struct InMemoryQuizRepository(pub Arc<InMemoryStore>);
pub struct InMemoryQuizAttemptRepository(pub Arc<InMemoryStore>);
pub struct InMemoryRefreshTokenRepository(pub Arc<InMemoryStore>);
pub struct InMemoryLoginAttemptRepository(pub Arc<InMemoryStore>);

fn page<T: Clone>(items: Vec<T>, offset: i64, limit: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

fn without_questions(quiz: &Quiz) -> Quiz {
    Quiz {
        questions: Vec::new(),
        ..quiz.clone()
    }
}

fn check_unique(users: &[User], candidate: &User) -> AppResult<()> {
    for user in users.iter().filter(|u| u.id != candidate.id) {
        if user.username == candidate.username {
            return Err(AppError::field("username", "A user with that username already exists."));
        }
        if user.email == candidate.email {
            return Err(AppError::field("email", "A user with that email already exists."));
        }
    }
    Ok(())
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> AppResult<User> {
        let mut users = self.0.users.write().await;
        check_unique(&users, &user)?;
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.0.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self
            .0
            .users
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.0.users.read().await.iter().find(|u| u.email == email).cloned())
    }

    async fn update(&self, user: User, loaded_modified_at: DateTime<Utc>) -> AppResult<User> {
        let mut users = self.0.users.write().await;
        check_unique(&users, &user)?;
        let slot = users
            .iter_mut()
            .find(|u| u.id == user.id)
            .ok_or_else(|| AppError::NotFound(format!("User with id '{}' not found", user.id)))?;
        if slot.modified_at != loaded_modified_at {
            return Err(stale_user_error());
        }
        *slot = user.clone();
        Ok(user)
    }
}

#[async_trait]
impl QuizRepository for InMemoryQuizRepository {
    async fn create(&self, quiz: Quiz) -> AppResult<Quiz> {
        let mut quizzes = self.0.quizzes.write().await;
        if quizzes.iter().any(|q| q.id == quiz.id) {
            return Err(AppError::AlreadyExists(format!("Quiz with id '{}' already exists", quiz.id)));
        }
        quizzes.push(quiz.clone());
        Ok(quiz)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Quiz>> {
        Ok(self.0.quizzes.read().await.iter().find(|q| q.id == id).cloned())
    }

    async fn list(&self, filter: QuizFilter, offset: i64, limit: i64) -> AppResult<(Vec<Quiz>, i64)> {
        let quizzes = self.0.quizzes.read().await;
        let matching: Vec<Quiz> = quizzes
            .iter()
            .rev()
            .filter(|q| filter.matches(q))
            .map(without_questions)
            .collect();
        let total = matching.len() as i64;
        Ok((page(matching, offset, limit), total))
    }

    async fn find_many_by_ids(&self, ids: Vec<String>) -> AppResult<Vec<Quiz>> {
        Ok(self
            .0
            .quizzes
            .read()
            .await
            .iter()
            .filter(|q| ids.contains(&q.id))
            .map(without_questions)
            .collect())
    }

    async fn replace(&self, quiz: Quiz, loaded_modified_at: DateTime<Utc>) -> AppResult<Quiz> {
        let mut quizzes = self.0.quizzes.write().await;
        let slot = quizzes
            .iter_mut()
            .find(|q| q.id == quiz.id)
            .ok_or_else(|| AppError::NotFound(format!("Quiz with id '{}' not found", quiz.id)))?;
        if slot.modified_at != loaded_modified_at {
            return Err(stale_quiz_error());
        }
        *slot = quiz.clone();
        Ok(quiz)
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let mut quizzes = self.0.quizzes.write().await;
        let mut attempts = self.0.attempts.write().await;
        let mut users = self.0.users.write().await;

        let before = quizzes.len();
        quizzes.retain(|q| q.id != id);
        if quizzes.len() == before {
            return Err(AppError::NotFound(format!("Quiz with id '{}' not found", id)));
        }

        attempts.retain(|a| a.quiz_id != id);
        let now = Utc::now();
        for user in users.iter_mut().filter(|u| u.favourite_quiz_ids.iter().any(|fav| fav == id)) {
            user.favourite_quiz_ids.retain(|fav| fav != id);
            user.modified_at = now;
        }
        Ok(())
    }
}

#[async_trait]
impl QuizAttemptRepository for InMemoryQuizAttemptRepository {
    async fn create(&self, attempt: QuizAttempt) -> AppResult<QuizAttempt> {
        let mut attempts = self.0.attempts.write().await;
        let clash = attempts.iter().any(|a| {
            a.id == attempt.id
                || (a.status == AttemptStatus::Started
                    && attempt.status == AttemptStatus::Started
                    && a.user_id == attempt.user_id
                    && a.quiz_id == attempt.quiz_id)
        });
        if clash {
            return Err(AppError::AlreadyExists(
                "An active attempt for this quiz already exists".to_string(),
            ));
        }
        attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<QuizAttempt>> {
        Ok(self.0.attempts.read().await.iter().find(|a| a.id == id).cloned())
    }

    async fn find_active(&self, user_id: &str, quiz_id: &str) -> AppResult<Option<QuizAttempt>> {
        Ok(self
            .0
            .attempts
            .read()
            .await
            .iter()
            .find(|a| a.user_id == user_id && a.quiz_id == quiz_id && a.status == AttemptStatus::Started)
            .cloned())
    }

    async fn complete(&self, attempt: QuizAttempt) -> AppResult<bool> {
        let mut attempts = self.0.attempts.write().await;
        match attempts
            .iter_mut()
            .find(|a| a.id == attempt.id && a.status == AttemptStatus::Started)
        {
            Some(slot) => {
                *slot = attempt;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_by_user(&self, user_id: &str, offset: i64, limit: i64) -> AppResult<(Vec<QuizAttempt>, i64)> {
        let attempts = self.0.attempts.read().await;
        let mine: Vec<QuizAttempt> = attempts.iter().rev().filter(|a| a.user_id == user_id).cloned().collect();
        let total = mine.len() as i64;
        Ok((page(mine, offset, limit), total))
    }

    async fn count_completed_quizzes(&self, user_id: &str) -> AppResult<u64> {
        let attempts = self.0.attempts.read().await;
        let quizzes: HashSet<&str> = attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.status == AttemptStatus::Completed)
            .map(|a| a.quiz_id.as_str())
            .collect();
        Ok(quizzes.len() as u64)
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn create(&self, token: RefreshToken) -> AppResult<RefreshToken> {
        let mut tokens = self.0.refresh_tokens.write().await;
        if tokens.iter().any(|t| t.token_hash == token.token_hash) {
            return Err(AppError::AlreadyExists("Refresh token already exists".to_string()));
        }
        tokens.push(token.clone());
        Ok(token)
    }

    async fn find_by_token_hash(&self, hash: &str) -> AppResult<Option<RefreshToken>> {
        Ok(self
            .0
            .refresh_tokens
            .read()
            .await
            .iter()
            .find(|t| t.token_hash == hash)
            .cloned())
    }

    async fn revoke_by_token_hash(&self, hash: &str) -> AppResult<()> {
        let mut tokens = self.0.refresh_tokens.write().await;
        let token = tokens
            .iter_mut()
            .find(|t| t.token_hash == hash)
            .ok_or_else(|| AppError::NotFound("Refresh token not found".to_string()))?;
        token.revoked = true;
        Ok(())
    }

    async fn delete_expired(&self) -> AppResult<u64> {
        let mut tokens = self.0.refresh_tokens.write().await;
        let before = tokens.len();
        let now = Utc::now();
        tokens.retain(|t| t.expires_at >= now);
        Ok((before - tokens.len()) as u64)
    }
}

#[async_trait]
impl LoginAttemptRepository for InMemoryLoginAttemptRepository {
    async fn record_failure(&self, failure: LoginFailure) -> AppResult<()> {
        self.0.login_failures.write().await.push(failure);
        Ok(())
    }

    async fn failures_since(&self, key: &str, since: DateTime<Utc>) -> AppResult<Vec<DateTime<Utc>>> {
        let mut times: Vec<DateTime<Utc>> = self
            .0
            .login_failures
            .read()
            .await
            .iter()
            .filter(|f| f.key == key && f.failed_at >= since)
            .map(|f| f.failed_at)
            .collect();
        times.sort();
        Ok(times)
    }

    async fn clear(&self, key: &str) -> AppResult<u64> {
        let mut failures = self.0.login_failures.write().await;
        let before = failures.len();
        failures.retain(|f| f.key != key);
        Ok((before - failures.len()) as u64)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut failures = self.0.login_failures.write().await;
        let before = failures.len();
        failures.retain(|f| f.failed_at >= cutoff);
        Ok((before - failures.len()) as u64)
    }
}

pub fn repositories(store: &Arc<InMemoryStore>) -> Repositories {
    Repositories {
        users: Arc::new(InMemoryUserRepository(store.clone())),
        quizzes: Arc::new(InMemoryQuizRepository(store.clone())),
        attempts: Arc::new(InMemoryQuizAttemptRepository(store.clone())),
        refresh_tokens: Arc::new(InMemoryRefreshTokenRepository(store.clone())),
        login_attempts: Arc::new(InMemoryLoginAttemptRepository(store.clone())),
    }
}

/// Application state over a fresh in-memory store, returned alongside it for inspection.
pub fn test_state() -> (AppState, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::default());
    let state = AppState::from_repositories(Config::test_config(), repositories(&store));
    (state, store)
}

/// Builds the full application, middleware included, over the given state.
macro_rules! spawn_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($state))
                .wrap(quizhub_server::auth::AuthMiddleware)
                .wrap(quizhub_server::middleware::RequestIdMiddleware)
                .configure(quizhub_server::handlers::configure),
        )
        .await
    };
}

/// Registers `$username` and evaluates to its access token.
macro_rules! register_user {
    ($app:expr, $username:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(serde_json::json!({
                "username": $username,
                "email": format!("{}@example.com", $username),
                "password": "correct-horse-battery",
            }))
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
        let body: serde_json::Value = actix_web::test::read_body_json(resp).await;
        body["access"].as_str().expect("access token").to_string()
    }};
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

/// A valid quiz payload with one single-answer question per title.
pub fn quiz_payload(titles: &[&str]) -> serde_json::Value {
    let questions: Vec<serde_json::Value> = titles
        .iter()
        .map(|title| {
            serde_json::json!({
                "title": title,
                "answer_type": "single",
                "answer_options": [
                    {"text": "right", "is_correct": true},
                    {"text": "wrong", "is_correct": false}
                ]
            })
        })
        .collect();

    serde_json::json!({
        "title": "General knowledge",
        "description": "A little bit of everything",
        "category": "general",
        "is_time_limited": false,
        "questions": questions,
    })
}
