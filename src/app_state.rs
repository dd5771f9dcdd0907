use std::sync::Arc;

use crate::{
    auth::JwtService,
    config::Config,
    db::Database,
    errors::AppResult,
    repositories::{
        LoginAttemptRepository, MongoLoginAttemptRepository, MongoQuizAttemptRepository,
        MongoQuizRepository, MongoRefreshTokenRepository, MongoUserRepository,
        QuizAttemptRepository, QuizRepository, RefreshTokenRepository, UserRepository,
    },
    services::{
        auth_service::AuthService, login_throttle::LoginThrottle,
        quiz_attempt_service::QuizAttemptService, quiz_service::QuizService,
        user_service::UserService,
    },
};

/// The storage the services are built on.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub quizzes: Arc<dyn QuizRepository>,
    pub attempts: Arc<dyn QuizAttemptRepository>,
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    pub login_attempts: Arc<dyn LoginAttemptRepository>,
}

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub quiz_service: Arc<QuizService>,
    pub attempt_service: Arc<QuizAttemptService>,
    pub jwt_service: Arc<JwtService>,
    pub config: Arc<Config>,
    /// Absent when running over non-Mongo repositories.
    pub db: Option<Database>,
}

impl AppState {
    pub async fn new(config: Config) -> AppResult<Self> {
        let db = Database::connect(&config).await?;

        let user_repository = Arc::new(MongoUserRepository::new(&db));
        user_repository.ensure_indexes().await?;

        let quiz_repository = Arc::new(MongoQuizRepository::new(&db));
        quiz_repository.ensure_indexes().await?;

        let attempt_repository = Arc::new(MongoQuizAttemptRepository::new(&db));
        attempt_repository.ensure_indexes().await?;

        let refresh_token_repository = Arc::new(MongoRefreshTokenRepository::new(&db));
        refresh_token_repository.ensure_indexes().await?;

        let login_attempt_repository = Arc::new(MongoLoginAttemptRepository::new(&db));
        login_attempt_repository.ensure_indexes().await?;

        let repositories = Repositories {
            users: user_repository,
            quizzes: quiz_repository,
            attempts: attempt_repository,
            refresh_tokens: refresh_token_repository,
            login_attempts: login_attempt_repository,
        };

        let mut state = Self::from_repositories(config, repositories);
        state.auth_service.prune_expired_tokens().await?;
        state.auth_service.prune_login_failures().await?;
        state.db = Some(db);

        Ok(state)
    }

    pub fn from_repositories(config: Config, repositories: Repositories) -> Self {
        let jwt_service = Arc::new(JwtService::new(
            &config.jwt_secret,
            config.jwt_expiration_hours,
            config.refresh_expiration_hours,
        ));

        let throttle = Arc::new(LoginThrottle::new(
            repositories.login_attempts.clone(),
            config.login_max_failures,
            config.login_failure_window_secs,
        ));
        let auth_service = Arc::new(AuthService::new(
            repositories.users.clone(),
            repositories.refresh_tokens.clone(),
            jwt_service.clone(),
            throttle,
        ));
        let user_service = Arc::new(UserService::new(
            repositories.users.clone(),
            repositories.quizzes.clone(),
            repositories.attempts.clone(),
        ));
        let quiz_service = Arc::new(QuizService::new(repositories.quizzes.clone()));
        let attempt_service = Arc::new(QuizAttemptService::new(
            repositories.quizzes,
            repositories.attempts,
        ));

        Self {
            auth_service,
            user_service,
            quiz_service,
            attempt_service,
            jwt_service,
            config: Arc::new(config),
            db: None,
        }
    }
}
