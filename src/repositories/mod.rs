pub mod login_attempt_repository;
pub mod quiz_attempt_repository;
pub mod quiz_repository;
pub mod refresh_token_repository;
pub mod user_repository;

pub use login_attempt_repository::{LoginAttemptRepository, MongoLoginAttemptRepository};
pub use quiz_attempt_repository::{MongoQuizAttemptRepository, QuizAttemptRepository};
pub use quiz_repository::{MongoQuizRepository, QuizFilter, QuizRepository};
pub use refresh_token_repository::{MongoRefreshTokenRepository, RefreshTokenRepository};
pub use user_repository::{MongoUserRepository, UserRepository};
