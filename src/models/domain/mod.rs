pub mod login_failure;
pub mod question;
pub mod quiz;
pub mod quiz_attempt;
pub mod refresh_token;
pub mod user;
pub use login_failure::LoginFailure;
pub use question::{AnswerOption, AnswerType, Question};
pub use quiz::{Quiz, QuizCategory};
pub use quiz_attempt::{AttemptStatus, QuizAttempt, UserAnswer};
pub use refresh_token::RefreshToken;
pub use user::User;
