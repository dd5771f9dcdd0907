use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::domain::{AttemptStatus, QuizAttempt, User, UserAnswer};
use crate::models::dto::quiz_dto::{QuizDetailDto, QuizSummaryDto};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub offset: i64,
    pub limit: i64,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDto {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub about: Option<String>,
    pub favourite_quizzes: Vec<QuizSummaryDto>,
    pub completed_quizzes_count: u64,
}

impl ProfileDto {
    pub fn new(user: User, favourite_quizzes: Vec<QuizSummaryDto>, completed_quizzes_count: u64) -> Self {
        ProfileDto {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar: user.avatar,
            about: user.about,
            favourite_quizzes,
            completed_quizzes_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttemptDto {
    pub id: String,
    pub quiz_id: String,
    pub user_id: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub score: f64,
    pub answers: Vec<UserAnswer>,
}

impl From<QuizAttempt> for QuizAttemptDto {
    fn from(attempt: QuizAttempt) -> Self {
        QuizAttemptDto {
            id: attempt.id,
            quiz_id: attempt.quiz_id,
            user_id: attempt.user_id,
            status: attempt.status,
            started_at: attempt.started_at,
            completed_at: attempt.completed_at,
            score: attempt.score,
            answers: attempt.answers,
        }
    }
}

/// Returned when an attempt starts; the quiz snapshot never carries `is_correct`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAttemptResponse {
    pub attempt_id: String,
    pub started_at: DateTime<Utc>,
    pub quiz: QuizDetailDto,
}
