use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct QuizAttempt {
    pub id: String,
    pub user_id: String,
    pub quiz_id: String,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub score: f64,
    #[serde(default)]
    pub answers: Vec<UserAnswer>,
}

/// `Started` is the only state covered by the one-active-attempt index.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Started,
    Completed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Started => "started",
            AttemptStatus::Completed => "completed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserAnswer {
    pub question_id: String,
    pub selected_option_ids: Vec<String>,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

impl QuizAttempt {
    pub fn start(user_id: &str, quiz_id: &str) -> Self {
        QuizAttempt {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            quiz_id: quiz_id.to_string(),
            status: AttemptStatus::Started,
            started_at: Utc::now(),
            completed_at: None,
            score: 0.0,
            answers: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == AttemptStatus::Completed
    }
}
