use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::domain::question::Question;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: QuizCategory,
    pub is_time_limited: bool,
    /// Allowed duration in seconds; required when `is_time_limited` is set.
    #[serde(default)]
    pub time_limit: Option<u32>,
    pub creator_id: String, // Immutable after creation
    /// Ordered by `order`, 1..N. Left out of list projections.
    #[serde(default)]
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, Copy)]
#[serde(rename_all = "lowercase")]
pub enum QuizCategory {
    #[default]
    General,
    Science,
    History,
    Geography,
    Technology,
    Literature,
    Art,
    Sports,
    Other,
}

impl QuizCategory {
    pub const ALL: [QuizCategory; 9] = [
        QuizCategory::General,
        QuizCategory::Science,
        QuizCategory::History,
        QuizCategory::Geography,
        QuizCategory::Technology,
        QuizCategory::Literature,
        QuizCategory::Art,
        QuizCategory::Sports,
        QuizCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuizCategory::General => "general",
            QuizCategory::Science => "science",
            QuizCategory::History => "history",
            QuizCategory::Geography => "geography",
            QuizCategory::Technology => "technology",
            QuizCategory::Literature => "literature",
            QuizCategory::Art => "art",
            QuizCategory::Sports => "sports",
            QuizCategory::Other => "other",
        }
    }
}

impl fmt::Display for QuizCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuizCategory {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        QuizCategory::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| {
                AppError::field(
                    "category",
                    format!("Select a valid choice. '{}' is not one of the available choices.", value),
                )
            })
    }
}

impl Quiz {
    pub fn new(
        title: &str,
        description: &str,
        category: QuizCategory,
        is_time_limited: bool,
        time_limit: Option<u32>,
        creator_id: &str,
        questions: Vec<Question>,
    ) -> Self {
        let now = Utc::now();
        Quiz {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: description.to_string(),
            category,
            is_time_limited,
            time_limit,
            creator_id: creator_id.to_string(),
            questions,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}
