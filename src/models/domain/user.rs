use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String, // argon2 PHC string
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub about: Option<String>,
    #[serde(default)]
    pub favourite_quiz_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Bumped by every write; updates are conditional on it.
    pub modified_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: &str, email: &str, password_hash: &str) -> Self {
        let now = Utc::now();
        User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            avatar: None,
            about: None,
            favourite_quiz_ids: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }
}

#[cfg(test)]
impl User {
    pub fn test_user_simple(username: &str) -> Self {
        User::new(username, &format!("{}@example.com", username), "not-a-real-hash")
    }
}
