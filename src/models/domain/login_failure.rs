use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One failed login, recorded once per throttle key (`user:<name>` or `ip:<addr>`).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoginFailure {
    pub id: String,
    pub key: String,
    pub failed_at: DateTime<Utc>,
}

impl LoginFailure {
    pub fn new(key: &str, failed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            key: key.to_string(),
            failed_at,
        }
    }
}
