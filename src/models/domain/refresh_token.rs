use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side record of an issued refresh token. Only the hash is stored.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RefreshToken {
    pub id: String, // `jti` claim of the token
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub revoked: bool,
}

impl RefreshToken {
    pub fn new(jti: &str, user_id: &str, token: &str, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: jti.to_string(),
            user_id: user_id.to_string(),
            token_hash: hash_token(token),
            expires_at,
            created_at: Utc::now(),
            revoked: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.revoked && self.expires_at > Utc::now()
    }
}

pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
