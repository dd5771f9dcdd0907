use std::sync::Arc;

use chrono::{Duration, Utc};
use validator::Validate;

use crate::{
    auth::{password, JwtService},
    errors::{AppError, AppResult, FieldErrors},
    models::{
        domain::{refresh_token::hash_token, RefreshToken, User},
        dto::request::{LoginRequest, RegisterRequest},
    },
    repositories::{RefreshTokenRepository, UserRepository},
    services::login_throttle::LoginThrottle,
};

/// Access token for the response body plus the refresh token for the cookie.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access: String,
    pub refresh: String,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    jwt: Arc<JwtService>,
    throttle: Arc<LoginThrottle>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        refresh_tokens: Arc<dyn RefreshTokenRepository>,
        jwt: Arc<JwtService>,
        throttle: Arc<LoginThrottle>,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            jwt,
            throttle,
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> AppResult<IssuedTokens> {
        request.validate()?;

        let mut fields = FieldErrors::new();
        if self.users.find_by_username(&request.username).await?.is_some() {
            fields
                .entry("username".to_string())
                .or_default()
                .push("A user with that username already exists.".to_string());
        }
        if self.users.find_by_email(&request.email).await?.is_some() {
            fields
                .entry("email".to_string())
                .or_default()
                .push("A user with that email already exists.".to_string());
        }
        if !fields.is_empty() {
            return Err(AppError::InvalidFields(fields));
        }

        let password_hash = password::hash_password(&request.password).await?;
        let user = self
            .users
            .create(User::new(&request.username, &request.email, &password_hash))
            .await?;

        log::info!("Registered user {} ({})", user.username, user.id);
        self.issue_tokens(&user).await
    }

    /// Throttled per username and per `client_ip`; a refused login never checks the password.
    pub async fn login(&self, request: LoginRequest, client_ip: Option<&str>) -> AppResult<IssuedTokens> {
        request.validate()?;
        self.throttle.check(&request.username, client_ip).await?;

        let user = self.users.find_by_username(&request.username).await?;
        let verified = match &user {
            Some(user) => password::verify_password(&request.password, &user.password_hash).await?,
            None => {
                password::verify_dummy(&request.password).await?;
                false
            }
        };

        let user = match user {
            Some(user) if verified => user,
            _ => {
                log::warn!("Failed login attempt for username '{}'", request.username);
                self.throttle.record_failure(&request.username, client_ip).await?;
                return Err(AppError::Unauthorized(
                    "No active account found with the given credentials".to_string(),
                ));
            }
        };

        self.throttle.reset(&request.username).await?;
        log::info!("User {} logged in", user.id);
        self.issue_tokens(&user).await
    }

    /// Exchanges a stored, unrevoked refresh token for a new access token.
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<String> {
        let invalid = || AppError::Unauthorized("Token is invalid or expired".to_string());

        let claims = self.jwt.validate_refresh_token(refresh_token).map_err(|err| {
            log::warn!("Rejected refresh token: {}", err);
            invalid()
        })?;

        let stored = self
            .refresh_tokens
            .find_by_token_hash(&hash_token(refresh_token))
            .await?;
        match stored {
            Some(token) if token.is_valid() && token.user_id == claims.sub => {}
            _ => {
                log::warn!("Refresh token for user {} is unknown or revoked", claims.sub);
                return Err(invalid());
            }
        }

        let user = self.users.find_by_id(&claims.sub).await?.ok_or_else(invalid)?;
        self.jwt.create_token(&user)
    }

    /// Revokes the refresh token. Tokens that cannot be revoked are a client error.
    pub async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        let invalid = || AppError::ValidationError("Token is invalid or expired".to_string());

        let claims = self
            .jwt
            .validate_refresh_token(refresh_token)
            .map_err(|_| invalid())?;

        let hash = hash_token(refresh_token);
        match self.refresh_tokens.find_by_token_hash(&hash).await? {
            Some(token) if !token.revoked => {}
            _ => return Err(invalid()),
        }

        self.refresh_tokens.revoke_by_token_hash(&hash).await?;
        log::info!("User {} logged out", claims.sub);
        Ok(())
    }

    /// Drops refresh tokens past their expiry.
    pub async fn prune_expired_tokens(&self) -> AppResult<u64> {
        let removed = self.refresh_tokens.delete_expired().await?;
        if removed > 0 {
            log::info!("Removed {} expired refresh tokens", removed);
        }
        Ok(removed)
    }

    /// Drops login failures that have left the throttle window.
    pub async fn prune_login_failures(&self) -> AppResult<u64> {
        self.throttle.prune().await
    }

    async fn issue_tokens(&self, user: &User) -> AppResult<IssuedTokens> {
        let access = self.jwt.create_token(user)?;
        let (refresh, claims) = self.jwt.create_refresh_token(&user.id)?;

        let expires_at = Utc::now() + Duration::hours(self.jwt.refresh_expiration_hours());
        self.refresh_tokens
            .create(RefreshToken::new(&claims.jti, &user.id, &refresh, expires_at))
            .await?;

        Ok(IssuedTokens { access, refresh })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::repositories::login_attempt_repository::MockLoginAttemptRepository;
    use crate::repositories::refresh_token_repository::MockRefreshTokenRepository;
    use crate::repositories::user_repository::MockUserRepository;

    fn jwt() -> Arc<JwtService> {
        let config = Config::test_config();
        Arc::new(JwtService::new(&config.jwt_secret, 1, 168))
    }

    fn no_throttle() -> Arc<LoginThrottle> {
        Arc::new(LoginThrottle::new(Arc::new(MockLoginAttemptRepository::new()), 0, 300))
    }

    async fn user_with_password(username: &str, password: &str) -> User {
        let hash = password::hash_password(password).await.unwrap();
        User::new(username, &format!("{}@example.com", username), &hash)
    }

    #[tokio::test]
    async fn register_reports_taken_username_and_email_together() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_username()
            .returning(|_| Ok(Some(User::test_user_simple("taken"))));
        users
            .expect_find_by_email()
            .returning(|_| Ok(Some(User::test_user_simple("taken"))));
        users.expect_create().times(0);

        let service = AuthService::new(Arc::new(users), Arc::new(MockRefreshTokenRepository::new()), jwt(), no_throttle());
        let request = RegisterRequest {
            username: "taken".to_string(),
            email: "taken@example.com".to_string(),
            password: "long-enough".to_string(),
        };

        match service.register(request).await {
            Err(AppError::InvalidFields(fields)) => {
                assert!(fields.contains_key("username"));
                assert!(fields.contains_key("email"));
            }
            other => panic!("Expected InvalidFields, got {:?}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn register_stores_hashed_password_and_refresh_hash() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_username().returning(|_| Ok(None));
        users.expect_find_by_email().returning(|_| Ok(None));
        users
            .expect_create()
            .withf(|user: &User| user.password_hash.starts_with("$argon2"))
            .returning(|user| Ok(user));

        let mut tokens = MockRefreshTokenRepository::new();
        tokens.expect_create().times(1).returning(|token| Ok(token));

        let service = AuthService::new(Arc::new(users), Arc::new(tokens), jwt(), no_throttle());
        let issued = service
            .register(RegisterRequest {
                username: "newbie".to_string(),
                email: "newbie@example.com".to_string(),
                password: "long-enough".to_string(),
            })
            .await
            .unwrap();

        assert!(!issued.access.is_empty());
        assert_ne!(issued.access, issued.refresh);
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_unauthorized() {
        let user = user_with_password("alice", "right-password").await;
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_username()
            .returning(move |_| Ok(Some(user.clone())));

        let mut tokens = MockRefreshTokenRepository::new();
        tokens.expect_create().times(0);

        let service = AuthService::new(Arc::new(users), Arc::new(tokens), jwt(), no_throttle());
        let result = service
            .login(LoginRequest {
                username: "alice".to_string(),
                password: "wrong-password".to_string(),
            }, None)
            .await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn refresh_rejects_revoked_token() {
        let jwt = jwt();
        let (token, claims) = jwt.create_refresh_token("user-1").unwrap();
        let mut stored = RefreshToken::new(&claims.jti, "user-1", &token, Utc::now() + Duration::hours(1));
        stored.revoked = true;

        let mut tokens = MockRefreshTokenRepository::new();
        tokens
            .expect_find_by_token_hash()
            .returning(move |_| Ok(Some(stored.clone())));

        let service = AuthService::new(Arc::new(MockUserRepository::new()), Arc::new(tokens), jwt, no_throttle());

        assert!(matches!(service.refresh(&token).await, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn logout_with_garbage_token_is_bad_request() {
        let mut tokens = MockRefreshTokenRepository::new();
        tokens.expect_revoke_by_token_hash().times(0);

        let service = AuthService::new(Arc::new(MockUserRepository::new()), Arc::new(tokens), jwt(), no_throttle());

        assert!(matches!(
            service.logout("not-a-token").await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn logout_revokes_stored_token() {
        let jwt = jwt();
        let (token, claims) = jwt.create_refresh_token("user-1").unwrap();
        let stored = RefreshToken::new(&claims.jti, "user-1", &token, Utc::now() + Duration::hours(1));
        let expected_hash = stored.token_hash.clone();

        let mut tokens = MockRefreshTokenRepository::new();
        tokens
            .expect_find_by_token_hash()
            .returning(move |_| Ok(Some(stored.clone())));
        tokens
            .expect_revoke_by_token_hash()
            .times(1)
            .withf(move |hash: &str| hash == expected_hash)
            .returning(|_| Ok(()));

        let service = AuthService::new(Arc::new(MockUserRepository::new()), Arc::new(tokens), jwt, no_throttle());
        service.logout(&token).await.unwrap();
    }

    #[tokio::test]
    async fn throttled_login_skips_password_check() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_username().times(0);

        let mut attempts = MockLoginAttemptRepository::new();
        attempts
            .expect_failures_since()
            .returning(|_, _| Ok(vec![Utc::now(); 5]));
        let throttle = Arc::new(LoginThrottle::new(Arc::new(attempts), 5, 300));

        let service = AuthService::new(Arc::new(users), Arc::new(MockRefreshTokenRepository::new()), jwt(), throttle);
        let result = service
            .login(LoginRequest {
                username: "alice".to_string(),
                password: "right-password".to_string(),
            }, Some("10.0.0.1"))
            .await;

        assert!(matches!(result, Err(AppError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn unknown_username_records_failure() {
        let mut users = MockUserRepository::new();
        users.expect_find_by_username().returning(|_| Ok(None));

        let mut attempts = MockLoginAttemptRepository::new();
        attempts.expect_failures_since().returning(|_, _| Ok(vec![]));
        attempts.expect_record_failure().times(2).returning(|_| Ok(()));
        let throttle = Arc::new(LoginThrottle::new(Arc::new(attempts), 5, 300));

        let service = AuthService::new(Arc::new(users), Arc::new(MockRefreshTokenRepository::new()), jwt(), throttle);
        let result = service
            .login(LoginRequest {
                username: "nobody".to_string(),
                password: "whatever-password".to_string(),
            }, Some("10.0.0.1"))
            .await;

        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn successful_login_clears_username_failures() {
        let user = user_with_password("carol", "right-password").await;
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_username()
            .returning(move |_| Ok(Some(user.clone())));

        let mut tokens = MockRefreshTokenRepository::new();
        tokens.expect_create().returning(|token| Ok(token));

        let mut attempts = MockLoginAttemptRepository::new();
        attempts.expect_failures_since().returning(|_, _| Ok(vec![Utc::now(); 2]));
        attempts
            .expect_clear()
            .withf(|key: &str| key == "user:carol")
            .times(1)
            .returning(|_| Ok(2));
        let throttle = Arc::new(LoginThrottle::new(Arc::new(attempts), 5, 300));

        let service = AuthService::new(Arc::new(users), Arc::new(tokens), jwt(), throttle);
        service
            .login(LoginRequest {
                username: "carol".to_string(),
                password: "right-password".to_string(),
            }, None)
            .await
            .unwrap();
    }
}
