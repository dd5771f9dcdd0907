use std::env;
use secrecy::SecretString;

use crate::errors::{AppError, AppResult};

const DEFAULT_JWT_SECRET: &str = "dev_secret_key_change_in_production";

#[derive(Clone, Debug)]
pub struct Config {
    pub mongo_conn_string: String,
    pub mongo_db_name: String,
    pub web_server_host: String,
    pub web_server_port: u16,
    pub jwt_secret: SecretString,
    pub jwt_expiration_hours: i64,
    pub refresh_expiration_hours: i64,
    /// Sets the `Secure` attribute on the refresh cookie.
    pub cookie_secure: bool,
    pub cors_allowed_origin: String,
    pub app_env: String,
    /// Failed logins per username or client address before logins are refused. 0 disables.
    pub login_max_failures: u32,
    pub login_failure_window_secs: i64,
}

impl Config {
    pub fn from_env() -> Self {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Self {
            mongo_conn_string: env::var("MONGO_CONN_STRING")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            mongo_db_name: env::var("MONGO_DB_NAME").unwrap_or_else(|_| "quizhub-local".to_string()),
            web_server_host: env::var("WEB_SERVER_HOST")
                .unwrap_or_else(|_| "localhost".to_string()),
            web_server_port: env::var("WEB_SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            jwt_secret: SecretString::from(env::var("JWT_SECRET")
                .unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string())),
            jwt_expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(1),
            refresh_expiration_hours: env::var("REFRESH_EXPIRATION_HOURS")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(24 * 7),
            // Plain-http local development cannot send Secure cookies back.
            cookie_secure: env::var("COOKIE_SECURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(app_env == "production"),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            login_max_failures: env::var("LOGIN_MAX_FAILURES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            login_failure_window_secs: env::var("LOGIN_FAILURE_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs: &i64| *secs > 0)
                .unwrap_or(300),
            app_env,
        }
    }

    pub fn is_production(&self) -> bool {
        self.app_env == "production"
    }

    /// Rejects configuration that must never reach a production deployment.
    pub fn validate_for_production(&self) -> AppResult<()> {
        use secrecy::ExposeSecret;

        let jwt_secret = self.jwt_secret.expose_secret();

        if jwt_secret == DEFAULT_JWT_SECRET {
            return Err(AppError::InternalError(
                "JWT_SECRET is using the default value; set it to a secure random string".to_string(),
            ));
        }

        if jwt_secret.len() < 32 {
            return Err(AppError::InternalError(format!(
                "JWT_SECRET is too short ({}), it must be at least 32 characters",
                jwt_secret.len()
            )));
        }

        if !self.cookie_secure {
            return Err(AppError::InternalError(
                "COOKIE_SECURE must not be disabled in production".to_string(),
            ));
        }

        Ok(())
    }

    /// Deterministic configuration used by unit and integration tests.
    pub fn test_config() -> Self {
        Self {
            mongo_conn_string: "mongodb://localhost:27017".to_string(),
            mongo_db_name: "quizhub-test".to_string(),
            web_server_host: "127.0.0.1".to_string(),
            web_server_port: 8080,
            jwt_secret: SecretString::from("test_jwt_secret_key".to_string()),
            jwt_expiration_hours: 1,
            refresh_expiration_hours: 168,
            cookie_secure: false,
            cors_allowed_origin: "http://localhost:5173".to_string(),
            app_env: "test".to_string(),
            login_max_failures: 5,
            login_failure_window_secs: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env_with_defaults() {
        let config = Config::from_env();

        assert!(!config.mongo_conn_string.is_empty());
        assert!(!config.mongo_db_name.is_empty());
        assert!(config.refresh_expiration_hours > 0);
    }

    #[test]
    fn test_test_config() {
        let config = Config::test_config();

        assert_eq!(config.mongo_conn_string, "mongodb://localhost:27017");
        assert_eq!(config.mongo_db_name, "quizhub-test");
        assert!(!config.cookie_secure);
        assert!(!config.is_production());
    }

    #[test]
    fn test_production_validation_rejects_weak_secret() {
        let mut config = Config::test_config();
        config.cookie_secure = true;
        assert!(config.validate_for_production().is_err());

        config.jwt_secret = SecretString::from(DEFAULT_JWT_SECRET.to_string());
        assert!(config.validate_for_production().is_err());
    }

    #[test]
    fn test_production_validation_accepts_strong_secret() {
        let mut config = Config::test_config();
        config.cookie_secure = true;
        config.jwt_secret = SecretString::from("x".repeat(48));
        assert!(config.validate_for_production().is_ok());

        config.cookie_secure = false;
        assert!(config.validate_for_production().is_err());
    }
}
