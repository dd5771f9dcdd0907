use std::{cmp, sync::Arc};

use chrono::{DateTime, Duration, Utc};

use crate::{
    errors::{AppError, AppResult},
    models::domain::LoginFailure,
    repositories::LoginAttemptRepository,
};

/// Refuses logins once a username or client address has failed `max_failures`
/// times inside the sliding window.
pub struct LoginThrottle {
    attempts: Arc<dyn LoginAttemptRepository>,
    max_failures: u32,
    window: Duration,
}

impl LoginThrottle {
    pub fn new(attempts: Arc<dyn LoginAttemptRepository>, max_failures: u32, window_secs: i64) -> Self {
        Self {
            attempts,
            max_failures,
            window: Duration::seconds(window_secs),
        }
    }

    fn enabled(&self) -> bool {
        self.max_failures > 0
    }

    fn keys(username: &str, client_ip: Option<&str>) -> Vec<String> {
        let mut keys = vec![user_key(username)];
        if let Some(ip) = client_ip {
            keys.push(format!("ip:{}", ip));
        }
        keys
    }

    pub async fn check(&self, username: &str, client_ip: Option<&str>) -> AppResult<()> {
        if !self.enabled() {
            return Ok(());
        }

        let now = Utc::now();
        let mut retry_after = 0;
        for key in Self::keys(username, client_ip) {
            let failures = self.attempts.failures_since(&key, now - self.window).await?;
            if let Some(wait) = self.wait_for(&failures, now) {
                log::warn!("Login throttled for {} ({} recent failures)", key, failures.len());
                retry_after = cmp::max(retry_after, wait);
            }
        }

        if retry_after > 0 {
            return Err(AppError::RateLimited { retry_after });
        }
        Ok(())
    }

    /// Seconds until enough of `failures` (oldest first) leave the window to allow another try.
    fn wait_for(&self, failures: &[DateTime<Utc>], now: DateTime<Utc>) -> Option<u64> {
        let max = self.max_failures as usize;
        if failures.len() < max {
            return None;
        }
        let expires = failures[failures.len() - max] + self.window;
        Some(cmp::max((expires - now).num_seconds(), 1) as u64)
    }

    pub async fn record_failure(&self, username: &str, client_ip: Option<&str>) -> AppResult<()> {
        if !self.enabled() {
            return Ok(());
        }

        let now = Utc::now();
        for key in Self::keys(username, client_ip) {
            self.attempts.record_failure(LoginFailure::new(&key, now)).await?;
        }
        Ok(())
    }

    /// Forgets the username's failures. Address failures stay until they age out.
    pub async fn reset(&self, username: &str) -> AppResult<()> {
        if !self.enabled() {
            return Ok(());
        }
        self.attempts.clear(&user_key(username)).await?;
        Ok(())
    }

    pub async fn prune(&self) -> AppResult<u64> {
        self.attempts.delete_before(Utc::now() - self.window).await
    }
}

fn user_key(username: &str) -> String {
    format!("user:{}", username.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::login_attempt_repository::MockLoginAttemptRepository;

    fn throttle(repo: MockLoginAttemptRepository, max_failures: u32) -> LoginThrottle {
        LoginThrottle::new(Arc::new(repo), max_failures, 300)
    }

    #[tokio::test]
    async fn under_the_limit_is_allowed() {
        let mut repo = MockLoginAttemptRepository::new();
        repo.expect_failures_since()
            .returning(|_, _| Ok(vec![Utc::now() - Duration::seconds(10); 4]));

        assert!(throttle(repo, 5).check("alice", Some("10.0.0.1")).await.is_ok());
    }

    #[tokio::test]
    async fn limit_reached_reports_when_oldest_counted_failure_expires() {
        let mut repo = MockLoginAttemptRepository::new();
        repo.expect_failures_since()
            .withf(|key: &str, _| key == "user:alice")
            .returning(|_, _| {
                let now = Utc::now();
                Ok(vec![
                    now - Duration::seconds(200),
                    now - Duration::seconds(100),
                    now - Duration::seconds(50),
                ])
            });

        match throttle(repo, 2).check("Alice", None).await {
            // The second failure (100s old) must leave the 300s window.
            Err(AppError::RateLimited { retry_after }) => assert!((199..=200).contains(&retry_after)),
            other => panic!("Expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn address_limit_applies_across_usernames() {
        let mut repo = MockLoginAttemptRepository::new();
        repo.expect_failures_since().returning(|key, _| {
            if key.starts_with("ip:") {
                Ok(vec![Utc::now(); 3])
            } else {
                Ok(vec![])
            }
        });

        let result = throttle(repo, 3).check("someone-new", Some("203.0.113.7")).await;
        assert!(matches!(result, Err(AppError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn failure_is_recorded_per_key() {
        let mut repo = MockLoginAttemptRepository::new();
        repo.expect_record_failure()
            .withf(|failure: &LoginFailure| failure.key == "user:bob")
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_record_failure()
            .withf(|failure: &LoginFailure| failure.key == "ip:10.0.0.2")
            .times(1)
            .returning(|_| Ok(()));

        throttle(repo, 5).record_failure("Bob", Some("10.0.0.2")).await.unwrap();
    }

    #[tokio::test]
    async fn zero_limit_disables_throttle() {
        let mut repo = MockLoginAttemptRepository::new();
        repo.expect_failures_since().times(0);
        repo.expect_record_failure().times(0);
        repo.expect_clear().times(0);

        let throttle = throttle(repo, 0);
        throttle.check("alice", Some("10.0.0.1")).await.unwrap();
        throttle.record_failure("alice", Some("10.0.0.1")).await.unwrap();
        throttle.reset("alice").await.unwrap();
    }
}
