use once_cell::sync::Lazy;
use serde::Deserialize;
use validator::Validate;

static USERNAME_REGEX: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(r"^[\w.@+-]+$").expect("USERNAME_REGEX is a valid regex pattern")
});

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 150, message = "Username must be 3 to 150 characters"),
        regex(
            path = *USERNAME_REGEX,
            message = "Username may contain only letters, digits and @/./+/-/_"
        )
    )]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub username: String,

    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

/// Partial profile update; absent fields keep their stored values.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 150))]
    pub first_name: Option<String>,

    #[validate(length(max = 150))]
    pub last_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(url(message = "Avatar must be a valid URL"))]
    pub avatar: Option<String>,

    #[validate(length(max = 2000))]
    pub about: Option<String>,

    #[validate(length(max = 200, message = "Too many favourite quizzes"))]
    pub favourite_quiz_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaginationParams {
    #[validate(range(min = 0))]
    pub offset: Option<i64>,

    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            offset: Some(0),
            limit: Some(20),
        }
    }
}

impl PaginationParams {
    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct QuizListQuery {
    #[validate(length(max = 200))]
    pub search: Option<String>,

    /// Parsed into a category by the service so unknown values map to a field error.
    pub category: Option<String>,

    #[validate(range(min = 0))]
    pub offset: Option<i64>,

    #[validate(range(min = 1, max = 100))]
    pub limit: Option<i64>,
}

impl QuizListQuery {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            offset: self.offset,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StartAttemptRequest {
    #[validate(length(min = 1, message = "This field is required."))]
    pub quiz: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnswerInput {
    pub question_id: String,

    #[validate(length(min = 1, message = "This list may not be empty."))]
    pub selected_options: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitAttemptRequest {
    #[validate(nested)]
    pub answers: Vec<AnswerInput>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn register(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_valid_register_request() {
        assert!(register("john.doe+quiz", "john@example.com", "s3cret-pass").validate().is_ok());
    }

    #[test]
    fn test_invalid_email() {
        assert!(register("johndoe", "invalid-email", "s3cret-pass").validate().is_err());
    }

    #[test]
    fn test_username_rules() {
        assert!(register("ab", "john@example.com", "s3cret-pass").validate().is_err());
        assert!(register("john doe", "john@example.com", "s3cret-pass").validate().is_err());
    }

    #[test]
    fn test_short_password() {
        assert!(register("johndoe", "john@example.com", "short").validate().is_err());
    }

    #[test]
    fn test_pagination_defaults_and_clamp() {
        let params = PaginationParams { offset: None, limit: Some(1000) };
        assert_eq!(params.offset(), 0);
        assert_eq!(params.limit(), 100);
        assert_eq!(PaginationParams::default().limit(), 20);
    }

    #[test]
    fn test_submit_rejects_empty_selection() {
        let request = SubmitAttemptRequest {
            answers: vec![AnswerInput {
                question_id: "q-1".to_string(),
                selected_options: vec![],
            }],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_profile_avatar_must_be_url() {
        let request = UpdateProfileRequest {
            avatar: Some("not a url".to_string()),
            ..Default::default()
        };
        assert!(request.validate().is_err());
    }
}
