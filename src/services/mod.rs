pub mod auth_service;
pub mod login_throttle;
pub mod quiz_attempt_service;
pub mod quiz_graph;
pub mod quiz_service;
pub mod user_service;
