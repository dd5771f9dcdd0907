pub mod auth_handler;
pub mod quiz_attempt_handler;
pub mod quiz_handler;
pub mod user_handler;

use actix_web::{get, web, HttpResponse};
use serde_json::json;

use crate::{app_state::AppState, errors::AppError};

#[get("/health")]
async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let database = match &state.db {
        Some(db) => match db.health_check().await {
            Ok(()) => "up",
            Err(err) => {
                log::warn!("Database health check failed: {}", err);
                "down"
            }
        },
        None => "unconfigured",
    };

    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
    }))
}

/// Malformed bodies, queries and paths answer with the regular error shape.
fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::ValidationError(err.to_string()).into()),
    );
}

/// Registers every route of the API.
pub fn configure(cfg: &mut web::ServiceConfig) {
    extractor_config(cfg);
    cfg.service(health_check);
    auth_handler::configure(cfg);
    user_handler::configure(cfg);
    quiz_handler::configure(cfg);
    quiz_attempt_handler::configure(cfg);
}
