use actix_web::{get, patch, post, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    errors::AppError,
    models::dto::request::{PaginationParams, StartAttemptRequest, SubmitAttemptRequest},
};

#[post("/api/quiz-attempts")]
async fn start_attempt(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    request: web::Json<StartAttemptRequest>,
) -> Result<HttpResponse, AppError> {
    let started = state
        .attempt_service
        .start_attempt(auth.user_id(), request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(started))
}

#[get("/api/quiz-attempts")]
async fn list_attempts(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse, AppError> {
    let page = state
        .attempt_service
        .list_attempts(auth.user_id(), query.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/api/quiz-attempts/{id}")]
async fn get_attempt(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let attempt = state.attempt_service.get_attempt(auth.user_id(), &id).await?;
    Ok(HttpResponse::Ok().json(attempt))
}

#[patch("/api/quiz-attempts/{id}/submit")]
async fn submit_attempt(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
    request: web::Json<SubmitAttemptRequest>,
) -> Result<HttpResponse, AppError> {
    let attempt = state
        .attempt_service
        .submit_attempt(auth.user_id(), &id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(attempt))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(start_attempt)
        .service(list_attempts)
        .service(get_attempt)
        .service(submit_attempt);
}
