use actix_web::{delete, get, patch, post, put, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    errors::AppError,
    models::dto::{
        quiz_dto::{CreateQuizRequest, UpdateQuizRequest},
        request::QuizListQuery,
    },
};

#[get("/api/quizzes")]
async fn list_quizzes(
    state: web::Data<AppState>,
    query: web::Query<QuizListQuery>,
) -> Result<HttpResponse, AppError> {
    let page = state.quiz_service.list_quizzes(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[post("/api/quizzes")]
async fn create_quiz(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    request: web::Json<CreateQuizRequest>,
) -> Result<HttpResponse, AppError> {
    let quiz = state
        .quiz_service
        .create_quiz(auth.user_id(), request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(quiz))
}

#[get("/api/quizzes/{id}")]
async fn get_quiz(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: Option<AuthenticatedUser>,
) -> Result<HttpResponse, AppError> {
    let viewer = auth.as_ref().map(AuthenticatedUser::user_id);
    let quiz = state.quiz_service.get_quiz(&id, viewer).await?;
    Ok(HttpResponse::Ok().json(quiz))
}

#[put("/api/quizzes/{id}")]
async fn replace_quiz(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
    request: web::Json<CreateQuizRequest>,
) -> Result<HttpResponse, AppError> {
    let quiz = state
        .quiz_service
        .replace_quiz(auth.user_id(), &id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(quiz))
}

#[patch("/api/quizzes/{id}")]
async fn patch_quiz(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
    request: web::Json<UpdateQuizRequest>,
) -> Result<HttpResponse, AppError> {
    let quiz = state
        .quiz_service
        .patch_quiz(auth.user_id(), &id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(quiz))
}

#[delete("/api/quizzes/{id}")]
async fn delete_quiz(
    state: web::Data<AppState>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    state.quiz_service.delete_quiz(auth.user_id(), &id).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_quizzes)
        .service(create_quiz)
        .service(get_quiz)
        .service(replace_quiz)
        .service(patch_quiz)
        .service(delete_quiz);
}
