use actix_web::{get, put, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::AuthenticatedUser,
    errors::AppError,
    models::dto::request::UpdateProfileRequest,
};

#[get("/api/users/profile")]
async fn get_profile(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let profile = state.user_service.get_profile(auth.user_id()).await?;
    Ok(HttpResponse::Ok().json(profile))
}

#[put("/api/users/profile")]
async fn update_profile(
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
    request: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, AppError> {
    let profile = state
        .user_service
        .update_profile(auth.user_id(), request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_profile).service(update_profile);
}
