use actix_web::{
    cookie::{time::Duration, Cookie, SameSite},
    post, web, HttpRequest, HttpResponse,
};

use crate::{
    app_state::AppState,
    config::Config,
    errors::AppError,
    models::dto::{
        request::{LoginRequest, RegisterRequest},
        response::AccessTokenResponse,
    },
    services::auth_service::IssuedTokens,
};

pub const REFRESH_COOKIE: &str = "refresh";
const REFRESH_COOKIE_PATH: &str = "/api/auth";

fn refresh_cookie(config: &Config, token: String) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, token)
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::hours(config.refresh_expiration_hours))
        .finish()
}

fn expired_refresh_cookie(config: &Config) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, "")
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(Duration::ZERO)
        .finish()
}

fn token_response(mut builder: actix_web::HttpResponseBuilder, config: &Config, tokens: IssuedTokens) -> HttpResponse {
    builder
        .cookie(refresh_cookie(config, tokens.refresh))
        .json(AccessTokenResponse {
            access: tokens.access,
        })
}

fn refresh_token_from(req: &HttpRequest) -> Result<String, AppError> {
    req.cookie(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::ValidationError("Refresh token not found in cookies".to_string()))
}

#[post("/api/auth/register")]
async fn register(
    state: web::Data<AppState>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let tokens = state.auth_service.register(request.into_inner()).await?;
    Ok(token_response(HttpResponse::Created(), &state.config, tokens))
}

#[post("/api/auth/login")]
async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let client_ip = req.peer_addr().map(|addr| addr.ip().to_string());
    let tokens = state
        .auth_service
        .login(request.into_inner(), client_ip.as_deref())
        .await?;
    Ok(token_response(HttpResponse::Ok(), &state.config, tokens))
}

#[post("/api/auth/token/refresh")]
async fn refresh_token(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, AppError> {
    let refresh = refresh_token_from(&req)?;
    let access = state.auth_service.refresh(&refresh).await?;
    Ok(HttpResponse::Ok().json(AccessTokenResponse { access }))
}

#[post("/api/auth/logout")]
async fn logout(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, AppError> {
    let refresh = refresh_token_from(&req)?;
    state.auth_service.logout(&refresh).await?;

    Ok(HttpResponse::Ok()
        .cookie(expired_refresh_cookie(&state.config))
        .json(serde_json::json!({ "detail": "Successfully logged out." })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(register)
        .service(login)
        .service(refresh_token)
        .service(logout);
}
