use axum::{
    extract::State,
    Json,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use validator::Validate;

use crate::{
    api::{response::ApiResponse, state::AppState},
    auth::{AuthService, SESSION_COOKIE},
    domain::Member,
    error::{AppError, Result},
};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<Member>)> {
    req.validate()?;

    let auth_service = &state.service_context.auth_service;
    let member_id = auth_service
        .authenticate(req.email.trim(), &req.password)
        .await?;

    let member = state
        .service_context
        .member_repo
        .find_by_id(member_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let (_session, token) = auth_service.create_session(member.id).await?;
    let cookie = auth_service.create_session_cookie(&token, state.settings.auth.secure_cookies);

    tracing::info!("Member {} logged in", member.id);

    Ok((
        jar.add(cookie),
        ApiResponse::with_message(member, "Login successful"),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<()>)> {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        if let Err(e) = state
            .service_context
            .auth_service
            .invalidate_session(session_cookie.value())
            .await
        {
            tracing::warn!("Failed to invalidate session on logout: {}", e);
        }
    }

    let jar = jar.add(AuthService::create_logout_cookie());

    Ok((jar, ApiResponse::message("Logged out")))
}
