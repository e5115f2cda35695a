use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    api::state::AppState,
    auth::SESSION_COOKIE,
    domain::Member,
    error::AppError,
};

#[derive(Clone)]
pub struct CurrentUser {
    pub member: Member,
}

async fn member_from_session(state: &AppState, jar: &CookieJar) -> Result<Member, AppError> {
    let session_cookie = jar
        .get(SESSION_COOKIE)
        .ok_or(AppError::Unauthorized)?;

    let session = state
        .service_context
        .auth_service
        .validate_session(session_cookie.value())
        .await?
        .ok_or(AppError::Unauthorized)?;

    state
        .service_context
        .member_repo
        .find_by_id(session.member_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let member = member_from_session(&state, &jar).await?;

    request.extensions_mut().insert(CurrentUser { member });

    Ok(next.run(request).await)
}

/// Admin gate. Reuses the member resolved by `require_auth` when it ran first.
pub async fn require_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let member = match request.extensions().get::<CurrentUser>() {
        Some(current) => current.member.clone(),
        None => member_from_session(&state, &jar).await?,
    };

    if !member.is_admin() {
        return Err(AppError::Forbidden);
    }

    request.extensions_mut().insert(CurrentUser { member });

    Ok(next.run(request).await)
}
