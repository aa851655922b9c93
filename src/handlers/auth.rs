use axum::extract::{Extension, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;

use crate::config::AppState;
use crate::dto::auth::{LoginRequest, LoginResponse, LogoutQuery, RegisterRequest, ResetPasswordRequest};
use crate::error::{AppError, Envelope};
use crate::middleware::{AdminSession, UserSession};
use crate::services::session_cache::{MANAGER_TOKEN_TTL_SECS, USER_TOKEN_TTL_SECS};
use crate::services::{FanOutOutcome, LoginKind};

const MANAGER_TOKEN_PREFIX: &str = "bearer ";

fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!("Authorization={token}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax")
}

fn cleared_session_cookie() -> String {
    "Authorization=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax".to_string()
}

/// POST /oauth2/register
pub async fn register_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Envelope<()>, AppError> {
    let outcome = state
        .account_manager()
        .register(&req.username, &req.password, req.email.as_deref(), req.phone.as_deref())
        .await?;

    Ok(match outcome {
        FanOutOutcome::Succeeded => Envelope::ok(),
        FanOutOutcome::PartialSucceeded(message) => Envelope::partial(message),
    })
}

/// POST /oauth2/login
pub async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let token = state.account_manager().login(LoginKind::User, &req.username, &req.password).await?;

    let mut response = Json(Envelope::with_data(LoginResponse { token: token.clone() })).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        session_cookie(&token, USER_TOKEN_TTL_SECS).parse().expect("cookie header is ASCII"),
    );
    Ok(response)
}

/// POST /oauth2/manager-login. Same shape as [`login_handler`], but the
/// returned and cached token carries the literal `bearer ` prefix.
pub async fn manager_login_handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let token = state.account_manager().login(LoginKind::Admin, &req.username, &req.password).await?;
    let prefixed = format!("{MANAGER_TOKEN_PREFIX}{token}");

    let mut response = Json(Envelope::with_data(LoginResponse { token: prefixed.clone() })).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        session_cookie(&prefixed, MANAGER_TOKEN_TTL_SECS).parse().expect("cookie header is ASCII"),
    );
    Ok(response)
}

/// POST /oauth2/password. An authenticated AdminUser resets another
/// account's password to the server's configured default.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminSession>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Envelope<()>, AppError> {
    let acting_admin = admin.username.ok_or(AppError::AuthError)?;

    state
        .account_manager()
        .reset_password(&acting_admin, &req.username, &state.config.default_password)
        .await?;

    Ok(Envelope::ok())
}

/// GET /oauth2/logout?redirect_uri=... . Clears the session cookie and cache
/// entry, fans out cross-application logout notifications, then redirects
/// the browser back to the caller.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(session): Extension<UserSession>,
    Query(query): Query<LogoutQuery>,
) -> Result<Response, AppError> {
    let username = session.username.ok_or(AppError::AuthError)?;

    state.session_cache.invalidate_user(&username);
    state.account_manager().application_logout(&username).await?;

    let mut response = Redirect::to(&query.redirect_uri).into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, cleared_session_cookie().parse().expect("cookie header is ASCII"));
    Ok(response)
}
