use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::config::AppState;
use crate::middleware::extract_raw_session_token;
use crate::utils::jwt::{self, ISSUER};

/// The end-user identity resolved from the request's session token, if any.
/// Never rejects the request itself. Handlers that require a session check
/// `username` and return [`crate::error::AppError::AuthError`] when it is
/// absent, since the authorize endpoint treats "no session" as a redirect,
/// not a hard failure.
#[derive(Debug, Clone, Default)]
pub struct UserSession {
    pub username: Option<String>,
}

/// Resolves the caller's end-user session from the `Authorization` header or
/// the `Authorization` cookie: the raw value is the bare JWT (no `Bearer`
/// prefix, unlike the admin session in [`crate::middleware::oauth_auth`]),
/// decoded with the process-wide shared secret and matched byte-exactly
/// against the session cache (authenticated iff both hold).
pub async fn user_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let username = extract_raw_session_token(&req).and_then(|token| {
        let claims = jwt::decode(&token, &state.config.shared_secret, ISSUER).ok()?;
        state.session_cache.verify_user_token(&claims.sub, &token).then_some(claims.sub)
    });

    req.extensions_mut().insert(UserSession { username });
    next.run(req).await
}
