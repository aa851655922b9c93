use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::config::AppState;
use crate::middleware::extract_raw_session_token;
use crate::utils::jwt::{self, ISSUER};

const MANAGER_PREFIX: &str = "bearer ";

/// The admin/manager identity resolved from the request's session token, if
/// any. Never rejects the request itself, for the same reason as
/// [`crate::middleware::jwt_auth::UserSession`].
#[derive(Debug, Clone, Default)]
pub struct AdminSession {
    pub username: Option<String>,
}

/// Resolves the caller's admin session. Unlike the end-user session, the raw
/// header/cookie value carries a literal `bearer ` prefix (lowercase, space
/// included) because that is how it was minted and cached at manager-login
/// time. It is stripped here before decoding, then handed back to
/// [`crate::services::session_cache::SessionCache::verify_manager_token`],
/// which re-applies the prefix to compare against the cached value.
pub async fn admin_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let username = extract_raw_session_token(&req).and_then(|raw| {
        let token = raw.strip_prefix(MANAGER_PREFIX)?;
        let claims = jwt::decode(token, &state.config.shared_secret, ISSUER).ok()?;
        state.session_cache.verify_manager_token(&claims.sub, token).then(|| claims.sub.clone())
    });

    req.extensions_mut().insert(AdminSession { username });
    next.run(req).await
}
