pub mod jwt_auth;
pub mod oauth_auth;

pub use jwt_auth::{user_session, UserSession};
pub use oauth_auth::{admin_session, AdminSession};

use axum::extract::Request;
use axum::http::header::{AUTHORIZATION, COOKIE};

const SESSION_COOKIE_NAME: &str = "Authorization";

/// Reads the raw session value from the `Authorization` header, falling back
/// to an `Authorization=` cookie in the raw `Cookie` header. No prefix is
/// stripped here: the admin and user middlewares differ on whether one is
/// expected, so each strips (or doesn't) after extraction.
pub fn extract_raw_session_token(req: &Request) -> Option<String> {
    if let Some(value) = req.headers().get(AUTHORIZATION) {
        if let Ok(s) = value.to_str() {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }

    let cookie_header = req.headers().get(COOKIE)?.to_str().ok()?;
    cookie_header.split(';').find_map(|pair| {
        let pair = pair.trim();
        let (name, value) = pair.split_once('=')?;
        (name == SESSION_COOKIE_NAME).then(|| value.to_string())
    })
}
