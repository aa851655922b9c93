use serde::{Deserialize, Serialize};

/// POST /oauth2/register
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// POST /oauth2/login and POST /oauth2/manager-login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned by /oauth2/login. The admin-login handler reuses this shape but
/// prefixes `token` with the literal `bearer ` before writing it out.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /oauth2/password. An AdminUser resets another account's password to
/// the configured default. The acting admin is the authenticated caller, not
/// a request field.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub username: String,
}

/// GET /oauth2/logout query parameters.
#[derive(Debug, Deserialize)]
pub struct LogoutQuery {
    pub redirect_uri: String,
}
