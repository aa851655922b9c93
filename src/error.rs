use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;

/// Uniform response envelope used by every handler in this crate.
///
/// `code` is the primary signal callers key off of; it is one of the
/// string labels in [`AppError`] on failure, or `"SUCCEED"` /
/// `"PARTIAL_SUCCEED"` on success.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl Envelope<()> {
    pub fn ok() -> Self {
        Self { code: "SUCCEED", message: None, data: None }
    }

    pub fn partial(message: impl Into<String>) -> Self {
        Self { code: "PARTIAL_SUCCEED", message: Some(message.into()), data: None }
    }
}

impl<T: Serialize> Envelope<T> {
    pub fn with_data(data: T) -> Self {
        Self { code: "SUCCEED", message: None, data: Some(data) }
    }

    pub fn partial_with_data(message: impl Into<String>, data: T) -> Self {
        Self { code: "PARTIAL_SUCCEED", message: Some(message.into()), data: Some(data) }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Every observable failure in the authorization server, tagged with the
/// status label that is carried in the response body's `code` field.
///
/// The HTTP status code is chosen for correct REST semantics; it is a
/// secondary signal, the `code` string is the one API consumers match on.
#[allow(dead_code)]
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("request parameters failed validation: {0}")]
    ParamError(String),

    #[error("invalid username or password")]
    LoginError,

    #[error("password does not match")]
    PasswordError,

    #[error("token is invalid or malformed")]
    TokenError,

    #[error("token has expired")]
    TokenExpire,

    #[error("caller lacks permission for this operation")]
    PermissionError,

    #[error("request is not authenticated")]
    AuthError,

    #[error("failed to generate a token: {0}")]
    GenerationTokenError(String),

    #[error("resource already exists")]
    DataExist,

    #[error("no matching data")]
    NoData,

    #[error("duplicate data")]
    RepeatData,

    #[error("database insert failed: {0}")]
    DatabaseInsertError(String),

    #[error("database query failed: {0}")]
    DatabaseQueryError(String),

    #[error("database update failed: {0}")]
    DatabaseUpdateError(String),

    #[error("database delete failed: {0}")]
    DatabaseDeleteError(String),

    #[error("internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::ParamError(_) => "PARAM_ERROR",
            AppError::LoginError => "LOGIN_ERROR",
            AppError::PasswordError => "PASSWORD_ERROR",
            AppError::TokenError => "TOKEN_ERROR",
            AppError::TokenExpire => "TOKEN_EXPIRE",
            AppError::PermissionError => "PERMISSION_ERROR",
            AppError::AuthError => "AUTH_ERROR",
            AppError::GenerationTokenError(_) => "GENERATION_TOKEN_ERROR",
            AppError::DataExist => "DATA_EXIST",
            AppError::NoData => "NO_DATA",
            AppError::RepeatData => "REPEAT_DATA",
            AppError::DatabaseInsertError(_) => "DATABASE_INSERT_ERROR",
            AppError::DatabaseQueryError(_) => "DATABASE_QUERY_ERROR",
            AppError::DatabaseUpdateError(_) => "DATABASE_UPDATE_ERROR",
            AppError::DatabaseDeleteError(_) => "DATABASE_DELETE_ERROR",
            AppError::InternalError(_) => "DATABASE_QUERY_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::ParamError(_) => StatusCode::BAD_REQUEST,
            AppError::LoginError | AppError::PasswordError | AppError::AuthError => {
                StatusCode::UNAUTHORIZED
            }
            AppError::TokenError | AppError::TokenExpire => StatusCode::UNAUTHORIZED,
            AppError::PermissionError => StatusCode::FORBIDDEN,
            AppError::GenerationTokenError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DataExist | AppError::RepeatData => StatusCode::CONFLICT,
            AppError::NoData => StatusCode::NOT_FOUND,
            AppError::DatabaseInsertError(_)
            | AppError::DatabaseQueryError(_)
            | AppError::DatabaseUpdateError(_)
            | AppError::DatabaseDeleteError(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a raw `sqlx::Error` encountered while inserting a row to the
    /// appropriate database error kind, distinguishing uniqueness
    /// violations (REPEAT_DATA) from other failures.
    pub fn from_insert(err: sqlx::Error) -> Self {
        if is_duplicate(&err) {
            return AppError::RepeatData;
        }
        AppError::DatabaseInsertError(err.to_string())
    }

    pub fn from_query(err: sqlx::Error) -> Self {
        AppError::DatabaseQueryError(err.to_string())
    }

    pub fn from_update(err: sqlx::Error) -> Self {
        AppError::DatabaseUpdateError(err.to_string())
    }

    pub fn from_delete(err: sqlx::Error) -> Self {
        AppError::DatabaseDeleteError(err.to_string())
    }
}

fn is_duplicate(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|c| c == "23000").unwrap_or(false)
            || db_err.message().contains("Duplicate entry");
    }
    false
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Envelope::<()> {
            code: self.code(),
            message: Some(self.to_string()),
            data: None,
        };
        tracing::error!(code = body.code, "{}", self);
        (status, Json(body)).into_response()
    }
}
