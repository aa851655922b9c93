use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Marks the first time a token from `username` was introspected at
/// `client_id`, carrying that client's logout callback URIs so application
/// logout can fan out without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRecord {
    pub id: Uuid,
    pub username: String,
    pub client_id: String,
    pub logout_url: String,
    pub login_time: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct LoginRecordRow {
    pub id: String,
    pub username: String,
    pub client_id: String,
    pub logout_url: String,
    pub login_time: DateTime<Utc>,
}

impl From<LoginRecordRow> for LoginRecord {
    fn from(row: LoginRecordRow) -> Self {
        Self {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            username: row.username,
            client_id: row.client_id,
            logout_url: row.logout_url,
            login_time: row.login_time,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for LoginRecord {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        LoginRecordRow::from_row(row).map(LoginRecord::from)
    }
}

impl LoginRecord {
    pub fn logout_urls(&self) -> Vec<String> {
        self.logout_url.split(',').map(str::to_owned).collect()
    }
}
