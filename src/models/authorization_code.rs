use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A single-use grant artifact minted at the authorize step and redeemed at
/// the token step. Keyed by `client_id`, the client's external identifier,
/// not its internal row id: every caller that touches a code arrives with
/// the external id in hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub id: Uuid,
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub username: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub nonce: Option<String>,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AuthorizationCodeRow {
    pub id: String,
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub username: String,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub nonce: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl From<AuthorizationCodeRow> for AuthorizationCode {
    fn from(row: AuthorizationCodeRow) -> Self {
        Self {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            code: row.code,
            client_id: row.client_id,
            redirect_uri: row.redirect_uri,
            scope: row.scope,
            username: row.username,
            code_challenge: row.code_challenge,
            code_challenge_method: row.code_challenge_method,
            nonce: row.nonce,
            issued_at: row.issued_at,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for AuthorizationCode {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        AuthorizationCodeRow::from_row(row).map(AuthorizationCode::from)
    }
}

impl AuthorizationCode {
    /// Authorization codes live at most ten minutes; the repository layer
    /// enforces this at query time so an expired row is never handed back.
    pub const TTL_SECS: i64 = 600;

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.issued_at + chrono::Duration::seconds(Self::TTL_SECS)
    }

    pub fn scopes(&self) -> Vec<String> {
        self.scope.split_whitespace().map(str::to_owned).collect()
    }
}
