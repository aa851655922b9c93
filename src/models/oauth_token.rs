use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An issued bearer token pair. `access_token`/`refresh_token` are not
/// opaque handles into this row: they are the literal signed JWTs, so a
/// caller who only has the JWT in hand can still be matched back to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub id: Uuid,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub client_id: String,
    pub user_id: Uuid,
    pub username: String,
    pub scope: String,
    pub issued_at: DateTime<Utc>,
    pub expires_in: i64,
    pub refresh_token_expires_in: Option<i64>,
    pub access_token_revoked_at: Option<DateTime<Utc>>,
    pub refresh_token_revoked_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, FromRow)]
pub struct TokenRow {
    pub id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub client_id: String,
    pub user_id: String,
    pub username: String,
    pub scope: String,
    pub issued_at: DateTime<Utc>,
    pub expires_in: i64,
    pub refresh_token_expires_in: Option<i64>,
    pub access_token_revoked_at: Option<DateTime<Utc>>,
    pub refresh_token_revoked_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

impl From<TokenRow> for Token {
    fn from(row: TokenRow) -> Self {
        Self {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            client_id: row.client_id,
            user_id: Uuid::parse_str(&row.user_id).unwrap_or_default(),
            username: row.username,
            scope: row.scope,
            issued_at: row.issued_at,
            expires_in: row.expires_in,
            refresh_token_expires_in: row.refresh_token_expires_in,
            access_token_revoked_at: row.access_token_revoked_at,
            refresh_token_revoked_at: row.refresh_token_revoked_at,
            metadata: row.metadata,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for Token {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        TokenRow::from_row(row).map(Token::from)
    }
}

impl Token {
    pub fn is_access_token_revoked(&self) -> bool {
        self.access_token_revoked_at
            .map(|at| Utc::now() >= at)
            .unwrap_or(false)
    }

    /// A refresh token is usable iff it was never revoked, or the revocation
    /// timestamp is still in the future. Returning tokens that are already
    /// revoked here would let a refresh resurrect a dead grant.
    pub fn is_refresh_token_live(&self) -> bool {
        match self.refresh_token_revoked_at {
            None => true,
            Some(at) => Utc::now() < at,
        }
    }

    pub fn scopes(&self) -> Vec<String> {
        self.scope.split_whitespace().map(str::to_owned).collect()
    }

    pub fn has_all_scopes(&self, required: &[String]) -> bool {
        let granted = self.scopes();
        required.iter().all(|s| granted.contains(s))
    }
}
