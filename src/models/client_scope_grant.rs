use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Records that `username` consented to `scope` for `client_id`. Consulted
/// on every authorize request that isn't `skip_authorization`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientScopeGrant {
    pub id: Uuid,
    pub username: String,
    pub client_id: String,
    pub scope: String,
    pub granted_at: DateTime<Utc>,
    pub expires_in: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct ClientScopeGrantRow {
    pub id: String,
    pub username: String,
    pub client_id: String,
    pub scope: String,
    pub granted_at: DateTime<Utc>,
    pub expires_in: i64,
}

impl From<ClientScopeGrantRow> for ClientScopeGrant {
    fn from(row: ClientScopeGrantRow) -> Self {
        Self {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            username: row.username,
            client_id: row.client_id,
            scope: row.scope,
            granted_at: row.granted_at,
            expires_in: row.expires_in,
        }
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for ClientScopeGrant {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        ClientScopeGrantRow::from_row(row).map(ClientScopeGrant::from)
    }
}

impl ClientScopeGrant {
    /// `expires_in == 0` means the grant never expires.
    pub fn is_expired(&self) -> bool {
        if self.expires_in == 0 {
            return false;
        }
        Utc::now() > self.granted_at + chrono::Duration::seconds(self.expires_in)
    }

    pub fn scopes(&self) -> Vec<String> {
        self.scope.split_whitespace().map(str::to_owned).collect()
    }

    pub fn covers_scopes(&self, requested: &[String]) -> bool {
        let granted = self.scopes();
        requested.iter().all(|s| granted.contains(s))
    }
}
