use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata document stored alongside a [`Client`]. Updates to a client replace
/// this whole document rather than patching individual fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMetadata {
    pub client_name: String,
    pub client_uri: Option<String>,
    #[serde(default)]
    pub skip_authorization: bool,
    #[serde(default)]
    pub register_callback_uris: Vec<String>,
    #[serde(default)]
    pub logout_callback_uris: Vec<String>,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    pub scope: String,
    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub token_endpoint_auth_method: String,
}

impl ClientMetadata {
    /// Space-delimited scope set as a `Vec<String>`.
    pub fn scopes(&self) -> Vec<String> {
        self.scope.split_whitespace().map(str::to_owned).collect()
    }
}

/// A registered OAuth2/OIDC client application, owned by an [`crate::models::AdminUser`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub app_name: String,
    pub owner_username: String,
    pub issued_at: DateTime<Utc>,
    pub metadata: ClientMetadata,
}

#[derive(Debug, Clone, FromRow)]
pub struct ClientRow {
    pub id: String,
    pub client_id: String,
    pub client_secret: String,
    pub app_name: String,
    pub owner_username: String,
    pub issued_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl<'r> sqlx::FromRow<'r, sqlx::mysql::MySqlRow> for Client {
    fn from_row(row: &'r sqlx::mysql::MySqlRow) -> Result<Self, sqlx::Error> {
        let row = ClientRow::from_row(row)?;
        let metadata: ClientMetadata = serde_json::from_value(row.metadata)
            .map_err(|e| sqlx::Error::Decode(e.into()))?;

        Ok(Self {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            client_id: row.client_id,
            client_secret: row.client_secret,
            app_name: row.app_name,
            owner_username: row.owner_username,
            issued_at: row.issued_at,
            metadata,
        })
    }
}

impl Client {
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.metadata.redirect_uris.iter().any(|u| u == uri)
    }

    pub fn is_owner(&self, username: &str) -> bool {
        self.owner_username == username
    }

    /// Effective allow-list a grant may request from when the client skips consent:
    /// the client's own stored scope set.
    pub fn allowed_scopes(&self) -> Vec<String> {
        self.metadata.scopes()
    }

    pub fn supports_grant_type(&self, grant_type: &str) -> bool {
        self.metadata.grant_types.iter().any(|g| g == grant_type)
    }
}
