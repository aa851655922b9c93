use serde::{Deserialize, Serialize};

use crate::models::{Client, ClientMetadata};

/// POST /oauth2/applications/register
#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub app_name: String,
    pub metadata: ClientMetadata,
}

/// PUT /oauth2/applications/<client_id>. Replaces the full metadata
/// document under the same key rather than patching individual fields.
#[derive(Debug, Deserialize)]
pub struct UpdateClientRequest {
    pub metadata: ClientMetadata,
}

/// A [`Client`] plus its `client_secret`. The secret is only ever present in
/// the create response, where it is returned once; every other response
/// carries `client_secret: None` since [`Client`] itself never serializes it.
#[derive(Debug, Serialize)]
pub struct ClientResponse {
    #[serde(flatten)]
    pub client: Client,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

impl ClientResponse {
    pub fn new(client: Client) -> Self {
        Self { client, client_secret: None }
    }

    pub fn with_secret(client: Client, client_secret: String) -> Self {
        Self { client, client_secret: Some(client_secret) }
    }
}
