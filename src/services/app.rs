use std::collections::BTreeSet;

use sqlx::MySqlPool;

use crate::error::AppError;
use crate::models::{Client, ClientMetadata};
use crate::repositories::{AuthorizationCodeRepository, ClientRepository, TokenRepository};
use crate::utils::secret::{generate_client_id, generate_client_secret};

/// Scope values every client is granted regardless of what it requests.
const BASELINE_SCOPES: &[&str] = &["username", "email", "openid", "phone", "offline_access"];

const ALLOWED_GRANT_TYPES: &[&str] = &[
    "authorization_code",
    "client_credentials",
    "refresh_token",
    "password",
    "implicit",
    "hybrid",
];

const ALLOWED_RESPONSE_TYPE_TOKENS: &[&str] = &["code", "token", "id_token"];

const ALLOWED_AUTH_METHODS: &[&str] = &["client_secret_basic", "client_secret_post", "none"];

/// Client application registry: create/update/delete/list, and the scope
/// canonicalization that every create/update passes through.
#[derive(Clone)]
pub struct AppService {
    client_repo: ClientRepository,
    token_repo: TokenRepository,
    code_repo: AuthorizationCodeRepository,
}

impl AppService {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            client_repo: ClientRepository::new(pool.clone()),
            token_repo: TokenRepository::new(pool.clone()),
            code_repo: AuthorizationCodeRepository::new(pool),
        }
    }

    pub async fn create(
        &self,
        owner_username: &str,
        app_name: &str,
        mut metadata: ClientMetadata,
    ) -> Result<(Client, String), AppError> {
        if self.client_repo.find_by_app_name(app_name).await?.is_some() {
            return Err(AppError::DataExist);
        }

        validate_scope(&metadata.scope)?;
        validate_metadata_enums(&metadata)?;
        metadata.scope = canonicalize_scope(&metadata.scope);

        let client_id = generate_client_id();
        let client_secret = generate_client_secret();

        let client = self
            .client_repo
            .create(&client_id, &client_secret, app_name, owner_username, &metadata)
            .await?;

        Ok((client, client_secret))
    }

    pub async fn get(&self, client_id: &str, owner_username: &str) -> Result<Client, AppError> {
        let client = self
            .client_repo
            .find_by_client_id(client_id)
            .await?
            .ok_or(AppError::NoData)?;

        if !client.is_owner(owner_username) {
            return Err(AppError::PermissionError);
        }

        Ok(client)
    }

    pub async fn list_by_owner(&self, owner_username: &str) -> Result<Vec<Client>, AppError> {
        self.client_repo.list_by_owner(owner_username).await
    }

    pub async fn update_metadata(
        &self,
        client_id: &str,
        owner_username: &str,
        mut metadata: ClientMetadata,
    ) -> Result<Client, AppError> {
        let existing = self
            .client_repo
            .find_by_client_id(client_id)
            .await?
            .ok_or(AppError::NoData)?;

        if !existing.is_owner(owner_username) {
            return Err(AppError::PermissionError);
        }

        validate_scope(&metadata.scope)?;
        validate_metadata_enums(&metadata)?;
        metadata.scope = canonicalize_scope(&metadata.scope);

        self.client_repo.update_metadata(client_id, &metadata).await
    }

    /// Deletes the client and cascades to its Tokens and AuthorizationCodes.
    pub async fn delete(&self, client_id: &str, owner_username: &str) -> Result<(), AppError> {
        let existing = self
            .client_repo
            .find_by_client_id(client_id)
            .await?
            .ok_or(AppError::NoData)?;

        if !existing.is_owner(owner_username) {
            return Err(AppError::PermissionError);
        }

        self.token_repo.delete_all_for_client(client_id).await?;
        self.code_repo.delete_all_for_client(client_id).await?;
        self.client_repo.delete(client_id).await
    }
}

/// Rejects any requested scope token outside the baseline set: clients
/// cannot register custom scopes.
fn validate_scope(requested: &str) -> Result<(), AppError> {
    for token in requested.split_whitespace() {
        if !BASELINE_SCOPES.contains(&token) {
            return Err(AppError::ParamError(format!("unsupported scope: {token}")));
        }
    }
    Ok(())
}

/// Rejects `grant_types`, `response_types`, and `token_endpoint_auth_method`
/// values outside the catalog a client is allowed to register with.
fn validate_metadata_enums(metadata: &ClientMetadata) -> Result<(), AppError> {
    for grant_type in &metadata.grant_types {
        if !ALLOWED_GRANT_TYPES.contains(&grant_type.as_str()) {
            return Err(AppError::ParamError(format!("unsupported grant_type: {grant_type}")));
        }
    }

    for response_type in &metadata.response_types {
        if !response_type
            .split_whitespace()
            .all(|token| ALLOWED_RESPONSE_TYPE_TOKENS.contains(&token))
        {
            return Err(AppError::ParamError(format!("unsupported response_type: {response_type}")));
        }
    }

    if !ALLOWED_AUTH_METHODS.contains(&metadata.token_endpoint_auth_method.as_str()) {
        return Err(AppError::ParamError(format!(
            "unsupported token_endpoint_auth_method: {}",
            metadata.token_endpoint_auth_method
        )));
    }

    Ok(())
}

/// Unions the requested scope with the baseline set, space-delimited and
/// order-stable.
fn canonicalize_scope(requested: &str) -> String {
    let mut set: BTreeSet<&str> = requested.split_whitespace().collect();
    for scope in BASELINE_SCOPES {
        set.insert(scope);
    }
    set.into_iter().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_scope_includes_baseline_even_when_empty() {
        let canonical = canonicalize_scope("");
        for scope in BASELINE_SCOPES {
            assert!(canonical.split_whitespace().any(|s| s == *scope));
        }
    }

    #[test]
    fn validate_scope_rejects_scope_outside_baseline_set() {
        assert!(validate_scope("offline_access custom_scope").is_err());
    }

    #[test]
    fn validate_scope_accepts_any_subset_of_baseline() {
        assert!(validate_scope("openid email").is_ok());
    }

    #[test]
    fn canonicalize_scope_dedupes() {
        let canonical = canonicalize_scope("email email openid");
        assert_eq!(canonical.split_whitespace().filter(|s| *s == "email").count(), 1);
    }

    fn sample_metadata() -> ClientMetadata {
        ClientMetadata {
            client_name: "App".to_string(),
            client_uri: None,
            skip_authorization: false,
            register_callback_uris: vec![],
            logout_callback_uris: vec![],
            redirect_uris: vec![],
            scope: "openid email".to_string(),
            grant_types: vec!["authorization_code".to_string()],
            response_types: vec!["code".to_string()],
            token_endpoint_auth_method: "client_secret_post".to_string(),
        }
    }

    #[test]
    fn validate_metadata_enums_accepts_known_values() {
        assert!(validate_metadata_enums(&sample_metadata()).is_ok());
    }

    #[test]
    fn validate_metadata_enums_rejects_unknown_grant_type() {
        let mut metadata = sample_metadata();
        metadata.grant_types = vec!["device_code".to_string()];
        assert!(validate_metadata_enums(&metadata).is_err());
    }

    #[test]
    fn validate_metadata_enums_accepts_oidc_response_type_combination() {
        let mut metadata = sample_metadata();
        metadata.response_types = vec!["code id_token".to_string()];
        assert!(validate_metadata_enums(&metadata).is_ok());
    }

    #[test]
    fn validate_metadata_enums_rejects_unknown_auth_method() {
        let mut metadata = sample_metadata();
        metadata.token_endpoint_auth_method = "private_key_jwt".to_string();
        assert!(validate_metadata_enums(&metadata).is_err());
    }
}
