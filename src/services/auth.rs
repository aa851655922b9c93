use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::json;
use sqlx::MySqlPool;

use crate::error::AppError;
use crate::models::{Client, User};
use crate::repositories::{AdminUserRepository, ClientRepository, LoginRecordRepository, TokenRepository, UserRepository};
use crate::services::session_cache::SessionCache;
use crate::utils::jwt::{self, Extras, ISSUER};
use crate::utils::password::{hash_password, verify_password};

const USER_SESSION_TTL_SECS: i64 = 5 * 24 * 60 * 60;
const ADMIN_SESSION_TTL_SECS: i64 = 2 * 60 * 60;

pub enum LoginKind {
    User,
    Admin,
}

/// Result of an operation that fans out to external callbacks: the primary
/// mutation always commits, but some outbound call may have failed.
pub enum FanOutOutcome {
    Succeeded,
    PartialSucceeded(String),
}

/// Registration, login, password reset, and cross-application logout.
#[derive(Clone)]
pub struct AccountManager {
    user_repo: UserRepository,
    admin_repo: AdminUserRepository,
    client_repo: ClientRepository,
    token_repo: TokenRepository,
    login_record_repo: LoginRecordRepository,
    session_cache: Arc<SessionCache>,
    http_client: reqwest::Client,
    shared_secret: String,
}

impl AccountManager {
    pub fn new(
        pool: MySqlPool,
        session_cache: Arc<SessionCache>,
        http_client: reqwest::Client,
        shared_secret: String,
    ) -> Self {
        Self {
            user_repo: UserRepository::new(pool.clone()),
            admin_repo: AdminUserRepository::new(pool.clone()),
            client_repo: ClientRepository::new(pool.clone()),
            token_repo: TokenRepository::new(pool.clone()),
            login_record_repo: LoginRecordRepository::new(pool),
            session_cache,
            http_client,
            shared_secret,
        }
    }

    /// Creates the user, then fans out a scope-projected `{username, email?}`
    /// payload to every registered client's `register_callback_uris`. A
    /// callback failure never rolls back the registration.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<FanOutOutcome, AppError> {
        if self.user_repo.find_by_username(username).await?.is_some() {
            return Err(AppError::DataExist);
        }

        let password_hash = hash_password(password)?;
        let user = self.user_repo.create(username, &password_hash, email, phone).await?;

        let clients = self.client_repo.list_all().await?;
        let mut any_failed = false;

        for client in &clients {
            if client.metadata.register_callback_uris.is_empty() {
                continue;
            }

            let payload = project_registration_info(&user, client);

            for uri in &client.metadata.register_callback_uris {
                let delivered = self.http_client.post(uri).json(&payload).send().await;
                if !matches!(delivered, Ok(resp) if resp.status().is_success()) {
                    any_failed = true;
                }
            }
        }

        if any_failed {
            Ok(FanOutOutcome::PartialSucceeded(
                "one or more registration callbacks failed".to_string(),
            ))
        } else {
            Ok(FanOutOutcome::Succeeded)
        }
    }

    /// Mints a session JWT signed with the process-wide shared secret and
    /// records it in the session cache. Returns the bare JWT; the manager
    /// prefix (`"bearer "`) is applied by the cache, not the returned value.
    pub async fn login(&self, kind: LoginKind, username: &str, password: &str) -> Result<String, AppError> {
        match kind {
            LoginKind::User => {
                let user = self
                    .user_repo
                    .find_by_username(username)
                    .await?
                    .ok_or(AppError::LoginError)?;

                if !verify_password(password, &user.password_hash)? {
                    return Err(AppError::PasswordError);
                }

                let token = jwt::generate(&self.shared_secret, USER_SESSION_TTL_SECS, username, ISSUER, Extras::default());
                self.session_cache.set_user_token(username, &token);
                Ok(token)
            }
            LoginKind::Admin => {
                let admin = self
                    .admin_repo
                    .find_by_username(username)
                    .await?
                    .ok_or(AppError::LoginError)?;

                if !verify_password(password, &admin.password_hash)? {
                    return Err(AppError::PasswordError);
                }

                let token = jwt::generate(&self.shared_secret, ADMIN_SESSION_TTL_SECS, username, ISSUER, Extras::default());
                self.session_cache.set_manager_token(username, &token);
                Ok(token)
            }
        }
    }

    /// Only an authenticated AdminUser may reset another account's
    /// password; `acting_admin` names the subject already verified by the
    /// admin-session middleware.
    pub async fn reset_password(&self, acting_admin: &str, target_username: &str, default_password: &str) -> Result<(), AppError> {
        self.admin_repo
            .find_by_username(acting_admin)
            .await?
            .ok_or(AppError::PermissionError)?;

        let hash = hash_password(default_password)?;
        self.user_repo.update_password(target_username, &hash).await
    }

    /// Fans out a logout notification to every cross-application
    /// `logout_url` recorded for `username`, then clears its Tokens and
    /// LoginRecords. Outbound failures never block the deletion.
    pub async fn application_logout(&self, username: &str) -> Result<FanOutOutcome, AppError> {
        let records = self.login_record_repo.list_by_username(username).await?;

        let mut calls = Vec::new();
        for record in &records {
            let client_secret = self
                .client_repo
                .find_by_client_id(&record.client_id)
                .await?
                .map(|c| c.client_secret)
                .unwrap_or_default();

            let encrypted_string = encode_logout_payload(&record.client_id, &client_secret);
            let body = json!({ "username": username, "encrypted_string": encrypted_string });

            for url in record.logout_urls() {
                calls.push(self.http_client.post(&url).json(&body).send());
            }
        }

        let results = futures::future::join_all(calls).await;
        let any_failed = results
            .iter()
            .any(|r| !matches!(r, Ok(resp) if resp.status().is_success()));

        self.token_repo.delete_all_for_username(username).await?;
        self.login_record_repo.delete_all_for_username(username).await?;

        if any_failed {
            Ok(FanOutOutcome::PartialSucceeded(
                "one or more logout callbacks failed".to_string(),
            ))
        } else {
            Ok(FanOutOutcome::Succeeded)
        }
    }
}

/// Projects the registering user through `client`'s stored scope list: a
/// client without `email` in scope never receives the user's email.
fn project_registration_info(user: &User, client: &Client) -> serde_json::Value {
    let scopes = client.allowed_scopes();
    let mut obj = serde_json::Map::new();
    obj.insert("username".to_string(), json!(user.username));
    if scopes.iter().any(|s| s == "email") {
        obj.insert("email".to_string(), json!(user.email));
    }
    serde_json::Value::Object(obj)
}

fn encode_logout_payload(client_id: &str, client_secret: &str) -> String {
    let payload = json!({ client_id: client_secret });
    STANDARD.encode(payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClientMetadata;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_client(scope: &str) -> Client {
        Client {
            id: Uuid::new_v4(),
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            app_name: "app".to_string(),
            owner_username: "admin".to_string(),
            issued_at: Utc::now(),
            metadata: ClientMetadata {
                client_name: "App".to_string(),
                client_uri: None,
                skip_authorization: false,
                register_callback_uris: vec![],
                logout_callback_uris: vec![],
                redirect_uris: vec![],
                scope: scope.to_string(),
                grant_types: vec![],
                response_types: vec![],
                token_endpoint_auth_method: "client_secret_post".to_string(),
            },
        }
    }

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            password_hash: "$argon2id$...".to_string(),
            email: Some("alice@example.com".to_string()),
            phone: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn projection_includes_email_when_scope_has_it() {
        let user = sample_user();
        let client = sample_client("username email openid");
        let projected = project_registration_info(&user, &client);
        assert_eq!(projected["email"], "alice@example.com");
    }

    #[test]
    fn projection_omits_email_without_scope() {
        let user = sample_user();
        let client = sample_client("username openid");
        let projected = project_registration_info(&user, &client);
        assert!(projected.get("email").is_none());
    }

    #[test]
    fn logout_payload_round_trips_through_base64_json() {
        let encoded = encode_logout_payload("client-1", "shh");
        let decoded = STANDARD.decode(encoded).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(value["client-1"], "shh");
    }
}
