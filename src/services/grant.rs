use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Client;
use crate::repositories::{AuthorizationCodeRepository, ClientRepository, ClientScopeGrantRepository, UserRepository};
use crate::services::token::TokenService;
use crate::utils::password::verify_password;
use crate::utils::pkce::{self, constant_time_compare};
use crate::utils::secret::generate_salt;

const AUTHORIZATION_CODE_LENGTH: usize = 40;

pub struct AuthorizeRequest {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    /// The full incoming request URI, carried forward as a query parameter
    /// on the login redirect so the browser returns here after signing in.
    pub original_uri: String,
}

pub enum AuthorizeOutcome {
    Issued { redirect_uri: String },
    RedirectConsent { consent_uri: String },
    RedirectLogin { login_uri: String },
}

pub struct TokenRequest {
    pub grant_type: String,
    pub client_id: String,
    pub client_secret: String,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scope: Option<String>,
}

pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub scope: String,
}

/// One handler per OAuth2 grant class, behind a single trait (the grant
/// state machines "collapse" to this shape rather than a class hierarchy).
pub trait Grant {
    async fn issue(&self, engine: &GrantEngine, req: &TokenRequest) -> Result<IssuedTokens, AppError>;
}

struct AuthorizationCodeGrant;
struct PasswordGrant;
struct ClientCredentialsGrant;
struct RefreshTokenGrant;

impl Grant for AuthorizationCodeGrant {
    async fn issue(&self, engine: &GrantEngine, req: &TokenRequest) -> Result<IssuedTokens, AppError> {
        let client = engine.authenticate_client(&req.client_id, &req.client_secret).await?;

        let code_str = req.code.as_deref().ok_or_else(|| AppError::ParamError("code is required".into()))?;
        let redirect_uri = req
            .redirect_uri
            .as_deref()
            .ok_or_else(|| AppError::ParamError("redirect_uri is required".into()))?;

        let code = engine.code_repo.take(code_str).await?.ok_or(AppError::TokenError)?;

        if code.client_id != client.client_id || code.redirect_uri != redirect_uri {
            return Err(AppError::TokenError);
        }

        if let Some(challenge) = &code.code_challenge {
            let verifier = req
                .code_verifier
                .as_deref()
                .ok_or_else(|| AppError::ParamError("code_verifier is required".into()))?;
            let method = code.code_challenge_method.as_deref().unwrap_or(pkce::PKCE_METHOD_PLAIN);
            if !pkce::verify_pkce(verifier, challenge, method) {
                return Err(AppError::TokenError);
            }
        }

        let user = engine
            .user_repo
            .find_by_username(&code.username)
            .await?
            .ok_or(AppError::NoData)?;

        let scopes = code.scopes();
        let include_refresh = scopes.iter().any(|s| s == "offline_access") && client.supports_grant_type("refresh_token");

        let token = engine
            .token_service
            .issue(&client, user.id, &user.username, &code.scope, include_refresh)
            .await?;

        let id_token = scopes
            .iter()
            .any(|s| s == "openid")
            .then(|| engine.token_service.issue_id_token(&client, &user, &scopes, code.nonce.as_deref()));

        Ok(IssuedTokens {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            id_token,
            token_type: "Bearer",
            expires_in: token.expires_in,
            scope: token.scope,
        })
    }
}

impl Grant for PasswordGrant {
    async fn issue(&self, engine: &GrantEngine, req: &TokenRequest) -> Result<IssuedTokens, AppError> {
        let client = engine.authenticate_client(&req.client_id, &req.client_secret).await?;
        if !client.supports_grant_type("password") {
            return Err(AppError::PermissionError);
        }

        let username = req.username.as_deref().ok_or_else(|| AppError::ParamError("username is required".into()))?;
        let password = req.password.as_deref().ok_or_else(|| AppError::ParamError("password is required".into()))?;

        let user = engine.user_repo.find_by_username(username).await?.ok_or(AppError::LoginError)?;
        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::PasswordError);
        }

        let requested = req.scope.as_deref().unwrap_or(&client.metadata.scope);
        let requested_scopes = split_scope(requested);
        if !requested_scopes.iter().all(|s| client.allowed_scopes().contains(s)) {
            return Err(AppError::ParamError("invalid_scope".into()));
        }

        let token = engine.token_service.issue(&client, user.id, &user.username, requested, true).await?;

        Ok(IssuedTokens {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            id_token: None,
            token_type: "Bearer",
            expires_in: token.expires_in,
            scope: token.scope,
        })
    }
}

impl Grant for ClientCredentialsGrant {
    async fn issue(&self, engine: &GrantEngine, req: &TokenRequest) -> Result<IssuedTokens, AppError> {
        let client = engine.authenticate_client(&req.client_id, &req.client_secret).await?;
        if !client.supports_grant_type("client_credentials") {
            return Err(AppError::PermissionError);
        }

        let requested = req.scope.as_deref().unwrap_or(&client.metadata.scope);
        let requested_scopes = split_scope(requested);
        if !requested_scopes.iter().all(|s| client.allowed_scopes().contains(s)) {
            return Err(AppError::ParamError("invalid_scope".into()));
        }

        // No end-user is party to this grant; the client authenticates as
        // its own subject.
        let subject = format!("client:{}", client.client_id);
        let token = engine.token_service.issue(&client, Uuid::nil(), &subject, requested, false).await?;

        Ok(IssuedTokens {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            id_token: None,
            token_type: "Bearer",
            expires_in: token.expires_in,
            scope: token.scope,
        })
    }
}

impl Grant for RefreshTokenGrant {
    async fn issue(&self, engine: &GrantEngine, req: &TokenRequest) -> Result<IssuedTokens, AppError> {
        let client = engine.authenticate_client(&req.client_id, &req.client_secret).await?;
        let refresh_token = req
            .refresh_token
            .as_deref()
            .ok_or_else(|| AppError::ParamError("refresh_token is required".into()))?;

        let token = engine.token_service.refresh(&client, refresh_token).await?;

        Ok(IssuedTokens {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            id_token: None,
            token_type: "Bearer",
            expires_in: token.expires_in,
            scope: token.scope,
        })
    }
}

/// Authorize-step request validation, the authorization-code lifecycle,
/// scope/consent resolution, and the token-endpoint grant dispatch.
pub struct GrantEngine {
    client_repo: ClientRepository,
    code_repo: AuthorizationCodeRepository,
    scope_grant_repo: ClientScopeGrantRepository,
    user_repo: UserRepository,
    token_service: TokenService,
}

impl GrantEngine {
    pub fn new(pool: MySqlPool, token_service: TokenService) -> Self {
        Self {
            client_repo: ClientRepository::new(pool.clone()),
            code_repo: AuthorizationCodeRepository::new(pool.clone()),
            scope_grant_repo: ClientScopeGrantRepository::new(pool.clone()),
            user_repo: UserRepository::new(pool),
            token_service,
        }
    }

    async fn authenticate_client(&self, client_id: &str, client_secret: &str) -> Result<Client, AppError> {
        let client = self.client_repo.find_by_client_id(client_id).await?.ok_or(AppError::TokenError)?;
        if !constant_time_compare(&client.client_secret, client_secret) {
            return Err(AppError::TokenError);
        }
        Ok(client)
    }

    /// The effective scope allow-list a grant may draw from: the client's
    /// own scope when it skips consent, else a live consent grant's scope,
    /// else falling back to the client's stored scope.
    async fn effective_allow_list(&self, client: &Client, username: &str) -> Result<Vec<String>, AppError> {
        if client.metadata.skip_authorization {
            return Ok(client.allowed_scopes());
        }

        if let Some(grant) = self.scope_grant_repo.find_live(username, &client.client_id).await? {
            return Ok(grant.scopes());
        }

        Ok(client.allowed_scopes())
    }

    /// Drives the `START → AUTHENTICATED? → CONSENTED? → ISSUE_CODE/TOKEN`
    /// state machine for the authorize endpoint, covering the
    /// authorization_code, implicit, and hybrid response types.
    pub async fn authorize(&self, req: AuthorizeRequest, session_username: Option<&str>) -> Result<AuthorizeOutcome, AppError> {
        let client = self
            .client_repo
            .find_by_client_id(&req.client_id)
            .await?
            .ok_or_else(|| AppError::ParamError("unknown client_id".into()))?;

        if !client.has_redirect_uri(&req.redirect_uri) {
            return Err(AppError::ParamError("redirect_uri is not registered for this client".into()));
        }

        let Some(username) = session_username else {
            let login_uri = format!("/authhub/oauth/login?redirect_uri={}", urlencoding::encode(&req.original_uri));
            return Ok(AuthorizeOutcome::RedirectLogin { login_uri });
        };

        let requested_scopes = split_scope(&req.scope);
        let effective_allowed = self.effective_allow_list(&client, username).await?;
        if !requested_scopes.iter().all(|s| effective_allowed.contains(s)) {
            return Err(AppError::ParamError("invalid_scope".into()));
        }

        let consented = client.metadata.skip_authorization
            || self
                .scope_grant_repo
                .find_live(username, &client.client_id)
                .await?
                .map(|g| g.covers_scopes(&requested_scopes))
                .unwrap_or(false);

        if !consented {
            return Ok(AuthorizeOutcome::RedirectConsent { consent_uri: "/authhub/oauth/authorize/confirm".to_string() });
        }

        let wants_openid = requested_scopes.iter().any(|s| s == "openid");
        if wants_openid && req.nonce.is_none() {
            return Err(AppError::ParamError("nonce is required for openid requests".into()));
        }
        if let Some(nonce) = &req.nonce {
            if self.code_repo.exists_nonce(&client.client_id, nonce).await? {
                return Err(AppError::ParamError("nonce has already been used".into()));
            }
        }

        let user = self.user_repo.find_by_username(username).await?.ok_or(AppError::NoData)?;

        let response_types = split_scope(&req.response_type);
        let wants_code = response_types.iter().any(|p| p == "code");
        let wants_token = response_types.iter().any(|p| p == "token");
        let wants_id_token = response_types.iter().any(|p| p == "id_token");

        let mut fragments = Vec::new();

        if wants_code {
            let code_str = generate_salt(AUTHORIZATION_CODE_LENGTH);
            self.code_repo
                .create(
                    &code_str,
                    &client.client_id,
                    &req.redirect_uri,
                    &req.scope,
                    username,
                    req.code_challenge.as_deref(),
                    req.code_challenge_method.as_deref(),
                    req.nonce.as_deref(),
                )
                .await?;
            fragments.push(format!("code={code_str}"));
        }

        if wants_token {
            let token = self.token_service.issue(&client, user.id, username, &req.scope, false).await?;
            fragments.push(format!("access_token={}", token.access_token));
            fragments.push("token_type=Bearer".to_string());
            fragments.push(format!("expires_in={}", token.expires_in));
        }

        if wants_id_token {
            let id_token = self.token_service.issue_id_token(&client, &user, &requested_scopes, req.nonce.as_deref());
            fragments.push(format!("id_token={id_token}"));
        }

        if let Some(state) = &req.state {
            fragments.push(format!("state={state}"));
        }

        let separator = if wants_code && !wants_token && !wants_id_token { '?' } else { '#' };
        let redirect_uri = format!("{}{}{}", req.redirect_uri, separator, fragments.join("&"));

        Ok(AuthorizeOutcome::Issued { redirect_uri })
    }

    /// Dispatches to the grant handler named by `req.grant_type`.
    pub async fn token(&self, req: TokenRequest) -> Result<IssuedTokens, AppError> {
        match req.grant_type.as_str() {
            "authorization_code" => AuthorizationCodeGrant.issue(self, &req).await,
            "password" => PasswordGrant.issue(self, &req).await,
            "client_credentials" => ClientCredentialsGrant.issue(self, &req).await,
            "refresh_token" => RefreshTokenGrant.issue(self, &req).await,
            other => Err(AppError::ParamError(format!("unsupported grant_type: {other}"))),
        }
    }

    /// Records the user's consent decision for `(username, client_id, scope)`.
    pub async fn confirm_consent(&self, username: &str, client_id: &str, scope: &str, expires_in: i64) -> Result<(), AppError> {
        self.scope_grant_repo.upsert(username, client_id, scope, expires_in).await?;
        Ok(())
    }
}

fn split_scope(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_scope_handles_empty_string() {
        assert!(split_scope("").is_empty());
    }

    #[test]
    fn split_scope_splits_on_whitespace() {
        assert_eq!(split_scope("openid email"), vec!["openid", "email"]);
    }
}
