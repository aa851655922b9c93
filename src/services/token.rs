use chrono::{Duration, Utc};
use serde_json::json;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Client, Token, User};
use crate::repositories::{ClientRepository, LoginRecordRepository, TokenRepository};
use crate::utils::jwt::{self, DecodeError, Extras, ISSUER};

/// Claims extracted from a successfully decoded, live access token.
pub struct Introspected {
    pub username: String,
    pub scope: String,
    pub client_id: String,
}

/// Bearer token generation, refresh rotation, introspection, and
/// revocation. Every access/refresh/ID token minted here is signed with the
/// owning client's own `client_secret`, never the process-wide shared
/// secret (that one signs session JWTs only, in the Account Manager).
#[derive(Clone)]
pub struct TokenService {
    token_repo: TokenRepository,
    client_repo: ClientRepository,
    login_record_repo: LoginRecordRepository,
    token_expires_in: i64,
    refresh_token_expires_in: i64,
    id_token_expires_in: i64,
}

impl TokenService {
    pub fn new(
        pool: MySqlPool,
        token_expires_in: i64,
        refresh_token_expires_in: i64,
        id_token_expires_in: i64,
    ) -> Self {
        Self {
            token_repo: TokenRepository::new(pool.clone()),
            client_repo: ClientRepository::new(pool.clone()),
            login_record_repo: LoginRecordRepository::new(pool),
            token_expires_in,
            refresh_token_expires_in,
            id_token_expires_in,
        }
    }

    /// Mints and persists an access token, optionally paired with a refresh
    /// token.
    pub async fn issue(
        &self,
        client: &Client,
        user_id: Uuid,
        username: &str,
        scope: &str,
        include_refresh: bool,
    ) -> Result<Token, AppError> {
        let jti = Uuid::new_v4().to_string();
        let access_token = jwt::generate(
            &client.client_secret,
            self.token_expires_in,
            username,
            &client.client_id,
            Extras { iss: Some(ISSUER.to_string()), scope: Some(scope.to_string()), jti: Some(jti) },
        );

        let refresh_token = include_refresh.then(|| {
            jwt::generate(
                &client.client_secret,
                self.refresh_token_expires_in,
                username,
                &client.client_id,
                Extras {
                    iss: Some(ISSUER.to_string()),
                    scope: Some(scope.to_string()),
                    jti: Some(Uuid::new_v4().to_string()),
                },
            )
        });

        let account_token_exp = (Utc::now() + Duration::seconds(self.token_expires_in)).timestamp();
        let metadata = json!({
            "expires_in": self.token_expires_in,
            "account_token_exp": account_token_exp,
            "refresh_token_expires_in": include_refresh.then_some(self.refresh_token_expires_in),
        });

        self.token_repo
            .create(
                &access_token,
                refresh_token.as_deref(),
                &client.client_id,
                user_id,
                username,
                scope,
                self.token_expires_in,
                include_refresh.then_some(self.refresh_token_expires_in),
                &metadata,
            )
            .await
    }

    /// Emits an OIDC ID token whose signing key is the client's own secret
    /// and whose audience is the client's external id.
    pub fn issue_id_token(&self, client: &Client, user: &User, scope: &[String], nonce: Option<&str>) -> String {
        let mut user_claims = json!({ "id": user.id.to_string(), "username": user.username });
        if scope.iter().any(|s| s == "email") {
            user_claims["email"] = json!(user.email);
        }
        if let Some(nonce) = nonce {
            user_claims["nonce"] = json!(nonce);
        }

        jwt::generate_id_token(
            &client.client_secret,
            self.id_token_expires_in,
            &user.username,
            &client.client_id,
            Extras { iss: Some(ISSUER.to_string()), scope: Some(scope.join(" ")), jti: None },
            user_claims,
        )
    }

    /// Rotates `access_token` in place; the refresh token itself is
    /// unchanged. Returns the new live [`Token`] row.
    pub async fn refresh(&self, client: &Client, refresh_token: &str) -> Result<Token, AppError> {
        let token = self
            .token_repo
            .find_live_by_refresh_token(refresh_token)
            .await?
            .ok_or(AppError::TokenError)?;

        if token.client_id != client.client_id {
            return Err(AppError::TokenError);
        }

        let jti = Uuid::new_v4().to_string();
        let new_access_token = jwt::generate(
            &client.client_secret,
            self.token_expires_in,
            &token.username,
            &client.client_id,
            Extras { iss: Some(ISSUER.to_string()), scope: Some(token.scope.clone()), jti: Some(jti) },
        );

        let account_token_exp = (Utc::now() + Duration::seconds(self.token_expires_in)).timestamp();
        let mut metadata = token.metadata.clone();
        metadata["expires_in"] = json!(self.token_expires_in);
        metadata["account_token_exp"] = json!(account_token_exp);

        self.token_repo
            .rotate_access_token(token.id, &new_access_token, self.token_expires_in, &metadata)
            .await
    }

    /// Validates `(token_string, client_id)`, records the first-use
    /// LoginRecord at this client, and returns the subject.
    pub async fn introspect(&self, token_string: &str, client_id: &str) -> Result<Introspected, AppError> {
        let client = self
            .client_repo
            .find_by_client_id(client_id)
            .await?
            .ok_or(AppError::TokenError)?;

        let claims = jwt::decode(token_string, &client.client_secret, &client.client_id).map_err(decode_err)?;

        let token = self
            .token_repo
            .find_by_access_token(token_string)
            .await?
            .ok_or(AppError::TokenError)?;

        if token.username != claims.sub || token.client_id != client.client_id {
            return Err(AppError::TokenError);
        }

        let logout_url = client.metadata.logout_callback_uris.join(",");
        self.login_record_repo
            .create_if_absent(&token.username, &client.client_id, &logout_url)
            .await?;

        Ok(Introspected { username: token.username, scope: token.scope, client_id: token.client_id })
    }

    /// RFC 7009 revocation: accepts either an access or a refresh token
    /// string and revokes whichever side matches.
    pub async fn revoke(&self, token_string: &str) -> Result<(), AppError> {
        if self.token_repo.find_by_access_token(token_string).await?.is_some() {
            return self.token_repo.revoke_access_token(token_string).await;
        }

        if self.token_repo.find_by_refresh_token(token_string).await?.is_some() {
            return self.token_repo.revoke_refresh_token(token_string).await;
        }

        Err(AppError::NoData)
    }

    /// Validates a bearer token presented to a protected resource: rejects
    /// absent, revoked, or cross-client tokens, and verifies the caller
    /// holds every scope in `required`.
    pub async fn validate_for_resource(
        &self,
        access_token: &str,
        client_id: &str,
        required_scopes: &[String],
    ) -> Result<Token, AppError> {
        let token = self
            .token_repo
            .find_by_access_token(access_token)
            .await?
            .ok_or(AppError::TokenError)?;

        if token.is_access_token_revoked() || token.client_id != client_id {
            return Err(AppError::TokenError);
        }

        if !token.has_all_scopes(required_scopes) {
            return Err(AppError::PermissionError);
        }

        Ok(token)
    }
}

fn decode_err(err: DecodeError) -> AppError {
    match err {
        DecodeError::Expired => AppError::TokenExpire,
        DecodeError::Invalid => AppError::TokenError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_err_maps_expired_distinctly_from_invalid() {
        assert!(matches!(decode_err(DecodeError::Expired), AppError::TokenExpire));
        assert!(matches!(decode_err(DecodeError::Invalid), AppError::TokenError));
    }
}
