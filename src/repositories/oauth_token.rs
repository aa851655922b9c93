use chrono::Utc;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Token;

/// Repository for issued-token database operations.
#[derive(Clone)]
pub struct TokenRepository {
    pool: MySqlPool,
}

impl TokenRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
        client_id: &str,
        user_id: Uuid,
        username: &str,
        scope: &str,
        expires_in: i64,
        refresh_token_expires_in: Option<i64>,
        metadata: &serde_json::Value,
    ) -> Result<Token, AppError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO tokens
            (id, access_token, refresh_token, client_id, user_id, username, scope,
             expires_in, refresh_token_expires_in, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(access_token)
        .bind(refresh_token)
        .bind(client_id)
        .bind(user_id.to_string())
        .bind(username)
        .bind(scope)
        .bind(expires_in)
        .bind(refresh_token_expires_in)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_insert)?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::DatabaseInsertError("token row missing after insert".into()))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Token>, AppError> {
        sqlx::query_as::<_, Token>(
            r#"
            SELECT id, access_token, refresh_token, client_id, user_id, username, scope,
                   issued_at, expires_in, refresh_token_expires_in,
                   access_token_revoked_at, refresh_token_revoked_at, metadata
            FROM tokens
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    pub async fn find_by_access_token(&self, access_token: &str) -> Result<Option<Token>, AppError> {
        sqlx::query_as::<_, Token>(
            r#"
            SELECT id, access_token, refresh_token, client_id, user_id, username, scope,
                   issued_at, expires_in, refresh_token_expires_in,
                   access_token_revoked_at, refresh_token_revoked_at, metadata
            FROM tokens
            WHERE access_token = ?
            "#,
        )
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    /// Returns the token only if its refresh side is live, never a token
    /// whose `refresh_token_revoked_at` has already passed.
    pub async fn find_live_by_refresh_token(&self, refresh_token: &str) -> Result<Option<Token>, AppError> {
        sqlx::query_as::<_, Token>(
            r#"
            SELECT id, access_token, refresh_token, client_id, user_id, username, scope,
                   issued_at, expires_in, refresh_token_expires_in,
                   access_token_revoked_at, refresh_token_revoked_at, metadata
            FROM tokens
            WHERE refresh_token = ?
              AND (refresh_token_revoked_at IS NULL OR refresh_token_revoked_at > NOW())
            "#,
        )
        .bind(refresh_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    /// Rotates `access_token` in place, advancing `issued_at` to now and
    /// replacing `expires_in`/`metadata`. The refresh token itself is
    /// unchanged; only the bearer side is reissued.
    pub async fn rotate_access_token(
        &self,
        id: Uuid,
        new_access_token: &str,
        expires_in: i64,
        metadata: &serde_json::Value,
    ) -> Result<Token, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE tokens
            SET access_token = ?, expires_in = ?, metadata = ?, issued_at = ?
            WHERE id = ?
            "#,
        )
        .bind(new_access_token)
        .bind(expires_in)
        .bind(metadata)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(AppError::from_update)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NoData);
        }

        self.find_by_id(id).await?.ok_or(AppError::NoData)
    }

    pub async fn revoke_access_token(&self, access_token: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE tokens
            SET access_token_revoked_at = NOW()
            WHERE access_token = ?
            "#,
        )
        .bind(access_token)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_update)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NoData);
        }

        Ok(())
    }

    pub async fn find_by_refresh_token(&self, refresh_token: &str) -> Result<Option<Token>, AppError> {
        sqlx::query_as::<_, Token>(
            r#"
            SELECT id, access_token, refresh_token, client_id, user_id, username, scope,
                   issued_at, expires_in, refresh_token_expires_in,
                   access_token_revoked_at, refresh_token_revoked_at, metadata
            FROM tokens
            WHERE refresh_token = ?
            "#,
        )
        .bind(refresh_token)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE tokens
            SET refresh_token_revoked_at = NOW()
            WHERE refresh_token = ?
            "#,
        )
        .bind(refresh_token)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_update)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NoData);
        }

        Ok(())
    }

    pub async fn delete_all_for_username(&self, username: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM tokens WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(AppError::from_delete)?;

        Ok(result.rows_affected())
    }

    pub async fn delete_all_for_client(&self, client_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM tokens WHERE client_id = ?")
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from_delete)?;

        Ok(result.rows_affected())
    }
}
