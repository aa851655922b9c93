use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::AuthorizationCode;

/// Repository for authorization-code database operations.
///
/// Authorization codes live at most [`AuthorizationCode::TTL_SECS`] seconds
/// and are single-use: exchange must observe expiry or absence atomically
/// with the delete that consumes the code, never the inverse.
#[derive(Clone)]
pub struct AuthorizationCodeRepository {
    pool: MySqlPool,
}

impl AuthorizationCodeRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        scope: &str,
        username: &str,
        code_challenge: Option<&str>,
        code_challenge_method: Option<&str>,
        nonce: Option<&str>,
    ) -> Result<AuthorizationCode, AppError> {
        let id = Uuid::new_v4();

        let mut tx = self.pool.begin().await.map_err(AppError::from_insert)?;

        sqlx::query(
            r#"
            INSERT INTO authorization_codes
            (id, code, client_id, redirect_uri, scope, username, code_challenge, code_challenge_method, nonce)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(code)
        .bind(client_id)
        .bind(redirect_uri)
        .bind(scope)
        .bind(username)
        .bind(code_challenge)
        .bind(code_challenge_method)
        .bind(nonce)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from_insert)?;

        if let Some(nonce) = nonce {
            sqlx::query("INSERT INTO used_nonces (id, client_id, nonce) VALUES (?, ?, ?)")
                .bind(Uuid::new_v4().to_string())
                .bind(client_id)
                .bind(nonce)
                .execute(&mut *tx)
                .await
                .map_err(AppError::from_insert)?;
        }

        tx.commit().await.map_err(AppError::from_insert)?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::DatabaseInsertError("authorization_code row missing after insert".into()))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<AuthorizationCode>, AppError> {
        sqlx::query_as::<_, AuthorizationCode>(
            r#"
            SELECT id, code, client_id, redirect_uri, scope, username,
                   code_challenge, code_challenge_method, nonce, issued_at
            FROM authorization_codes
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    /// Redeems `code`, single-use. Returns `None` both when the code is
    /// absent and when it has expired. An expired code is deleted as a
    /// side effect of the lookup rather than left for a later sweep, and in
    /// both cases the caller sees the same `invalid_grant` outcome. A live
    /// code is deleted and returned so a second concurrent redemption of
    /// the same code observes the delete and also gets `None`.
    pub async fn take(&self, code: &str) -> Result<Option<AuthorizationCode>, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::from_query)?;

        let row = sqlx::query_as::<_, AuthorizationCode>(
            r#"
            SELECT id, code, client_id, redirect_uri, scope, username,
                   code_challenge, code_challenge_method, nonce, issued_at
            FROM authorization_codes
            WHERE code = ?
            FOR UPDATE
            "#,
        )
        .bind(code)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from_query)?;

        let Some(row) = row else {
            tx.commit().await.map_err(AppError::from_query)?;
            return Ok(None);
        };

        sqlx::query("DELETE FROM authorization_codes WHERE id = ?")
            .bind(row.id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(AppError::from_delete)?;

        tx.commit().await.map_err(AppError::from_query)?;

        if row.is_expired() {
            return Ok(None);
        }

        Ok(Some(row))
    }

    /// `(client_id, nonce)` replay check against `used_nonces`, independent
    /// of whether the code that carried the nonce has since been exchanged
    /// or expired and deleted from `authorization_codes`. A nonce is
    /// rejected for the lifetime of its client, not just while its code is
    /// still live.
    pub async fn exists_nonce(&self, client_id: &str, nonce: &str) -> Result<bool, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM used_nonces
            WHERE client_id = ? AND nonce = ?
            "#,
        )
        .bind(client_id)
        .bind(nonce)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from_query)?;

        Ok(count > 0)
    }

    pub async fn delete_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM authorization_codes
            WHERE issued_at < NOW() - INTERVAL 600 SECOND
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(AppError::from_delete)?;

        Ok(result.rows_affected())
    }

    pub async fn delete_all_for_client(&self, client_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM authorization_codes WHERE client_id = ?")
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from_delete)?;

        sqlx::query("DELETE FROM used_nonces WHERE client_id = ?")
            .bind(client_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::from_delete)?;

        Ok(result.rows_affected())
    }
}
