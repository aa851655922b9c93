use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::ClientScopeGrant;

/// Repository for per-(user, client) scope consent records.
#[derive(Clone)]
pub struct ClientScopeGrantRepository {
    pool: MySqlPool,
}

impl ClientScopeGrantRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(
        &self,
        username: &str,
        client_id: &str,
        scope: &str,
        expires_in: i64,
    ) -> Result<ClientScopeGrant, AppError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO client_scope_grants (id, username, client_id, scope, expires_in)
            VALUES (?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE scope = VALUES(scope), expires_in = VALUES(expires_in), granted_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(id.to_string())
        .bind(username)
        .bind(client_id)
        .bind(scope)
        .bind(expires_in)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_insert)?;

        self.find(username, client_id)
            .await?
            .ok_or_else(|| AppError::DatabaseInsertError("client_scope_grant row missing after upsert".into()))
    }

    pub async fn find(&self, username: &str, client_id: &str) -> Result<Option<ClientScopeGrant>, AppError> {
        sqlx::query_as::<_, ClientScopeGrant>(
            r#"
            SELECT id, username, client_id, scope, granted_at, expires_in
            FROM client_scope_grants
            WHERE username = ? AND client_id = ?
            "#,
        )
        .bind(username)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    /// Looks up the grant and evicts it if expired, per the invariant that
    /// an expired grant must not be observed twice.
    pub async fn find_live(&self, username: &str, client_id: &str) -> Result<Option<ClientScopeGrant>, AppError> {
        let grant = self.find(username, client_id).await?;

        match grant {
            Some(g) if g.is_expired() => {
                self.delete(username, client_id).await?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub async fn delete(&self, username: &str, client_id: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            DELETE FROM client_scope_grants
            WHERE username = ? AND client_id = ?
            "#,
        )
        .bind(username)
        .bind(client_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_delete)?;

        Ok(())
    }
}
