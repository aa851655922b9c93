use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Client, ClientMetadata};

/// Repository for client-application database operations.
#[derive(Clone)]
pub struct ClientRepository {
    pool: MySqlPool,
}

impl ClientRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        client_id: &str,
        client_secret: &str,
        app_name: &str,
        owner_username: &str,
        metadata: &ClientMetadata,
    ) -> Result<Client, AppError> {
        let id = Uuid::new_v4();
        let metadata_json = serde_json::to_value(metadata)
            .map_err(|e| AppError::InternalError(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO clients (id, client_id, client_secret, app_name, owner_username, metadata)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(client_id)
        .bind(client_secret)
        .bind(app_name)
        .bind(owner_username)
        .bind(&metadata_json)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_insert)?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::DatabaseInsertError("client row missing after insert".into()))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Client>, AppError> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT id, client_id, client_secret, app_name, owner_username, issued_at, metadata
            FROM clients
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    pub async fn find_by_client_id(&self, client_id: &str) -> Result<Option<Client>, AppError> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT id, client_id, client_secret, app_name, owner_username, issued_at, metadata
            FROM clients
            WHERE client_id = ?
            "#,
        )
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    pub async fn find_by_app_name(&self, app_name: &str) -> Result<Option<Client>, AppError> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT id, client_id, client_secret, app_name, owner_username, issued_at, metadata
            FROM clients
            WHERE app_name = ?
            "#,
        )
        .bind(app_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    /// Full-replace of the metadata document (read-modify-write), never a field patch.
    pub async fn update_metadata(&self, client_id: &str, metadata: &ClientMetadata) -> Result<Client, AppError> {
        let metadata_json = serde_json::to_value(metadata)
            .map_err(|e| AppError::InternalError(e.into()))?;

        let result = sqlx::query(
            r#"
            UPDATE clients
            SET metadata = ?
            WHERE client_id = ?
            "#,
        )
        .bind(&metadata_json)
        .bind(client_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_update)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NoData);
        }

        self.find_by_client_id(client_id)
            .await?
            .ok_or(AppError::NoData)
    }

    pub async fn delete(&self, client_id: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM clients
            WHERE client_id = ?
            "#,
        )
        .bind(client_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_delete)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NoData);
        }

        Ok(())
    }

    pub async fn list_all(&self) -> Result<Vec<Client>, AppError> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT id, client_id, client_secret, app_name, owner_username, issued_at, metadata
            FROM clients
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    pub async fn list_by_owner(&self, owner_username: &str) -> Result<Vec<Client>, AppError> {
        sqlx::query_as::<_, Client>(
            r#"
            SELECT id, client_id, client_secret, app_name, owner_username, issued_at, metadata
            FROM clients
            WHERE owner_username = ?
            ORDER BY issued_at DESC
            "#,
        )
        .bind(owner_username)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    pub async fn is_owner(&self, client_id: &str, owner_username: &str) -> Result<bool, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM clients
            WHERE client_id = ? AND owner_username = ?
            "#,
        )
        .bind(client_id)
        .bind(owner_username)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from_query)?;

        Ok(count > 0)
    }
}
