use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::AdminUser;

/// Repository for operator-account database operations.
#[derive(Clone)]
pub struct AdminUserRepository {
    pool: MySqlPool,
}

impl AdminUserRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, username: &str, password_hash: &str) -> Result<AdminUser, AppError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO admin_users (id, username, password_hash)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(username)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_insert)?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::DatabaseInsertError("admin_user row missing after insert".into()))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<AdminUser>, AppError> {
        sqlx::query_as::<_, AdminUser>(
            r#"
            SELECT id, username, password_hash, created_at
            FROM admin_users
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<AdminUser>, AppError> {
        sqlx::query_as::<_, AdminUser>(
            r#"
            SELECT id, username, password_hash, created_at
            FROM admin_users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }
}
