use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::LoginRecord;

/// Repository for cross-application SSO login-record bookkeeping.
#[derive(Clone)]
pub struct LoginRecordRepository {
    pool: MySqlPool,
}

impl LoginRecordRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, username: &str, client_id: &str) -> Result<Option<LoginRecord>, AppError> {
        sqlx::query_as::<_, LoginRecord>(
            r#"
            SELECT id, username, client_id, logout_url, login_time
            FROM login_records
            WHERE username = ? AND client_id = ?
            "#,
        )
        .bind(username)
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    /// Inserts a record for `(username, client_id)` unless one already
    /// exists. Introspection records at most one login per pair.
    pub async fn create_if_absent(
        &self,
        username: &str,
        client_id: &str,
        logout_url: &str,
    ) -> Result<(), AppError> {
        if self.find(username, client_id).await?.is_some() {
            return Ok(());
        }

        let id = Uuid::new_v4();
        let result = sqlx::query(
            r#"
            INSERT INTO login_records (id, username, client_id, logout_url)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(username)
        .bind(client_id)
        .bind(logout_url)
        .execute(&self.pool)
        .await;

        // A race that loses to a concurrent insert of the same pair is not
        // an error. The pair now has exactly one record either way.
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate(&e) => Ok(()),
            Err(e) => Err(AppError::from_insert(e)),
        }
    }

    pub async fn list_by_username(&self, username: &str) -> Result<Vec<LoginRecord>, AppError> {
        sqlx::query_as::<_, LoginRecord>(
            r#"
            SELECT id, username, client_id, logout_url, login_time
            FROM login_records
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    pub async fn delete_all_for_username(&self, username: &str) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM login_records WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(AppError::from_delete)?;

        Ok(result.rows_affected())
    }
}

fn is_duplicate(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().map(|c| c == "23000").unwrap_or(false)
            || db_err.message().contains("Duplicate entry");
    }
    false
}
