use sqlx::MySqlPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::User;

/// Repository for end-user database operations.
#[derive(Clone)]
pub struct UserRepository {
    pool: MySqlPool,
}

impl UserRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<User, AppError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, email, phone)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(username)
        .bind(password_hash)
        .bind(email)
        .bind(phone)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_insert)?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::DatabaseInsertError("user row missing after insert".into()))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email, phone, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, email, phone, created_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_query)
    }

    pub async fn update_password(&self, username: &str, new_password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?
            WHERE username = ?
            "#,
        )
        .bind(new_password_hash)
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_update)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NoData);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use sqlx::MySqlPool;

    use super::UserRepository;
    use crate::error::AppError;

    fn username_strategy() -> impl Strategy<Value = String> {
        "[a-z]{3,10}[0-9]{2,6}".prop_map(|s| s)
    }

    fn password_hash_strategy() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9]{60,80}".prop_map(|s| format!("$argon2id$v=19$m=19456,t=2,p=1${}", s))
    }

    async fn setup_test_db() -> MySqlPool {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");

        let pool = sqlx::mysql::MySqlPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("failed to create pool");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("failed to run migrations");

        pool
    }

    async fn cleanup(pool: &MySqlPool, usernames: &[String]) {
        for username in usernames {
            let _ = sqlx::query("DELETE FROM users WHERE username = ?")
                .bind(username)
                .execute(pool)
                .await;
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_username_uniqueness(
            username in username_strategy(),
            hash1 in password_hash_strategy(),
            hash2 in password_hash_strategy(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let pool = setup_test_db().await;
                let repo = UserRepository::new(pool.clone());
                cleanup(&pool, &[username.clone()]).await;

                let first = repo.create(&username, &hash1, None, None).await;
                prop_assert!(first.is_ok());

                let second = repo.create(&username, &hash2, None, None).await;
                match second {
                    Err(AppError::RepeatData) => {}
                    other => prop_assert!(false, "expected RepeatData, got {:?}", other.map(|_| ())),
                }

                cleanup(&pool, &[username]).await;
                Ok(())
            })?;
        }
    }
}
