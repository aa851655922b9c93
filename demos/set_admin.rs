use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use sqlx::mysql::MySqlPoolOptions;
use uuid::Uuid;

/// Seeds (or re-seeds) an AdminUser row so a fresh deployment has a manager
/// account to register clients and reset end-user passwords with.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")?;
    let pool = MySqlPoolOptions::new().connect(&database_url).await?;

    let username = std::env::var("SEED_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let password = std::env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "Password123!".to_string());

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| format!("password hashing failed: {e}"))?
        .to_string();

    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM admin_users WHERE username = ?")
        .bind(&username)
        .fetch_optional(&pool)
        .await?;

    match existing {
        Some((id,)) => {
            sqlx::query("UPDATE admin_users SET password_hash = ? WHERE id = ?")
                .bind(&password_hash)
                .bind(&id)
                .execute(&pool)
                .await?;
            println!("Updated password for existing admin user '{username}'");
        }
        None => {
            let id = Uuid::new_v4();
            sqlx::query("INSERT INTO admin_users (id, username, password_hash) VALUES (?, ?, ?)")
                .bind(id.to_string())
                .bind(&username)
                .bind(&password_hash)
                .execute(&pool)
                .await?;
            println!("Created admin user '{username}'");
        }
    }

    Ok(())
}
