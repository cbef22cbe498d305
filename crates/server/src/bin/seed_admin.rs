//! Creates the initial admin account.
//!
//! Reads `ADMIN_USERNAME` (default `admin`) and `ADMIN_PASSWORD` (required)
//! plus the usual database settings. An existing account is left untouched.

use anyhow::{bail, Context};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use profile_site_server::{
    config::Config,
    db::{self, Database},
    services::password,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seed_admin=info,profile_site_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let username = std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let admin_password = std::env::var("ADMIN_PASSWORD").context("ADMIN_PASSWORD must be set")?;

    if !password::meets_policy(&admin_password) {
        bail!(password::PASSWORD_RULES);
    }

    let db = Database::connect_with_retry(
        &config.database_url,
        config.database_connect_attempts,
        config.database_connect_delay,
    )
    .await?;
    db.run_migrations().await?;

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(&username)
        .fetch_one(&db.pool)
        .await?;

    if existing > 0 {
        tracing::info!(username = %username, "Admin user already exists, nothing to do");
    } else {
        let password_hash = password::hash_password(&admin_password, config.password_hash_cost)?;
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&username)
        .bind(&password_hash)
        .bind(db::now())
        .execute(&db.pool)
        .await?;
        tracing::info!(username = %username, "Admin user created");
    }

    db.close().await;
    Ok(())
}
