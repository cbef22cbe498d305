pub mod models;

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        // Ensure the data directory exists
        if let Some(path) = url.strip_prefix("sqlite:") {
            let path = path.trim_start_matches("//");
            let path = path.split('?').next().unwrap_or(path);
            if !path.contains(":memory:") {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;

        Ok(Self { pool })
    }

    /// Keeps trying to reach the datastore, waiting `delay` between attempts.
    pub async fn connect_with_retry(
        url: &str,
        attempts: u32,
        delay: Duration,
    ) -> anyhow::Result<Self> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            match Self::connect(url).await {
                Ok(db) => return Ok(db),
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        attempt,
                        retries_left = attempts - attempt,
                        error = %e,
                        "Database connection failed, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(attempts, error = %e, "Database connection failed after retries");
                    return Err(e);
                }
            }
        }
    }

    /// A private in-memory database on a single connection that never expires.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Fixed-width UTC RFC 3339 text, so that string order matches time order.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now() -> String {
    timestamp(Utc::now())
}
