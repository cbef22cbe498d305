use std::env;
use std::time::Duration;

use crate::services::mailer::SmtpConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub database_connect_attempts: u32,
    pub database_connect_delay: Duration,
    pub upload_dir: String,
    /// Prefix used when turning stored `/uploads/...` paths into absolute URLs.
    pub public_base_url: String,
    /// Base of the links placed in password-reset mails.
    pub frontend_url: String,
    pub cors_origin: String,
    pub jwt_secret: String,
    pub jwt_expires_in: chrono::Duration,
    /// Argon2 time cost.
    pub password_hash_cost: u32,
    pub reset_token_expires_min: i64,
    /// Development-only: hand the reset token back to the caller when no mail went out.
    pub expose_reset_token: bool,
    pub max_body_bytes: usize,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(4000);

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using an insecure development secret");
            "development-secret-change-in-production".to_string()
        });

        let jwt_expires_in = match env::var("JWT_EXPIRES_IN") {
            Ok(value) => parse_duration(&value).unwrap_or_else(|| {
                tracing::warn!(value = %value, "Invalid JWT_EXPIRES_IN, using 1d");
                chrono::Duration::days(1)
            }),
            Err(_) => chrono::Duration::days(1),
        };

        Self {
            port,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./data/profile-site.db?mode=rwc".to_string()),
            database_connect_attempts: env_parse("DATABASE_CONNECT_ATTEMPTS", 12),
            database_connect_delay: Duration::from_secs(env_parse(
                "DATABASE_CONNECT_DELAY_SECS",
                3,
            )),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            cors_origin: env::var("ALLOW_ORIGIN").unwrap_or_else(|_| "*".to_string()),
            jwt_secret,
            jwt_expires_in,
            password_hash_cost: env_parse("PASSWORD_HASH_COST", 2),
            reset_token_expires_min: env_parse("RESET_TOKEN_EXPIRES_MIN", 30),
            expose_reset_token: env_flag("EXPOSE_RESET_TOKEN"),
            max_body_bytes: env_parse("MAX_BODY_BYTES", 10 * 1024 * 1024),
            smtp: SmtpConfig::from_env(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Parses lifetimes such as `90`, `45s`, `30m`, `12h` or `1d`.
/// A bare number is read as seconds. Out-of-range amounts give `None`.
pub fn parse_duration(value: &str) -> Option<chrono::Duration> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);
    let amount: i64 = amount.parse().ok()?;

    match unit {
        "" | "s" => chrono::Duration::try_seconds(amount),
        "m" => chrono::Duration::try_minutes(amount),
        "h" => chrono::Duration::try_hours(amount),
        "d" => chrono::Duration::try_days(amount),
        _ => None,
    }
}
