use axum::{extract::State, routing::post, Json, Router};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MessageResponse;
use crate::{
    db::{
        self,
        models::{ResetToken, User},
    },
    error::{AppError, Result},
    services::{password, session},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/reset-request", post(request_reset))
        .route("/reset", post(reset_password))
}

/// Returned for every reset request that did not expose a token, whether
/// or not the account exists.
const RESET_REQUESTED_MESSAGE: &str = "If the user exists, a password reset email will be sent";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetRequest {
    pub username: String,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetRequestResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    #[serde(alias = "new_password")]
    pub new_password: String,
}

async fn find_user(pool: &sqlx::SqlitePool, username: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

async fn register(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> Result<Json<MessageResponse>> {
    let username = body.username.trim();
    if username.is_empty() || body.password.is_empty() {
        return Err(AppError::Validation(
            "username and password are required".to_string(),
        ));
    }
    password::validate_password(&body.password)?;

    if find_user(&state.db.pool, username).await?.is_some() {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    let password_hash = password::hash_password(&body.password, state.config.password_hash_cost)?;
    let user_id = Uuid::new_v4().to_string();

    // A concurrent registration surfaces as a unique violation, i.e. 409.
    sqlx::query("INSERT INTO users (id, username, password_hash, created_at) VALUES (?, ?, ?, ?)")
        .bind(&user_id)
        .bind(username)
        .bind(&password_hash)
        .bind(db::now())
        .execute(&state.db.pool)
        .await?;

    tracing::info!(user_id = %user_id, username = %username, "User registered");

    Ok(Json(MessageResponse::new("User created")))
}

async fn login(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<Json<LoginResponse>> {
    let user = find_user(&state.db.pool, body.username.trim())
        .await?
        .ok_or(AppError::Unauthorized("Invalid credentials"))?;

    if !password::verify_password(&body.password, &user.password_hash)? {
        tracing::debug!(username = %user.username, "Login rejected");
        return Err(AppError::Unauthorized("Invalid credentials"));
    }

    let token = session::issue_token(
        &user.id,
        &user.username,
        &state.config.jwt_secret,
        state.config.jwt_expires_in,
    )?;

    Ok(Json(LoginResponse { token, user }))
}

async fn request_reset(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<ResetRequest>, AppError>,
) -> Result<Json<ResetRequestResponse>> {
    let username = body.username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("username is required".to_string()));
    }

    let generic = Json(ResetRequestResponse {
        message: RESET_REQUESTED_MESSAGE.to_string(),
        token: None,
    });

    let Some(user) = find_user(&state.db.pool, username).await? else {
        tracing::debug!("Reset requested for unknown user");
        return Ok(generic);
    };

    let now = Utc::now();
    let token = Uuid::new_v4().to_string();
    let expires_at = chrono::Duration::try_minutes(state.config.reset_token_expires_min)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| AppError::Internal("Reset token expiry out of range".to_string()))?;

    sqlx::query("DELETE FROM reset_tokens WHERE user_id = ? AND expires_at <= ?")
        .bind(&user.id)
        .bind(db::timestamp(now))
        .execute(&state.db.pool)
        .await?;

    sqlx::query(
        "INSERT INTO reset_tokens (id, user_id, token, expires_at, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&user.id)
    .bind(&token)
    .bind(db::timestamp(expires_at))
    .bind(db::timestamp(now))
    .execute(&state.db.pool)
    .await?;

    tracing::info!(user_id = %user.id, "Password reset token issued");

    let reset_link = format!(
        "{}/admin/reset?token={}",
        state.config.frontend_url.trim_end_matches('/'),
        token
    );
    let recipient = body
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(username);

    let delivered = match &state.mailer {
        Some(mailer) => match mailer
            .send_password_reset(recipient, &token, &reset_link)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Password reset email not delivered");
                false
            }
        },
        None => {
            tracing::warn!(user_id = %user.id, "Mail delivery is not configured");
            false
        }
    };

    if !delivered && state.config.expose_reset_token {
        tracing::warn!(user_id = %user.id, "Returning reset token in response (EXPOSE_RESET_TOKEN)");
        return Ok(Json(ResetRequestResponse {
            message: "Email not delivered - reset token returned for development".to_string(),
            token: Some(token),
        }));
    }

    Ok(generic)
}

async fn reset_password(
    State(state): State<AppState>,
    WithRejection(Json(body), _): WithRejection<Json<ResetPasswordRequest>, AppError>,
) -> Result<Json<MessageResponse>> {
    let token = body.token.trim();
    if token.is_empty() || body.new_password.is_empty() {
        return Err(AppError::Validation(
            "token and newPassword are required".to_string(),
        ));
    }
    password::validate_password(&body.new_password)?;

    let reset = sqlx::query_as::<_, ResetToken>(
        "SELECT id, user_id, token, expires_at, created_at FROM reset_tokens WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(|| AppError::BadRequest("Invalid or expired token".to_string()))?;

    if reset.is_expired(Utc::now()) {
        sqlx::query("DELETE FROM reset_tokens WHERE id = ?")
            .bind(&reset.id)
            .execute(&state.db.pool)
            .await?;
        return Err(AppError::BadRequest("Invalid or expired token".to_string()));
    }

    let password_hash =
        password::hash_password(&body.new_password, state.config.password_hash_cost)?;

    let mut tx = state.db.pool.begin().await?;

    // Claiming the token first makes a concurrent second use find nothing.
    let claimed = sqlx::query("DELETE FROM reset_tokens WHERE id = ?")
        .bind(&reset.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if claimed == 0 {
        return Err(AppError::BadRequest("Invalid or expired token".to_string()));
    }

    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(&reset.user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %reset.user_id, "Password reset");

    Ok(Json(MessageResponse::new("Password updated")))
}
