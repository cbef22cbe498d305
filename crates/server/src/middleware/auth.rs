use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{error::AppError, services::session, AppState};

/// The caller behind a valid `Authorization: Bearer <token>` header.
/// Taking this as a handler argument makes the route require a session.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized("Missing bearer token"))?;

        let claims = session::verify_token(bearer.token(), &state.config.jwt_secret)?;

        Ok(AuthUser {
            id: claims.sub,
            username: claims.username,
        })
    }
}
