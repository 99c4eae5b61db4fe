use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{claims::Identity, jwt::TokenKeys};
use crate::error::ApiError;

/// Resolves the bearer token into an [`Identity`]. Put it first in a
/// handler's arguments so that authentication runs before any store access.
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    TokenKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        // Expect "Bearer <token>"
        let token = auth_header
            .strip_prefix("Bearer ")
            .or_else(|| auth_header.strip_prefix("bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let keys = TokenKeys::from_ref(state);
        match keys.resolve(token.trim()) {
            Ok(identity) => Ok(CurrentUser(identity)),
            Err(e) => {
                warn!(error = %e, "token rejected");
                Err(ApiError::Unauthorized)
            }
        }
    }
}
