use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::warn;

use crate::auth::{repo_types::User, services::resolve_token};
use crate::errors::ApiError;
use crate::state::AppState;

/// The user behind the request's `Authorization: Token <key>` header.
pub struct AuthUser(pub User);

fn token_from_header(value: &str) -> Option<&str> {
    let (scheme, key) = value.trim().split_once(' ')?;
    let key = key.trim();
    let known = scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer");
    (known && !key.is_empty()).then_some(key)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::Unauthenticated(
                "Authentication credentials were not provided.",
            ))?;

        let key = token_from_header(header).ok_or_else(|| {
            warn!("malformed Authorization header");
            ApiError::Unauthenticated("Invalid token header.")
        })?;

        let user = resolve_token(state.store.as_ref(), key).await?;
        Ok(AuthUser(user))
    }
}
