use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use validator::Validate;

use crate::errors::{ApiError, NON_FIELD_ERRORS};

/// JSON body that is deserialized and validated; both failures are 400s.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            warn!(error = %rejection, "rejected request body");
            ApiError::field(NON_FIELD_ERRORS, rejection.body_text())
        })?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

/// Query string whose parse failures are reported as a JSON 400.
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                warn!(error = %rejection, "rejected query string");
                ApiError::field(NON_FIELD_ERRORS, rejection.body_text())
            })?;
        Ok(ValidQuery(value))
    }
}

/// Path parameters; a segment that does not parse matches no resource, so 404.
pub struct ValidPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                debug!(error = %rejection, "unmatched path parameter");
                ApiError::NotFound
            })?;
        Ok(ValidPath(value))
    }
}
