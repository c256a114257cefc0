use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginRequest, PublicUser, RegisterRequest, TokenResponse, UpdateMeRequest},
        extractors::AuthUser,
        services,
    },
    errors::ApiError,
    extract::ValidJson,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/create", post(register))
        .route("/user/token", post(create_token))
        .route(
            "/user/me",
            get(get_me).patch(update_me).fallback(me_method_not_allowed),
        )
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    let user = services::create_user(
        state.store.as_ref(),
        &payload.email,
        &payload.password,
        &payload.name,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, payload))]
pub async fn create_token(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = services::issue_token(state.store.as_ref(), &payload.email, &payload.password).await?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidJson(payload): ValidJson<UpdateMeRequest>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = services::update_profile(state.store.as_ref(), user.id, payload).await?;
    Ok(Json(user.into()))
}

/// Other verbs on `/user/me` authenticate first, so anonymous callers see 401.
async fn me_method_not_allowed(AuthUser(_): AuthUser) -> ApiError {
    ApiError::MethodNotAllowed
}
