use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    errors::ApiError,
    extract::{ValidJson, ValidPath, ValidQuery},
    images::services::{upload_recipe_image, ImageUpload},
    recipes::{
        dto::{
            recipe_filter, AttributeQuery, AttributeRequest, RecipeDetailResponse,
            RecipeImageResponse, RecipeRequest, RecipeResponse,
        },
        repo_types::{Attribute, AttributeKind, Recipe},
        services::{self, UpdateMode},
    },
    state::AppState,
    storage::StorageClient,
};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn attribute_routes() -> Router<AppState> {
    Router::new()
        .route("/recipe/tags", get(list_tags).post(create_tag))
        .route(
            "/recipe/ingredients",
            get(list_ingredients).post(create_ingredient),
        )
}

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipe/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipe/recipes/:id",
            get(get_recipe)
                .patch(patch_recipe)
                .put(put_recipe)
                .delete(delete_recipe),
        )
        .route(
            "/recipe/recipes/:id/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}

// --- tags & ingredients ---

async fn list_attributes(
    state: &AppState,
    kind: AttributeKind,
    owner: Uuid,
    query: &AttributeQuery,
) -> Result<Json<Vec<Attribute>>, ApiError> {
    let rows =
        services::list_attributes(state.store.as_ref(), kind, owner, query.assigned_only()?).await?;
    Ok(Json(rows))
}

async fn create_attribute(
    state: &AppState,
    kind: AttributeKind,
    owner: Uuid,
    payload: AttributeRequest,
) -> Result<(StatusCode, Json<Attribute>), ApiError> {
    let row = services::create_attribute(state.store.as_ref(), kind, owner, &payload.name).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_tags(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidQuery(query): ValidQuery<AttributeQuery>,
) -> Result<Json<Vec<Attribute>>, ApiError> {
    list_attributes(&state, AttributeKind::Tag, user.id, &query).await
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_tag(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidJson(payload): ValidJson<AttributeRequest>,
) -> Result<(StatusCode, Json<Attribute>), ApiError> {
    create_attribute(&state, AttributeKind::Tag, user.id, payload).await
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidQuery(query): ValidQuery<AttributeQuery>,
) -> Result<Json<Vec<Attribute>>, ApiError> {
    list_attributes(&state, AttributeKind::Ingredient, user.id, &query).await
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_ingredient(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidJson(payload): ValidJson<AttributeRequest>,
) -> Result<(StatusCode, Json<Attribute>), ApiError> {
    create_attribute(&state, AttributeKind::Ingredient, user.id, payload).await
}

// --- recipes ---

async fn image_url(
    storage: &dyn StorageClient,
    key: Option<&str>,
) -> Result<Option<String>, ApiError> {
    match key {
        Some(key) => Ok(Some(storage.object_url(key).await?)),
        None => Ok(None),
    }
}

async fn recipe_response(state: &AppState, recipe: Recipe) -> Result<RecipeResponse, ApiError> {
    let image = image_url(state.storage.as_ref(), recipe.image.as_deref()).await?;
    Ok(RecipeResponse::new(recipe, image))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidQuery(params): ValidQuery<Vec<(String, String)>>,
) -> Result<Json<Vec<RecipeResponse>>, ApiError> {
    let filter = recipe_filter(&params)?;
    let recipes = services::list_recipes(state.store.as_ref(), user.id, &filter).await?;

    let mut out = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        out.push(recipe_response(&state, recipe).await?);
    }
    Ok(Json(out))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidJson(payload): ValidJson<RecipeRequest>,
) -> Result<(StatusCode, Json<RecipeResponse>), ApiError> {
    let recipe = services::create_recipe(state.store.as_ref(), user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(recipe_response(&state, recipe).await?)))
}

#[instrument(skip_all, fields(user_id = %user.id, recipe_id = id))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<Json<RecipeDetailResponse>, ApiError> {
    let detail = services::get_recipe(state.store.as_ref(), user.id, id).await?;
    let image = image_url(state.storage.as_ref(), detail.recipe.image.as_deref()).await?;
    let recipe = detail.recipe;
    Ok(Json(RecipeDetailResponse {
        id: recipe.id,
        title: recipe.title,
        time_minutes: recipe.time_minutes,
        price: recipe.price,
        link: recipe.link,
        tags: detail.tags,
        ingredients: detail.ingredients,
        image,
    }))
}

#[instrument(skip_all, fields(user_id = %user.id, recipe_id = id))]
pub async fn patch_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(payload): ValidJson<RecipeRequest>,
) -> Result<Json<RecipeResponse>, ApiError> {
    let recipe =
        services::update_recipe(state.store.as_ref(), user.id, id, payload, UpdateMode::Partial)
            .await?;
    Ok(Json(recipe_response(&state, recipe).await?))
}

#[instrument(skip_all, fields(user_id = %user.id, recipe_id = id))]
pub async fn put_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(payload): ValidJson<RecipeRequest>,
) -> Result<Json<RecipeResponse>, ApiError> {
    let recipe =
        services::update_recipe(state.store.as_ref(), user.id, id, payload, UpdateMode::Replace)
            .await?;
    Ok(Json(recipe_response(&state, recipe).await?))
}

#[instrument(skip_all, fields(user_id = %user.id, recipe_id = id))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<StatusCode, ApiError> {
    services::delete_recipe(state.store.as_ref(), state.storage.as_ref(), user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /recipe/recipes/:id/upload-image (multipart, field `image`)
#[instrument(skip_all, fields(user_id = %user.id, recipe_id = id))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidPath(id): ValidPath<i64>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RecipeImageResponse>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        warn!(error = %e, "upload is not multipart");
        ApiError::field("image", e.body_text())
    })?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::field("image", e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let body = field
            .bytes()
            .await
            .map_err(|e| ApiError::field("image", e.body_text()))?;
        upload = Some(ImageUpload { file_name, body });
    }
    let upload = upload.ok_or_else(|| ApiError::field("image", "No file was submitted."))?;

    let recipe = upload_recipe_image(
        state.store.as_ref(),
        state.storage.as_ref(),
        user.id,
        id,
        upload,
    )
    .await?;
    let image = image_url(state.storage.as_ref(), recipe.image.as_deref()).await?;
    Ok(Json(RecipeImageResponse {
        id: recipe.id,
        image,
    }))
}
