use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::Store;
use crate::errors::{ApiError, FieldErrors};
use crate::recipes::dto::RecipeRequest;
use crate::recipes::repo::RecipeStore;
use crate::recipes::repo_types::{
    Attribute, AttributeKind, NewRecipe, Recipe, RecipeChanges, RecipeFilter,
};
use crate::storage::StorageClient;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";

/// A recipe with its links resolved to full rows.
#[derive(Debug, Clone)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    pub tags: Vec<Attribute>,
    pub ingredients: Vec<Attribute>,
}

/// How an update treats fields missing from the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// PUT: required fields must be present, the rest reset to empty.
    Replace,
    /// PATCH: missing fields stay as they are.
    Partial,
}

pub async fn list_attributes(
    store: &dyn Store,
    kind: AttributeKind,
    owner: Uuid,
    assigned_only: bool,
) -> Result<Vec<Attribute>, ApiError> {
    Ok(store.list_attributes(kind, owner, assigned_only).await?)
}

pub async fn create_attribute(
    store: &dyn Store,
    kind: AttributeKind,
    owner: Uuid,
    name: &str,
) -> Result<Attribute, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::field("name", BLANK));
    }
    let row = store.insert_attribute(kind, owner, name).await?;
    info!(kind = ?kind, id = row.id, name = %row, %owner, "attribute created");
    Ok(row)
}

/// Rounds to cents and enforces `NUMERIC(5, 2)`.
fn clean_price(price: Decimal, errors: &mut FieldErrors) -> Decimal {
    if price.is_sign_negative() && !price.is_zero() {
        errors.add("price", "Ensure this value is greater than or equal to 0.");
    }
    if price.normalize().scale() > 2 {
        errors.add("price", "Ensure that there are no more than 2 decimal places.");
    }
    if price.trunc().abs() >= Decimal::from(1000) {
        errors.add("price", "Ensure that there are no more than 5 digits in total.");
    }
    let mut cents = price.round_dp(2);
    cents.rescale(2);
    cents
}

fn clean_title(title: Option<&str>, required: bool, errors: &mut FieldErrors) -> Option<String> {
    match title.map(str::trim) {
        Some("") => {
            errors.add("title", BLANK);
            None
        }
        Some(t) => Some(t.to_string()),
        None => {
            if required {
                errors.add("title", REQUIRED);
            }
            None
        }
    }
}

/// Validates a body against `mode`, returning the changes to apply.
fn changes_from_request(req: RecipeRequest, mode: UpdateMode) -> Result<RecipeChanges, ApiError> {
    let required = mode == UpdateMode::Replace;
    let mut errors = FieldErrors::default();

    let title = clean_title(req.title.as_deref(), required, &mut errors);
    if required && req.time_minutes.is_none() {
        errors.add("time_minutes", REQUIRED);
    }
    if required && req.price.is_none() {
        errors.add("price", REQUIRED);
    }
    let price = req.price.map(|p| clean_price(p, &mut errors));
    errors.into_result()?;

    let link = req.link.map(|l| l.trim().to_string());
    Ok(match mode {
        UpdateMode::Partial => RecipeChanges {
            title,
            time_minutes: req.time_minutes,
            price,
            link,
            tags: req.tags,
            ingredients: req.ingredients,
        },
        UpdateMode::Replace => RecipeChanges {
            title,
            time_minutes: req.time_minutes,
            price,
            link: Some(link.unwrap_or_default()),
            tags: Some(req.tags.unwrap_or_default()),
            ingredients: Some(req.ingredients.unwrap_or_default()),
        },
    })
}

pub async fn list_recipes(
    store: &dyn Store,
    owner: Uuid,
    filter: &RecipeFilter,
) -> Result<Vec<Recipe>, ApiError> {
    Ok(store.list_recipes(owner, filter).await?)
}

pub async fn create_recipe(
    store: &dyn Store,
    owner: Uuid,
    req: RecipeRequest,
) -> Result<Recipe, ApiError> {
    let changes = changes_from_request(req, UpdateMode::Replace)?;
    let new = NewRecipe {
        title: changes.title.unwrap_or_default(),
        time_minutes: changes.time_minutes.unwrap_or_default(),
        price: changes.price.unwrap_or_default(),
        link: changes.link.unwrap_or_default(),
        tags: changes.tags.unwrap_or_default(),
        ingredients: changes.ingredients.unwrap_or_default(),
    };
    let recipe = store.insert_recipe(owner, new).await?;
    info!(recipe_id = recipe.id, title = %recipe, %owner, "recipe created");
    Ok(recipe)
}

pub async fn get_recipe(store: &dyn Store, owner: Uuid, id: i64) -> Result<RecipeDetail, ApiError> {
    let recipe = store.find_recipe(owner, id).await?.ok_or(ApiError::NotFound)?;
    let tags = store
        .find_attributes(AttributeKind::Tag, owner, &recipe.tags)
        .await?;
    let ingredients = store
        .find_attributes(AttributeKind::Ingredient, owner, &recipe.ingredients)
        .await?;
    Ok(RecipeDetail {
        recipe,
        tags,
        ingredients,
    })
}

pub async fn update_recipe(
    store: &dyn Store,
    owner: Uuid,
    id: i64,
    req: RecipeRequest,
    mode: UpdateMode,
) -> Result<Recipe, ApiError> {
    let changes = changes_from_request(req, mode)?;
    let recipe = store.update_recipe(owner, id, changes).await?;
    info!(recipe_id = id, %owner, ?mode, "recipe updated");
    Ok(recipe)
}

pub async fn delete_recipe(
    store: &dyn Store,
    storage: &dyn StorageClient,
    owner: Uuid,
    id: i64,
) -> Result<(), ApiError> {
    let recipe = store.delete_recipe(owner, id).await?;
    if let Some(key) = recipe.image.as_deref() {
        if let Err(e) = storage.delete_object(key).await {
            warn!(error = ?e, key, "orphaned recipe image");
        }
    }
    info!(recipe_id = id, %owner, "recipe deleted");
    Ok(())
}
