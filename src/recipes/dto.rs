use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::ApiError;
use crate::recipes::repo_types::{Attribute, Recipe, RecipeFilter};

/// Body for creating a tag or an ingredient.
#[derive(Debug, Deserialize, Validate)]
pub struct AttributeRequest {
    #[serde(default)]
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub name: String,
}

/// Recipe body shared by POST, PUT and PATCH; which fields are required
/// depends on the verb.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RecipeRequest {
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub title: Option<String>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    #[validate(length(max = 255, message = "Ensure this field has no more than 255 characters."))]
    pub link: Option<String>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AttributeQuery {
    pub assigned_only: Option<String>,
}

impl AttributeQuery {
    pub fn assigned_only(&self) -> Result<bool, ApiError> {
        match self.assigned_only.as_deref().map(str::trim) {
            None | Some("") | Some("0") => Ok(false),
            Some("1") => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
            Some(_) => Err(ApiError::field("assigned_only", "Expected 0 or 1.")),
        }
    }
}


/// Parses a comma separated id list such as `1,2,3`.
pub fn parse_id_list(field: &str, raw: Option<&str>) -> Result<Vec<i64>, ApiError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ApiError::field(field, format!("\"{s}\" is not a valid id.")))
        })
        .collect()
}

/// Builds the recipe list filter from raw query pairs. Repeated keys
/// merge, so `?tags=1&tags=2` equals `?tags=1,2`.
pub fn recipe_filter(params: &[(String, String)]) -> Result<RecipeFilter, ApiError> {
    let mut filter = RecipeFilter::default();
    for (key, value) in params {
        let ids = match key.as_str() {
            "tags" => &mut filter.tags,
            "ingredients" => &mut filter.ingredients,
            _ => continue,
        };
        ids.extend(parse_id_list(key, Some(value))?);
    }
    Ok(filter)
}

#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
    pub image: Option<String>,
}

impl RecipeResponse {
    pub fn new(recipe: Recipe, image: Option<String>) -> Self {
        Self {
            id: recipe.id,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
            tags: recipe.tags,
            ingredients: recipe.ingredients,
            image,
        }
    }
}

/// Single recipe with its tags and ingredients embedded.
#[derive(Debug, Serialize)]
pub struct RecipeDetailResponse {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<Attribute>,
    pub ingredients: Vec<Attribute>,
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecipeImageResponse {
    pub id: i64,
    pub image: Option<String>,
}
