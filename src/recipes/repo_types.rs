use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// The two per-user catalogs a recipe links into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Tag,
    Ingredient,
}

impl AttributeKind {
    pub fn table(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tags",
            AttributeKind::Ingredient => "ingredients",
        }
    }

    pub fn link_table(self) -> &'static str {
        match self {
            AttributeKind::Tag => "recipe_tags",
            AttributeKind::Ingredient => "recipe_ingredients",
        }
    }

    pub fn link_column(self) -> &'static str {
        match self {
            AttributeKind::Tag => "tag_id",
            AttributeKind::Ingredient => "ingredient_id",
        }
    }

    /// Field name used in payloads and validation errors.
    pub fn field(self) -> &'static str {
        self.table()
    }
}

/// A tag or an ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Attribute {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub name: String,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Recipe {
    pub id: i64,
    pub user_id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    /// Storage key of the attached image.
    pub image: Option<String>,
    pub tags: Vec<i64>,        // ascending
    pub ingredients: Vec<i64>, // ascending
}

impl Recipe {
    pub fn attribute_ids(&self, kind: AttributeKind) -> &[i64] {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Ingredient => &self.ingredients,
        }
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
}

/// Field-wise update; `Some` replaces, link sets are replaced whole.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}

/// Empty id lists do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
}
