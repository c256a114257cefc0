use async_trait::async_trait;
use uuid::Uuid;

use crate::db::StoreResult;
use crate::recipes::repo_types::{
    Attribute, AttributeKind, NewRecipe, Recipe, RecipeChanges, RecipeFilter,
};

/// Every call is scoped to `owner`; rows of other users are invisible.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Ordered by name descending, then id ascending.
    async fn list_attributes(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        assigned_only: bool,
    ) -> StoreResult<Vec<Attribute>>;

    async fn insert_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        name: &str,
    ) -> StoreResult<Attribute>;

    /// Ordered by id ascending; unknown ids are skipped.
    async fn find_attributes(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        ids: &[i64],
    ) -> StoreResult<Vec<Attribute>>;

    /// Ordered by id descending.
    async fn list_recipes(&self, owner: Uuid, filter: &RecipeFilter) -> StoreResult<Vec<Recipe>>;

    async fn find_recipe(&self, owner: Uuid, id: i64) -> StoreResult<Option<Recipe>>;

    /// Recipe row and link rows are written together or not at all.
    async fn insert_recipe(&self, owner: Uuid, new: NewRecipe) -> StoreResult<Recipe>;

    async fn update_recipe(&self, owner: Uuid, id: i64, changes: RecipeChanges)
        -> StoreResult<Recipe>;

    /// Sets the image key, returning the previous one.
    async fn set_recipe_image(
        &self,
        owner: Uuid,
        id: i64,
        image: Option<&str>,
    ) -> StoreResult<Option<String>>;

    /// Returns the removed recipe.
    async fn delete_recipe(&self, owner: Uuid, id: i64) -> StoreResult<Recipe>;
}
