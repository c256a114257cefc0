//! In-memory store for tests and database-less runs.
//!
//! All state sits behind one lock, so every trait call is atomic: a recipe
//! write either lands with all of its links or not at all.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::RwLock;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{unique_ids, StoreError, StoreResult};
use crate::auth::repo::UserStore;
use crate::auth::repo_types::{NewUser, Token, User, UserChanges};
use crate::recipes::repo::RecipeStore;
use crate::recipes::repo_types::{
    Attribute, AttributeKind, NewRecipe, Recipe, RecipeChanges, RecipeFilter,
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<Uuid, User>,
    /// token key -> user
    tokens: HashMap<String, Token>,
    tags: BTreeMap<i64, Attribute>,
    ingredients: BTreeMap<i64, Attribute>,
    recipes: BTreeMap<i64, Recipe>,
    next_tag_id: i64,
    next_ingredient_id: i64,
    next_recipe_id: i64,
}

impl State {
    fn attributes(&self, kind: AttributeKind) -> &BTreeMap<i64, Attribute> {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Ingredient => &self.ingredients,
        }
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| Some(u.id) != except && u.email.eq_ignore_ascii_case(email))
    }

    fn check_references(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        ids: &[i64],
    ) -> StoreResult<Vec<i64>> {
        let ids = unique_ids(ids);
        let table = self.attributes(kind);
        match ids
            .iter()
            .find(|id| table.get(*id).map_or(true, |a| a.user_id != owner))
        {
            Some(&missing) => Err(StoreError::InvalidReference {
                field: kind.field(),
                id: missing,
            }),
            None => Ok(ids),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, new: NewUser) -> StoreResult<User> {
        let mut state = self.state.write();
        if state.email_taken(&new.email, None) {
            return Err(StoreError::Duplicate { field: "email" });
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            password_hash: new.password_hash,
            name: new.name,
            is_active: true,
            is_staff: new.is_staff,
            is_superuser: new.is_superuser,
            created_at: OffsetDateTime::now_utc(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.state.read();
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state.read().users.get(&id).cloned())
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let mut state = self.state.write();
        if let Some(email) = &changes.email {
            if state.email_taken(email, Some(id)) {
                return Err(StoreError::Duplicate { field: "email" });
            }
        }
        let user = state
            .users
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "user" })?;
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        if let Some(name) = changes.name {
            user.name = name;
        }
        Ok(user.clone())
    }

    async fn get_or_create_token(&self, user_id: Uuid, candidate_key: &str) -> StoreResult<Token> {
        let mut state = self.state.write();
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::NotFound { entity: "user" });
        }
        if let Some(existing) = state.tokens.values().find(|t| t.user_id == user_id) {
            return Ok(existing.clone());
        }
        let token = Token {
            key: candidate_key.to_string(),
            user_id,
            created_at: OffsetDateTime::now_utc(),
        };
        state.tokens.insert(token.key.clone(), token.clone());
        Ok(token)
    }

    async fn find_user_by_token(&self, key: &str) -> StoreResult<Option<User>> {
        let state = self.state.read();
        Ok(state
            .tokens
            .get(key)
            .and_then(|t| state.users.get(&t.user_id))
            .cloned())
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn list_attributes(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        assigned_only: bool,
    ) -> StoreResult<Vec<Attribute>> {
        let state = self.state.read();
        let mut rows: Vec<Attribute> = state
            .attributes(kind)
            .values()
            .filter(|a| a.user_id == owner)
            .filter(|a| {
                !assigned_only
                    || state
                        .recipes
                        .values()
                        .any(|r| r.user_id == owner && r.attribute_ids(kind).contains(&a.id))
            })
            .cloned()
            .collect();
        // byte order, same as COLLATE "C" in the Postgres store; values()
        // is id-ascending and the sort is stable
        rows.sort_by(|a, b| b.name.as_bytes().cmp(a.name.as_bytes()));
        Ok(rows)
    }

    async fn insert_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        name: &str,
    ) -> StoreResult<Attribute> {
        let mut state = self.state.write();
        let state = &mut *state;
        let (next_id, table) = match kind {
            AttributeKind::Tag => (&mut state.next_tag_id, &mut state.tags),
            AttributeKind::Ingredient => (&mut state.next_ingredient_id, &mut state.ingredients),
        };
        *next_id += 1;
        let row = Attribute {
            id: *next_id,
            user_id: owner,
            name: name.to_string(),
        };
        table.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_attributes(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        ids: &[i64],
    ) -> StoreResult<Vec<Attribute>> {
        let state = self.state.read();
        let table = state.attributes(kind);
        Ok(unique_ids(ids)
            .iter()
            .filter_map(|id| table.get(id))
            .filter(|a| a.user_id == owner)
            .cloned()
            .collect())
    }

    async fn list_recipes(&self, owner: Uuid, filter: &RecipeFilter) -> StoreResult<Vec<Recipe>> {
        let matches = |wanted: &[i64], have: &[i64]| {
            wanted.is_empty() || wanted.iter().any(|id| have.contains(id))
        };
        let state = self.state.read();
        Ok(state
            .recipes
            .values()
            .rev()
            .filter(|r| r.user_id == owner)
            .filter(|r| matches(&filter.tags, &r.tags))
            .filter(|r| matches(&filter.ingredients, &r.ingredients))
            .cloned()
            .collect())
    }

    async fn find_recipe(&self, owner: Uuid, id: i64) -> StoreResult<Option<Recipe>> {
        let state = self.state.read();
        Ok(state
            .recipes
            .get(&id)
            .filter(|r| r.user_id == owner)
            .cloned())
    }

    async fn insert_recipe(&self, owner: Uuid, new: NewRecipe) -> StoreResult<Recipe> {
        let mut state = self.state.write();
        let tags = state.check_references(AttributeKind::Tag, owner, &new.tags)?;
        let ingredients =
            state.check_references(AttributeKind::Ingredient, owner, &new.ingredients)?;

        state.next_recipe_id += 1;
        let recipe = Recipe {
            id: state.next_recipe_id,
            user_id: owner,
            title: new.title,
            time_minutes: new.time_minutes,
            price: new.price,
            link: new.link,
            image: None,
            tags,
            ingredients,
        };
        state.recipes.insert(recipe.id, recipe.clone());
        Ok(recipe)
    }

    async fn update_recipe(
        &self,
        owner: Uuid,
        id: i64,
        changes: RecipeChanges,
    ) -> StoreResult<Recipe> {
        let mut state = self.state.write();
        if !state.recipes.get(&id).is_some_and(|r| r.user_id == owner) {
            return Err(StoreError::NotFound { entity: "recipe" });
        }
        // resolve links before touching the row so a bad id changes nothing
        let tags = changes
            .tags
            .map(|ids| state.check_references(AttributeKind::Tag, owner, &ids))
            .transpose()?;
        let ingredients = changes
            .ingredients
            .map(|ids| state.check_references(AttributeKind::Ingredient, owner, &ids))
            .transpose()?;

        let recipe = state
            .recipes
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "recipe" })?;
        if let Some(title) = changes.title {
            recipe.title = title;
        }
        if let Some(minutes) = changes.time_minutes {
            recipe.time_minutes = minutes;
        }
        if let Some(price) = changes.price {
            recipe.price = price;
        }
        if let Some(link) = changes.link {
            recipe.link = link;
        }
        if let Some(tags) = tags {
            recipe.tags = tags;
        }
        if let Some(ingredients) = ingredients {
            recipe.ingredients = ingredients;
        }
        Ok(recipe.clone())
    }

    async fn set_recipe_image(
        &self,
        owner: Uuid,
        id: i64,
        image: Option<&str>,
    ) -> StoreResult<Option<String>> {
        let mut state = self.state.write();
        let recipe = state
            .recipes
            .get_mut(&id)
            .filter(|r| r.user_id == owner)
            .ok_or(StoreError::NotFound { entity: "recipe" })?;
        Ok(std::mem::replace(&mut recipe.image, image.map(str::to_string)))
    }

    async fn delete_recipe(&self, owner: Uuid, id: i64) -> StoreResult<Recipe> {
        let mut state = self.state.write();
        if !state.recipes.get(&id).is_some_and(|r| r.user_id == owner) {
            return Err(StoreError::NotFound { entity: "recipe" });
        }
        state
            .recipes
            .remove(&id)
            .ok_or(StoreError::NotFound { entity: "recipe" })
    }
}
