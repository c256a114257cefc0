use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;
use uuid::Uuid;

use super::{unique_ids, StoreError, StoreResult};
use crate::auth::repo::UserStore;
use crate::auth::repo_types::{NewUser, Token, User, UserChanges};
use crate::recipes::repo::RecipeStore;
use crate::recipes::repo_types::{
    Attribute, AttributeKind, NewRecipe, Recipe, RecipeChanges, RecipeFilter,
};

const USER_COLUMNS: &str =
    "id, email, password_hash, name, is_active, is_staff, is_superuser, created_at";

const RECIPE_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.title, r.time_minutes, r.price, r.link, r.image,
           ARRAY(SELECT rt.tag_id FROM recipe_tags rt
                  WHERE rt.recipe_id = r.id ORDER BY rt.tag_id) AS tags,
           ARRAY(SELECT ri.ingredient_id FROM recipe_ingredients ri
                  WHERE ri.recipe_id = r.id ORDER BY ri.ingredient_id) AS ingredients
      FROM recipes r
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unique_violation(err: sqlx::Error, field: &'static str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate { field },
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl UserStore for PgStore {
    #[instrument(skip(self, new), fields(email = %new.email))]
    async fn insert_user(&self, new: NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (email, password_hash, name, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(&new.name)
            .bind(new.is_staff)
            .bind(new.is_superuser)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "email"))
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self, changes))]
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let sql = format!(
            r#"
            UPDATE users
               SET email = COALESCE($2, email),
                   password_hash = COALESCE($3, password_hash),
                   name = COALESCE($4, name)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(changes.email)
            .bind(changes.password_hash)
            .bind(changes.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "email"))?
            .ok_or(StoreError::NotFound { entity: "user" })
    }

    async fn get_or_create_token(&self, user_id: Uuid, candidate_key: &str) -> StoreResult<Token> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (key, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(candidate_key)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let token = sqlx::query_as::<_, Token>(
            "SELECT key, user_id, created_at FROM auth_tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(token)
    }

    async fn find_user_by_token(&self, key: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.password_hash, u.name, u.is_active,
                   u.is_staff, u.is_superuser, u.created_at
              FROM auth_tokens t
              JOIN users u ON u.id = t.user_id
             WHERE t.key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

/// Ensures every id names an attribute of `owner`; returns the ids deduplicated.
async fn check_references(
    conn: &mut PgConnection,
    kind: AttributeKind,
    owner: Uuid,
    ids: &[i64],
) -> StoreResult<Vec<i64>> {
    let ids = unique_ids(ids);
    if ids.is_empty() {
        return Ok(ids);
    }

    let sql = format!(
        "SELECT id FROM {} WHERE user_id = $1 AND id = ANY($2)",
        kind.table()
    );
    let found: Vec<i64> = sqlx::query_scalar(&sql)
        .bind(owner)
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

    match ids.iter().find(|id| !found.contains(id)) {
        Some(&missing) => Err(StoreError::InvalidReference {
            field: kind.field(),
            id: missing,
        }),
        None => Ok(ids),
    }
}

async fn replace_links(
    conn: &mut PgConnection,
    kind: AttributeKind,
    recipe_id: i64,
    ids: &[i64],
) -> StoreResult<()> {
    let delete = format!("DELETE FROM {} WHERE recipe_id = $1", kind.link_table());
    sqlx::query(&delete)
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    if !ids.is_empty() {
        let insert = format!(
            "INSERT INTO {} (recipe_id, {}) SELECT $1, UNNEST($2::bigint[])",
            kind.link_table(),
            kind.link_column()
        );
        sqlx::query(&insert)
            .bind(recipe_id)
            .bind(ids)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn fetch_recipe(conn: &mut PgConnection, owner: Uuid, id: i64) -> StoreResult<Option<Recipe>> {
    let sql = format!("{RECIPE_SELECT} WHERE r.user_id = $1 AND r.id = $2");
    let recipe = sqlx::query_as::<_, Recipe>(&sql)
        .bind(owner)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(recipe)
}

#[async_trait]
impl RecipeStore for PgStore {
    #[instrument(skip(self))]
    async fn list_attributes(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        assigned_only: bool,
    ) -> StoreResult<Vec<Attribute>> {
        let sql = format!(
            r#"
            SELECT a.id, a.user_id, a.name
              FROM {table} a
             WHERE a.user_id = $1
               AND (NOT $2 OR EXISTS (
                     SELECT 1
                       FROM {link} l
                       JOIN recipes r ON r.id = l.recipe_id
                      WHERE l.{column} = a.id AND r.user_id = $1))
             ORDER BY a.name COLLATE "C" DESC, a.id ASC
            "#,
            table = kind.table(),
            link = kind.link_table(),
            column = kind.link_column(),
        );
        let rows = sqlx::query_as::<_, Attribute>(&sql)
            .bind(owner)
            .bind(assigned_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn insert_attribute(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        name: &str,
    ) -> StoreResult<Attribute> {
        let sql = format!(
            "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id, user_id, name",
            kind.table()
        );
        let row = sqlx::query_as::<_, Attribute>(&sql)
            .bind(owner)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_attributes(
        &self,
        kind: AttributeKind,
        owner: Uuid,
        ids: &[i64],
    ) -> StoreResult<Vec<Attribute>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT id, user_id, name FROM {} WHERE user_id = $1 AND id = ANY($2) ORDER BY id",
            kind.table()
        );
        let rows = sqlx::query_as::<_, Attribute>(&sql)
            .bind(owner)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn list_recipes(&self, owner: Uuid, filter: &RecipeFilter) -> StoreResult<Vec<Recipe>> {
        let sql = format!(
            r#"
            {RECIPE_SELECT}
             WHERE r.user_id = $1
               AND (cardinality($2::bigint[]) = 0 OR EXISTS (
                     SELECT 1 FROM recipe_tags ft
                      WHERE ft.recipe_id = r.id AND ft.tag_id = ANY($2)))
               AND (cardinality($3::bigint[]) = 0 OR EXISTS (
                     SELECT 1 FROM recipe_ingredients fi
                      WHERE fi.recipe_id = r.id AND fi.ingredient_id = ANY($3)))
             ORDER BY r.id DESC
            "#
        );
        let rows = sqlx::query_as::<_, Recipe>(&sql)
            .bind(owner)
            .bind(&filter.tags)
            .bind(&filter.ingredients)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn find_recipe(&self, owner: Uuid, id: i64) -> StoreResult<Option<Recipe>> {
        let mut conn = self.pool.acquire().await?;
        fetch_recipe(&mut conn, owner, id).await
    }

    #[instrument(skip(self, new))]
    async fn insert_recipe(&self, owner: Uuid, new: NewRecipe) -> StoreResult<Recipe> {
        let mut tx = self.pool.begin().await?;
        let tags = check_references(&mut tx, AttributeKind::Tag, owner, &new.tags).await?;
        let ingredients =
            check_references(&mut tx, AttributeKind::Ingredient, owner, &new.ingredients).await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO recipes (user_id, title, time_minutes, price, link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(owner)
        .bind(&new.title)
        .bind(new.time_minutes)
        .bind(new.price)
        .bind(&new.link)
        .fetch_one(&mut *tx)
        .await?;

        replace_links(&mut tx, AttributeKind::Tag, id, &tags).await?;
        replace_links(&mut tx, AttributeKind::Ingredient, id, &ingredients).await?;

        let recipe = fetch_recipe(&mut tx, owner, id)
            .await?
            .ok_or(StoreError::NotFound { entity: "recipe" })?;
        tx.commit().await?;
        Ok(recipe)
    }

    #[instrument(skip(self, changes))]
    async fn update_recipe(
        &self,
        owner: Uuid,
        id: i64,
        changes: RecipeChanges,
    ) -> StoreResult<Recipe> {
        let mut tx = self.pool.begin().await?;
        let updated: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE recipes
               SET title = COALESCE($3, title),
                   time_minutes = COALESCE($4, time_minutes),
                   price = COALESCE($5, price),
                   link = COALESCE($6, link)
             WHERE id = $1 AND user_id = $2
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(changes.title)
        .bind(changes.time_minutes)
        .bind(changes.price)
        .bind(changes.link)
        .fetch_optional(&mut *tx)
        .await?;
        if updated.is_none() {
            return Err(StoreError::NotFound { entity: "recipe" });
        }

        for (kind, ids) in [
            (AttributeKind::Tag, changes.tags),
            (AttributeKind::Ingredient, changes.ingredients),
        ] {
            if let Some(ids) = ids {
                let ids = check_references(&mut tx, kind, owner, &ids).await?;
                replace_links(&mut tx, kind, id, &ids).await?;
            }
        }

        let recipe = fetch_recipe(&mut tx, owner, id)
            .await?
            .ok_or(StoreError::NotFound { entity: "recipe" })?;
        tx.commit().await?;
        Ok(recipe)
    }

    async fn set_recipe_image(
        &self,
        owner: Uuid,
        id: i64,
        image: Option<&str>,
    ) -> StoreResult<Option<String>> {
        let previous: Option<Option<String>> = sqlx::query_scalar(
            r#"
            UPDATE recipes r
               SET image = $3
              FROM (SELECT id, image AS old_image
                      FROM recipes
                     WHERE id = $1 AND user_id = $2
                       FOR UPDATE) old
             WHERE r.id = old.id
            RETURNING old.old_image
            "#,
        )
        .bind(id)
        .bind(owner)
        .bind(image)
        .fetch_optional(&self.pool)
        .await?;
        previous.ok_or(StoreError::NotFound { entity: "recipe" })
    }

    #[instrument(skip(self))]
    async fn delete_recipe(&self, owner: Uuid, id: i64) -> StoreResult<Recipe> {
        let mut tx = self.pool.begin().await?;
        let recipe = fetch_recipe(&mut tx, owner, id)
            .await?
            .ok_or(StoreError::NotFound { entity: "recipe" })?;
        sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(recipe)
    }
}
