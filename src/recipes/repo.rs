use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ingredients::repo::Ingredient;
use crate::tags::repo::Tag;

/// Recipe record; `image_key` points into object storage.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub description: Option<String>,
    pub link: Option<String>,
    pub image_key: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Writable recipe columns, shared by create and both update flavors.
#[derive(Debug, Clone)]
pub struct RecipeChanges {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub description: Option<String>,
    pub link: Option<String>,
}

/// List the user's recipes, newest first, optionally narrowed to recipes
/// holding at least one of the given tag / ingredient IDs.
pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    tag_ids: Option<Vec<Uuid>>,
    ingredient_ids: Option<Vec<Uuid>>,
) -> anyhow::Result<Vec<Recipe>> {
    let rows = sqlx::query_as::<_, Recipe>(
        r#"
        SELECT id, user_id, title, time_minutes, price, description, link, image_key, created_at
        FROM recipes r
        WHERE r.user_id = $1
          AND ($2::uuid[] IS NULL OR EXISTS (
                SELECT 1 FROM recipe_tags rt
                WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2)))
          AND ($3::uuid[] IS NULL OR EXISTS (
                SELECT 1 FROM recipe_ingredients ri
                WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3)))
        ORDER BY r.created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(tag_ids)
    .bind(ingredient_ids)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Fetch one recipe scoped to its owner; `None` covers both missing and
/// foreign rows.
pub async fn get_scoped(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Recipe>> {
    let recipe = sqlx::query_as::<_, Recipe>(
        r#"
        SELECT id, user_id, title, time_minutes, price, description, link, image_key, created_at
        FROM recipes
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(recipe)
}

pub async fn create_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    changes: &RecipeChanges,
) -> anyhow::Result<Recipe> {
    let recipe = sqlx::query_as::<_, Recipe>(
        r#"
        INSERT INTO recipes (user_id, title, time_minutes, price, description, link)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, user_id, title, time_minutes, price, description, link, image_key, created_at
        "#,
    )
    .bind(user_id)
    .bind(&changes.title)
    .bind(changes.time_minutes)
    .bind(changes.price)
    .bind(&changes.description)
    .bind(&changes.link)
    .fetch_one(&mut **tx)
    .await?;
    Ok(recipe)
}

pub async fn update_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    id: Uuid,
    changes: &RecipeChanges,
) -> anyhow::Result<Option<Recipe>> {
    let recipe = sqlx::query_as::<_, Recipe>(
        r#"
        UPDATE recipes
        SET title = $3, time_minutes = $4, price = $5, description = $6, link = $7
        WHERE id = $1 AND user_id = $2
        RETURNING id, user_id, title, time_minutes, price, description, link, image_key, created_at
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(&changes.title)
    .bind(changes.time_minutes)
    .bind(changes.price)
    .bind(&changes.description)
    .bind(&changes.link)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(recipe)
}

/// Delete a recipe; join rows cascade. `false` when nothing matched.
pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn set_image_key(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    image_key: &str,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE recipes SET image_key = $3 WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .bind(image_key)
        .execute(db)
        .await?;
    Ok(())
}

/// Replace a recipe's tag set with the given names, resolving each to the
/// user's existing tag or creating it. An empty slice clears the relation.
pub async fn set_tags_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    recipe_id: Uuid,
    names: &[String],
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;

    for name in names {
        let tag = Tag::get_or_create_tx(tx, user_id, name).await?;
        sqlx::query(
            "INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(recipe_id)
        .bind(tag.id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Replace a recipe's ingredient set; same reconciliation as tags.
pub async fn set_ingredients_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    recipe_id: Uuid,
    names: &[String],
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await?;

    for name in names {
        let ingredient = Ingredient::get_or_create_tx(tx, user_id, name).await?;
        sqlx::query(
            "INSERT INTO recipe_ingredients (recipe_id, ingredient_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(recipe_id)
        .bind(ingredient.id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Batch-load the tags of the given recipes, name descending.
pub async fn tags_for_recipes(
    db: &PgPool,
    recipe_ids: &[Uuid],
) -> anyhow::Result<HashMap<Uuid, Vec<Tag>>> {
    if recipe_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, (Uuid, Uuid, Uuid, String)>(
        r#"
        SELECT rt.recipe_id, t.id, t.user_id, t.name
        FROM recipe_tags rt
        JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.name DESC
        "#,
    )
    .bind(recipe_ids.to_vec())
    .fetch_all(db)
    .await?;

    let mut map: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    for (recipe_id, id, user_id, name) in rows {
        map.entry(recipe_id).or_default().push(Tag { id, user_id, name });
    }
    Ok(map)
}

/// Batch-load the ingredients of the given recipes, name descending.
pub async fn ingredients_for_recipes(
    db: &PgPool,
    recipe_ids: &[Uuid],
) -> anyhow::Result<HashMap<Uuid, Vec<Ingredient>>> {
    if recipe_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, (Uuid, Uuid, Uuid, String)>(
        r#"
        SELECT ri.recipe_id, i.id, i.user_id, i.name
        FROM recipe_ingredients ri
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY i.name DESC
        "#,
    )
    .bind(recipe_ids.to_vec())
    .fetch_all(db)
    .await?;

    let mut map: HashMap<Uuid, Vec<Ingredient>> = HashMap::new();
    for (recipe_id, id, user_id, name) in rows {
        map.entry(recipe_id)
            .or_default()
            .push(Ingredient { id, user_id, name });
    }
    Ok(map)
}
