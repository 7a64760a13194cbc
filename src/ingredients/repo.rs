use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Ingredient record, unique per (user, name).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ingredient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
}

impl Ingredient {
    pub async fn list_by_user(
        db: &PgPool,
        user_id: Uuid,
        assigned_only: bool,
    ) -> anyhow::Result<Vec<Ingredient>> {
        let rows = sqlx::query_as::<_, Ingredient>(
            r#"
            SELECT i.id, i.user_id, i.name
            FROM ingredients i
            WHERE i.user_id = $1
              AND ($2 = FALSE OR EXISTS (
                    SELECT 1 FROM recipe_ingredients ri WHERE ri.ingredient_id = i.id))
            ORDER BY i.name DESC
            "#,
        )
        .bind(user_id)
        .bind(assigned_only)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Resolve a name to the user's existing ingredient or create it, inside
    /// the caller's transaction.
    pub async fn get_or_create_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        name: &str,
    ) -> anyhow::Result<Ingredient> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            r#"
            INSERT INTO ingredients (user_id, name)
            VALUES ($1, $2)
            ON CONFLICT (user_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, user_id, name
            "#,
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;
        Ok(ingredient)
    }

    /// Rename an ingredient; `None` when it does not exist for this user.
    pub async fn rename(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> anyhow::Result<Option<Ingredient>> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            r#"
            UPDATE ingredients SET name = $3
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, name
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(name)
        .fetch_optional(db)
        .await?;
        Ok(ingredient)
    }

    /// Delete an ingredient; join rows cascade. `false` when nothing matched.
    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM ingredients WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
