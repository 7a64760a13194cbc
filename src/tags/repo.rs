use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Tag record, unique per (user, name).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
}

impl Tag {
    pub async fn list_by_user(
        db: &PgPool,
        user_id: Uuid,
        assigned_only: bool,
    ) -> anyhow::Result<Vec<Tag>> {
        let rows = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.user_id, t.name
            FROM tags t
            WHERE t.user_id = $1
              AND ($2 = FALSE OR EXISTS (
                    SELECT 1 FROM recipe_tags rt WHERE rt.tag_id = t.id))
            ORDER BY t.name DESC
            "#,
        )
        .bind(user_id)
        .bind(assigned_only)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Resolve a name to the user's existing tag or create it, inside the
    /// caller's transaction. The upsert keeps concurrent writers from racing
    /// the unique (user_id, name) constraint.
    pub async fn get_or_create_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        name: &str,
    ) -> anyhow::Result<Tag> {
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (user_id, name)
            VALUES ($1, $2)
            ON CONFLICT (user_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, user_id, name
            "#,
        )
        .bind(user_id)
        .bind(name)
        .fetch_one(&mut **tx)
        .await?;
        Ok(tag)
    }

    /// Rename a tag; `None` when the tag does not exist for this user.
    pub async fn rename(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        name: &str,
    ) -> anyhow::Result<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>(
            r#"
            UPDATE tags SET name = $3
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, name
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(name)
        .fetch_optional(db)
        .await?;
        Ok(tag)
    }

    /// Delete a tag; join rows cascade. `false` when nothing matched.
    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
