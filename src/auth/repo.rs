use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::auth::password::hash_password;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub created_at: OffsetDateTime,
}

/// Lower-case only the domain part of an email address; the local part is
/// case-sensitive per RFC 5321 and is preserved as given.
pub fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_staff, is_superuser, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, is_staff, is_superuser, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Create a regular user. The email must already be normalized; an empty
    /// email is rejected here regardless of what the caller validated.
    pub async fn create(db: &PgPool, email: &str, password_hash: &str) -> anyhow::Result<User> {
        Self::insert(db, email, password_hash, false, false).await
    }

    /// Create a user with the staff and superuser flags set.
    pub async fn create_superuser(
        db: &PgPool,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        Self::insert(db, email, password_hash, true, true).await
    }

    async fn insert(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        is_staff: bool,
        is_superuser: bool,
    ) -> anyhow::Result<User> {
        anyhow::ensure!(!email.is_empty(), "email is required");
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, is_staff, is_superuser, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(is_staff)
        .bind(is_superuser)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_email(db: &PgPool, id: Uuid, email: &str) -> anyhow::Result<User> {
        anyhow::ensure!(!email.is_empty(), "email is required");
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET email = $2
            WHERE id = $1
            RETURNING id, email, password_hash, is_staff, is_superuser, created_at
            "#,
        )
        .bind(id)
        .bind(email)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn update_password(db: &PgPool, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(db)
            .await?;
        Ok(())
    }
}

/// Startup bootstrap: make sure the configured admin account exists with the
/// staff and superuser flags. A no-op when the email is already taken.
pub async fn ensure_superuser(db: &PgPool, email: &str, password: &str) -> anyhow::Result<()> {
    let email = normalize_email(email);
    if User::find_by_email(db, &email).await?.is_some() {
        return Ok(());
    }
    let hash = hash_password(password)?;
    let user = User::create_superuser(db, &email, &hash).await?;
    info!(user_id = %user.id, email = %user.email, "superuser created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_lowercases_domain_only() {
        let samples = [
            ("test1@EXAMPLE.com", "test1@example.com"),
            ("Test2@Example.com", "Test2@example.com"),
            ("TEST3@EXAMPLE.COM", "TEST3@example.com"),
            ("test4@example.COM", "test4@example.com"),
        ];
        for (given, expected) in samples {
            assert_eq!(normalize_email(given), expected);
        }
    }

    #[test]
    fn normalize_email_trims_whitespace() {
        assert_eq!(normalize_email("  user@Example.COM  "), "user@example.com");
    }

    #[test]
    fn normalize_email_passes_through_malformed_input() {
        assert_eq!(normalize_email("no-at-sign"), "no-at-sign");
        assert_eq!(normalize_email(""), "");
    }
}
