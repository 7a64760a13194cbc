use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{auth::jwt::AuthUser, error::AppError, state::AppState};

use super::dto::{TagListQuery, TagResponse, TagWrite};
use super::repo::Tag;

pub fn tag_routes() -> Router<AppState> {
    Router::new().route("/tags", get(list_tags)).route(
        "/tags/:id",
        axum::routing::put(update_tag)
            .patch(update_tag)
            .delete(delete_tag),
    )
}

fn validated_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::field("name", "This field may not be blank."));
    }
    if name.len() > 255 {
        return Err(AppError::field("name", "Name is too long."));
    }
    Ok(name)
}

#[instrument(skip(state))]
pub async fn list_tags(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<TagListQuery>,
) -> Result<Json<Vec<TagResponse>>, AppError> {
    let tags = Tag::list_by_user(&state.db, user_id, q.assigned_only != 0).await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn update_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TagWrite>,
) -> Result<Json<TagResponse>, AppError> {
    let name = validated_name(&payload.name)?;
    let tag = Tag::rename(&state.db, user_id, id, name)
        .await?
        .ok_or_else(|| AppError::not_found("Tag not found"))?;

    info!(user_id = %user_id, tag_id = %tag.id, "tag renamed");
    Ok(Json(tag.into()))
}

#[instrument(skip(state))]
pub async fn delete_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !Tag::delete(&state.db, user_id, id).await? {
        return Err(AppError::not_found("Tag not found"));
    }
    info!(user_id = %user_id, tag_id = %id, "tag deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validated_name_trims_and_accepts() {
        assert_eq!(validated_name("  Dinner ").unwrap(), "Dinner");
    }

    #[test]
    fn validated_name_rejects_blank() {
        assert!(validated_name("   ").is_err());
        assert!(validated_name("").is_err());
    }

    #[test]
    fn validated_name_rejects_overlong() {
        let long = "x".repeat(256);
        assert!(validated_name(&long).is_err());
    }
}
