use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{auth::jwt::AuthUser, error::AppError, state::AppState};

use super::dto::{IngredientListQuery, IngredientResponse, IngredientWrite};
use super::repo::Ingredient;

pub fn ingredient_routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients))
        .route(
            "/ingredients/:id",
            axum::routing::put(update_ingredient)
                .patch(update_ingredient)
                .delete(delete_ingredient),
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
pub async fn list_ingredients(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<IngredientListQuery>,
) -> Result<Json<Vec<IngredientResponse>>, AppError> {
    let ingredients = Ingredient::list_by_user(&state.db, user_id, q.assigned_only != 0).await?;
    Ok(Json(
        ingredients
            .into_iter()
            .map(IngredientResponse::from)
            .collect(),
    ))
}

#[instrument(skip(state, payload))]
pub async fn update_ingredient(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<IngredientWrite>,
) -> Result<Json<IngredientResponse>, AppError> {
    let name = validated_name(&payload.name)?;
    let ingredient = Ingredient::rename(&state.db, user_id, id, name)
        .await?
        .ok_or_else(|| AppError::not_found("Ingredient not found"))?;

    info!(user_id = %user_id, ingredient_id = %ingredient.id, "ingredient renamed");
    Ok(Json(ingredient.into()))
}

#[instrument(skip(state))]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !Ingredient::delete(&state.db, user_id, id).await? {
        return Err(AppError::not_found("Ingredient not found"));
    }
    info!(user_id = %user_id, ingredient_id = %id, "ingredient deleted");
    Ok(StatusCode::NO_CONTENT)
}
