use std::collections::BTreeMap;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header::LOCATION, HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{auth::jwt::AuthUser, error::AppError, state::AppState};

use super::dto::{
    IngredientInput, RecipeDetail, RecipeImageResponse, RecipeListQuery, RecipePatch,
    RecipeSummary, RecipeWrite, TagInput,
};
use super::images::{image_key, validate_image, IMAGE_URL_TTL_SECS};
use super::repo::{self, Recipe, RecipeChanges};

const UPLOAD_LIMIT_BYTES: usize = 20 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes))
        .route("/recipes/:id", get(get_recipe))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", post(create_recipe))
        .route(
            "/recipes/:id",
            put(put_recipe).patch(patch_recipe).delete(delete_recipe),
        )
        .route(
            "/recipes/:id/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
}

// --- validation ---

struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    fn new() -> Self {
        Self(BTreeMap::new())
    }

    fn push(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    fn into_result(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }
}

fn check_names<'a>(
    errors: &mut FieldErrors,
    field: &str,
    names: impl Iterator<Item = &'a str>,
) {
    for name in names {
        if name.trim().is_empty() {
            errors.push(field, "Names may not be blank.");
            return;
        }
    }
}

fn validate_write(body: &RecipeWrite) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    if body.title.trim().is_empty() {
        errors.push("title", "This field may not be blank.");
    }
    if body.time_minutes < 0 {
        errors.push(
            "time_minutes",
            "Ensure this value is greater than or equal to 0.",
        );
    }
    if body.price < Decimal::ZERO {
        errors.push("price", "Ensure this value is greater than or equal to 0.");
    }
    if let Some(tags) = &body.tags {
        check_names(&mut errors, "tags", tags.iter().map(|t| t.name.as_str()));
    }
    if let Some(ingredients) = &body.ingredients {
        check_names(
            &mut errors,
            "ingredients",
            ingredients.iter().map(|i| i.name.as_str()),
        );
    }
    errors.into_result()
}

fn validate_patch(body: &RecipePatch) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    if let Some(title) = &body.title {
        if title.trim().is_empty() {
            errors.push("title", "This field may not be blank.");
        }
    }
    if let Some(time_minutes) = body.time_minutes {
        if time_minutes < 0 {
            errors.push(
                "time_minutes",
                "Ensure this value is greater than or equal to 0.",
            );
        }
    }
    if let Some(price) = body.price {
        if price < Decimal::ZERO {
            errors.push("price", "Ensure this value is greater than or equal to 0.");
        }
    }
    if let Some(tags) = &body.tags {
        check_names(&mut errors, "tags", tags.iter().map(|t| t.name.as_str()));
    }
    if let Some(ingredients) = &body.ingredients {
        check_names(
            &mut errors,
            "ingredients",
            ingredients.iter().map(|i| i.name.as_str()),
        );
    }
    errors.into_result()
}

fn tag_names(tags: &[TagInput]) -> Vec<String> {
    tags.iter().map(|t| t.name.trim().to_string()).collect()
}

fn ingredient_names(ingredients: &[IngredientInput]) -> Vec<String> {
    ingredients
        .iter()
        .map(|i| i.name.trim().to_string())
        .collect()
}

/// Parse a comma-separated UUID list; `None` when the param is absent or
/// holds nothing.
fn parse_id_list(field: &str, raw: Option<&str>) -> Result<Option<Vec<Uuid>>, AppError> {
    let Some(raw) = raw else { return Ok(None) };
    let mut ids = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id = Uuid::parse_str(part)
            .map_err(|_| AppError::field(field, "Enter a valid list of IDs."))?;
        ids.push(id);
    }
    Ok((!ids.is_empty()).then_some(ids))
}

// --- response assembly ---

async fn detail_response(state: &AppState, recipe: Recipe) -> Result<RecipeDetail, AppError> {
    let mut tags = repo::tags_for_recipes(&state.db, &[recipe.id]).await?;
    let mut ingredients = repo::ingredients_for_recipes(&state.db, &[recipe.id]).await?;

    let image = match &recipe.image_key {
        Some(key) => Some(state.storage.presign_get(key, IMAGE_URL_TTL_SECS).await?),
        None => None,
    };

    Ok(RecipeDetail {
        id: recipe.id,
        title: recipe.title,
        time_minutes: recipe.time_minutes,
        price: recipe.price,
        link: recipe.link,
        description: recipe.description,
        image,
        tags: tags
            .remove(&recipe.id)
            .unwrap_or_default()
            .into_iter()
            .map(Into::into)
            .collect(),
        ingredients: ingredients
            .remove(&recipe.id)
            .unwrap_or_default()
            .into_iter()
            .map(Into::into)
            .collect(),
        created_at: recipe.created_at,
    })
}

fn location_header(recipe_id: Uuid) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        LOCATION,
        format!("/api/v1/recipes/{}", recipe_id).parse().unwrap(),
    );
    headers
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<RecipeListQuery>,
) -> Result<Json<Vec<RecipeSummary>>, AppError> {
    let tag_ids = parse_id_list("tags", q.tags.as_deref())?;
    let ingredient_ids = parse_id_list("ingredients", q.ingredients.as_deref())?;

    let recipes = repo::list_by_user(&state.db, user_id, tag_ids, ingredient_ids).await?;
    let ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();
    let mut tags = repo::tags_for_recipes(&state.db, &ids).await?;
    let mut ingredients = repo::ingredients_for_recipes(&state.db, &ids).await?;

    let items = recipes
        .into_iter()
        .map(|r| RecipeSummary {
            id: r.id,
            title: r.title,
            time_minutes: r.time_minutes,
            price: r.price,
            link: r.link,
            tags: tags
                .remove(&r.id)
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect(),
            ingredients: ingredients
                .remove(&r.id)
                .unwrap_or_default()
                .into_iter()
                .map(Into::into)
                .collect(),
        })
        .collect();
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipeDetail>, AppError> {
    let recipe = repo::get_scoped(&state.db, user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe not found"))?;
    Ok(Json(detail_response(&state, recipe).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<RecipeWrite>,
) -> Result<(StatusCode, HeaderMap, Json<RecipeDetail>), AppError> {
    validate_write(&payload)?;

    let changes = RecipeChanges {
        title: payload.title.trim().to_string(),
        time_minutes: payload.time_minutes,
        price: payload.price,
        description: payload.description.clone(),
        link: payload.link.clone(),
    };

    let mut tx = state.db.begin().await.context("begin tx")?;
    let recipe = repo::create_tx(&mut tx, user_id, &changes).await?;
    if let Some(tags) = &payload.tags {
        repo::set_tags_tx(&mut tx, user_id, recipe.id, &tag_names(tags)).await?;
    }
    if let Some(ingredients) = &payload.ingredients {
        repo::set_ingredients_tx(&mut tx, user_id, recipe.id, &ingredient_names(ingredients))
            .await?;
    }
    tx.commit().await.context("commit tx")?;

    info!(user_id = %user_id, recipe_id = %recipe.id, "recipe created");
    let headers = location_header(recipe.id);
    let detail = detail_response(&state, recipe).await?;
    Ok((StatusCode::CREATED, headers, Json(detail)))
}

#[instrument(skip(state, payload))]
pub async fn put_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecipeWrite>,
) -> Result<Json<RecipeDetail>, AppError> {
    validate_write(&payload)?;

    let changes = RecipeChanges {
        title: payload.title.trim().to_string(),
        time_minutes: payload.time_minutes,
        price: payload.price,
        description: payload.description.clone(),
        link: payload.link.clone(),
    };

    let mut tx = state.db.begin().await.context("begin tx")?;
    let recipe = repo::update_tx(&mut tx, user_id, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe not found"))?;
    if let Some(tags) = &payload.tags {
        repo::set_tags_tx(&mut tx, user_id, recipe.id, &tag_names(tags)).await?;
    }
    if let Some(ingredients) = &payload.ingredients {
        repo::set_ingredients_tx(&mut tx, user_id, recipe.id, &ingredient_names(ingredients))
            .await?;
    }
    tx.commit().await.context("commit tx")?;

    info!(user_id = %user_id, recipe_id = %recipe.id, "recipe replaced");
    Ok(Json(detail_response(&state, recipe).await?))
}

#[instrument(skip(state, payload))]
pub async fn patch_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecipePatch>,
) -> Result<Json<RecipeDetail>, AppError> {
    validate_patch(&payload)?;

    let current = repo::get_scoped(&state.db, user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe not found"))?;

    let changes = RecipeChanges {
        title: payload
            .title
            .map(|t| t.trim().to_string())
            .unwrap_or(current.title),
        time_minutes: payload.time_minutes.unwrap_or(current.time_minutes),
        price: payload.price.unwrap_or(current.price),
        description: payload.description.or(current.description),
        link: payload.link.or(current.link),
    };

    let mut tx = state.db.begin().await.context("begin tx")?;
    let recipe = repo::update_tx(&mut tx, user_id, id, &changes)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe not found"))?;
    if let Some(tags) = &payload.tags {
        repo::set_tags_tx(&mut tx, user_id, recipe.id, &tag_names(tags)).await?;
    }
    if let Some(ingredients) = &payload.ingredients {
        repo::set_ingredients_tx(&mut tx, user_id, recipe.id, &ingredient_names(ingredients))
            .await?;
    }
    tx.commit().await.context("commit tx")?;

    info!(user_id = %user_id, recipe_id = %recipe.id, "recipe updated");
    Ok(Json(detail_response(&state, recipe).await?))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !repo::delete(&state.db, user_id, id).await? {
        return Err(AppError::not_found("Recipe not found"));
    }
    info!(user_id = %user_id, recipe_id = %id, "recipe deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /recipes/{id}/upload-image (multipart, field `image`).
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> Result<Json<RecipeImageResponse>, AppError> {
    let recipe = repo::get_scoped(&state.db, user_id, id)
        .await?
        .ok_or_else(|| AppError::not_found("Recipe not found"))?;

    let mut upload: Option<(String, bytes::Bytes)> = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|_| AppError::BadRequest("invalid multipart body".into()))?
    {
        if field.name() == Some("image") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let data = field
                .bytes()
                .await
                .map_err(|_| AppError::BadRequest("invalid multipart body".into()))?;
            upload = Some((content_type, data));
            break;
        }
    }

    let (content_type, data) =
        upload.ok_or_else(|| AppError::field("image", "No file was submitted."))?;
    if data.is_empty() {
        return Err(AppError::field("image", "The submitted file is empty."));
    }
    let ext = validate_image(&content_type, &data)?;

    let key = image_key(user_id, recipe.id, ext);
    state.storage.put_object(&key, data, &content_type).await?;
    repo::set_image_key(&state.db, user_id, recipe.id, &key).await?;

    // Replaced object is gone from the row already; deletion is best effort.
    if let Some(old) = &recipe.image_key {
        if let Err(e) = state.storage.delete_object(old).await {
            warn!(error = %e, key = %old, "failed to delete replaced image");
        }
    }

    let image = state.storage.presign_get(&key, IMAGE_URL_TTL_SECS).await?;
    info!(user_id = %user_id, recipe_id = %recipe.id, "recipe image uploaded");
    Ok(Json(RecipeImageResponse {
        id: recipe.id,
        image,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_list_handles_absent_and_empty() {
        assert_eq!(parse_id_list("tags", None).unwrap(), None);
        assert_eq!(parse_id_list("tags", Some("")).unwrap(), None);
        assert_eq!(parse_id_list("tags", Some(" , ")).unwrap(), None);
    }

    #[test]
    fn parse_id_list_splits_on_commas() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let parsed = parse_id_list("tags", Some(&format!("{},{}", a, b)))
            .unwrap()
            .unwrap();
        assert_eq!(parsed, vec![a, b]);
    }

    #[test]
    fn parse_id_list_rejects_garbage() {
        assert!(parse_id_list("tags", Some("not-a-uuid")).is_err());
        assert!(parse_id_list("ingredients", Some("123,456")).is_err());
    }

    #[test]
    fn validate_write_collects_all_field_errors() {
        let body: RecipeWrite = serde_json::from_str(
            r#"{"title": "  ", "time_minutes": -5, "price": "-1.00"}"#,
        )
        .unwrap();
        let err = validate_write(&body).unwrap_err();
        match err {
            AppError::Validation(errors) => {
                assert!(errors.contains_key("title"));
                assert!(errors.contains_key("time_minutes"));
                assert!(errors.contains_key("price"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn validate_write_rejects_blank_nested_names() {
        let body: RecipeWrite = serde_json::from_str(
            r#"{"title": "Soup", "time_minutes": 5, "price": "1.00", "tags": [{"name": " "}]}"#,
        )
        .unwrap();
        let err = validate_write(&body).unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.contains_key("tags")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn validate_patch_ignores_absent_fields() {
        let patch = RecipePatch::default();
        assert!(validate_patch(&patch).is_ok());
    }
}
