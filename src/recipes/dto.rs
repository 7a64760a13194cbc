use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ingredients::dto::IngredientResponse;
use crate::tags::dto::TagResponse;

/// Nested tag reference by name, resolved with get-or-create semantics.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagInput {
    pub name: String,
}

/// Nested ingredient reference by name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IngredientInput {
    pub name: String,
}

/// Body for POST and PUT: the full writable surface of a recipe. Omitted
/// nested lists leave the relations untouched.
#[derive(Debug, Deserialize)]
pub struct RecipeWrite {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<TagInput>>,
    #[serde(default)]
    pub ingredients: Option<Vec<IngredientInput>>,
}

/// Body for PATCH: absent fields stay untouched; an explicit empty nested
/// list clears the relation.
#[derive(Debug, Default, Deserialize)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub tags: Option<Vec<TagInput>>,
    pub ingredients: Option<Vec<IngredientInput>>,
}

/// Summary representation used by the list endpoint.
#[derive(Debug, Serialize)]
pub struct RecipeSummary {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub tags: Vec<TagResponse>,
    pub ingredients: Vec<IngredientResponse>,
}

/// Detail representation: the summary fields plus description and a
/// presigned image URL.
#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub tags: Vec<TagResponse>,
    pub ingredients: Vec<IngredientResponse>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Query params for the list endpoint; comma-separated UUID lists.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeListQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

/// Response of the upload-image action.
#[derive(Debug, Serialize)]
pub struct RecipeImageResponse {
    pub id: Uuid,
    pub image: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_distinguishes_absent_from_empty_list() {
        let patch: RecipePatch = serde_json::from_str("{}").unwrap();
        assert!(patch.tags.is_none());
        assert!(patch.ingredients.is_none());

        let patch: RecipePatch = serde_json::from_str(r#"{"tags": [], "ingredients": []}"#).unwrap();
        assert_eq!(patch.tags, Some(vec![]));
        assert_eq!(patch.ingredients, Some(vec![]));
    }

    #[test]
    fn patch_parses_nested_names() {
        let patch: RecipePatch =
            serde_json::from_str(r#"{"tags": [{"name": "Lunch"}]}"#).unwrap();
        assert_eq!(
            patch.tags,
            Some(vec![TagInput {
                name: "Lunch".into()
            }])
        );
    }

    #[test]
    fn write_accepts_string_and_number_prices() {
        let body: RecipeWrite = serde_json::from_str(
            r#"{"title": "Pongal", "time_minutes": 60, "price": "4.50"}"#,
        )
        .unwrap();
        assert_eq!(body.price.to_string(), "4.50");

        let body: RecipeWrite =
            serde_json::from_str(r#"{"title": "Soup", "time_minutes": 5, "price": 5.25}"#).unwrap();
        assert_eq!(body.price.to_string(), "5.25");
    }

    #[test]
    fn write_requires_title() {
        let res: Result<RecipeWrite, _> =
            serde_json::from_str(r#"{"time_minutes": 60, "price": "4.50"}"#);
        assert!(res.is_err());
    }
}
