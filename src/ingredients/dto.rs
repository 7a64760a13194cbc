use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::Ingredient;

#[derive(Debug, Clone, Serialize)]
pub struct IngredientResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<Ingredient> for IngredientResponse {
    fn from(ingredient: Ingredient) -> Self {
        Self {
            id: ingredient.id,
            name: ingredient.name,
        }
    }
}

/// Rename payload; like tags, ingredients are only created through nested
/// recipe writes.
#[derive(Debug, Deserialize)]
pub struct IngredientWrite {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngredientListQuery {
    /// `assigned_only=1` narrows the list to ingredients used by a recipe.
    #[serde(default)]
    pub assigned_only: u8,
}
