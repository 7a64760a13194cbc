use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::Tag;

#[derive(Debug, Clone, Serialize)]
pub struct TagResponse {
    pub id: Uuid,
    pub name: String,
}

impl From<Tag> for TagResponse {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
        }
    }
}

/// Rename payload; tags have no direct create endpoint, they come into
/// existence through nested recipe writes.
#[derive(Debug, Deserialize)]
pub struct TagWrite {
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagListQuery {
    /// `assigned_only=1` narrows the list to tags attached to a recipe.
    #[serde(default)]
    pub assigned_only: u8,
}
