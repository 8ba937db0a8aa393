//! Author model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Author from the catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Author {
    pub id: i32,
    pub name: String,
    pub biography: Option<String>,
}

/// Create author request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAuthor {
    #[validate(length(min = 1, message = "Author name is required"))]
    pub name: String,
    pub biography: Option<String>,
}

/// Update author request
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAuthor {
    pub name: Option<String>,
    pub biography: Option<String>,
}

impl Author {
    /// Apply an update request on top of the current values
    pub fn merged(&self, update: &UpdateAuthor) -> Author {
        Author {
            id: self.id,
            name: update.name.clone().unwrap_or_else(|| self.name.clone()),
            biography: update.biography.clone().or_else(|| self.biography.clone()),
        }
    }
}
