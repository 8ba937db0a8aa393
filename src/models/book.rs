//! Book model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Book from the catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub isbn: Option<String>,
    pub author_id: Option<i32>,
    pub publication_year: Option<i32>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub isbn: Option<String>,
    pub author_id: Option<i32>,
    pub publication_year: Option<i32>,
}

/// Update book request
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBook {
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub author_id: Option<i32>,
    pub publication_year: Option<i32>,
}

impl Book {
    pub fn merged(&self, update: &UpdateBook) -> Book {
        Book {
            id: self.id,
            title: update.title.clone().unwrap_or_else(|| self.title.clone()),
            isbn: update.isbn.clone().or_else(|| self.isbn.clone()),
            author_id: update.author_id.or(self.author_id),
            publication_year: update.publication_year.or(self.publication_year),
        }
    }
}
