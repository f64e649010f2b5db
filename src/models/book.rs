//! Book (inventory) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Book model from database.
///
/// `quantity` is the number of copies currently on the shelf, not the number
/// owned: every outstanding loan holds one copy out of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub isbn: String,
    pub quantity: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short book representation embedded in loan listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BookShort {
    pub id: Uuid,
    pub title: String,
    pub isbn: String,
    pub quantity: i32,
    pub is_active: bool,
}

impl From<&Book> for BookShort {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            isbn: book.isbn.clone(),
            quantity: book.quantity,
            is_active: book.is_active,
        }
    }
}

/// Book search parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Matches title or ISBN
    pub q: Option<String>,
    pub title: Option<String>,
    pub isbn: Option<String>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "ISBN is required"))]
    pub isbn: String,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
}

/// Update book request (restock goes through `quantity`)
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    #[validate(length(min = 1, message = "ISBN cannot be empty"))]
    pub isbn: Option<String>,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: Option<i32>,
}
