//! Catalog book model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Catalog entry. `available_copies` is kept within `0..=total_copies`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    #[validate(length(min = 1, max = 300))]
    pub author: String,
    pub isbn: Option<String>,
    #[validate(range(min = 0, message = "total_copies cannot be negative"))]
    pub total_copies: i32,
}

/// Change the number of owned copies
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateCopies {
    #[validate(range(min = 0, message = "total_copies cannot be negative"))]
    pub total_copies: i32,
}

/// Book query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Matches title, author or ISBN
    pub search: Option<String>,
    pub available_only: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
