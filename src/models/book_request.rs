//! Acquisition requests for titles the library does not own

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::BookRequestStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookRequest {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub reason: Option<String>,
    pub status: BookRequestStatus,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBookRequest {
    #[validate(length(min = 1, max = 500, message = "Title is required"))]
    pub title: String,
    #[validate(length(max = 300))]
    pub author: Option<String>,
    pub isbn: Option<String>,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct DecideBookRequest {
    pub status: BookRequestStatus,
    #[validate(length(max = 1000))]
    pub admin_note: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookRequestQuery {
    pub status: Option<BookRequestStatus>,
}
