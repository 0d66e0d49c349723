//! Borrow record model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::BorrowStatus;

/// One checkout of one copy of a book
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BorrowRecord {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub status: BorrowStatus,
    pub created_at: DateTime<Utc>,
}

impl BorrowRecord {
    /// Whole calendar days past the due date as of `today` (0 when not late)
    pub fn days_overdue(&self, today: NaiveDate) -> i64 {
        (today - self.due_date).num_days().max(0)
    }
}

/// Insert payload for a new checkout
#[derive(Debug, Clone)]
pub struct NewBorrow {
    pub user_id: i32,
    pub book_id: i32,
    pub borrow_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// Borrow request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBorrow {
    pub book_id: i32,
    /// Admins may borrow on behalf of a user; defaults to the caller
    pub user_id: Option<i32>,
}

/// Admin status change body
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeBorrowStatus {
    pub status: BorrowStatus,
}

/// Borrow listing filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BorrowQuery {
    pub status: Option<BorrowStatus>,
    pub user_id: Option<i32>,
    pub book_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
