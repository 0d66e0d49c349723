//! Book hold (waitlist) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::enums::HoldStatus;

/// Waitlist entry for a book with no free copy
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookHold {
    pub id: i32,
    pub user_id: i32,
    pub book_id: i32,
    pub status: HoldStatus,
    pub request_date: DateTime<Utc>,
    /// Set when the hold becomes READY
    pub notification_date: Option<DateTime<Utc>>,
    /// End of the pickup window
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Hold with its place in the book's queue
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HoldWithPosition {
    #[serde(flatten)]
    pub hold: BookHold,
    /// 1-based among WAITING holds; None once the hold left the queue
    pub queue_position: Option<i64>,
}

/// Place hold body
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateHold {
    pub book_id: i32,
}
