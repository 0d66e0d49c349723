//! Due date extension request model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::ExtensionStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ExtensionRequest {
    pub id: i32,
    pub user_id: i32,
    pub borrow_record_id: i32,
    /// Due date of the borrow record when the request was made
    pub current_due_date: NaiveDate,
    pub requested_due_date: NaiveDate,
    pub reason: Option<String>,
    pub status: ExtensionStatus,
    pub admin_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewExtension {
    pub user_id: i32,
    pub borrow_record_id: i32,
    pub current_due_date: NaiveDate,
    pub requested_due_date: NaiveDate,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateExtension {
    pub borrow_record_id: i32,
    pub requested_due_date: NaiveDate,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

/// Admin decision on a PENDING request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionDecision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct DecideExtension {
    pub decision: ExtensionDecision,
    #[validate(length(max = 1000))]
    pub admin_note: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ExtensionQuery {
    pub status: Option<ExtensionStatus>,
    pub user_id: Option<i32>,
}
