//! Fine model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{FineStatus, FineType};

/// Monetary penalty tied to one borrow record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Fine {
    pub id: i32,
    pub user_id: i32,
    pub borrow_record_id: i32,
    pub amount: Decimal,
    pub fine_type: FineType,
    pub status: FineStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub waived_at: Option<DateTime<Utc>>,
    pub waived_by: Option<i32>,
}

/// Insert payload for a new PENDING fine
#[derive(Debug, Clone)]
pub struct NewFine {
    pub user_id: i32,
    pub borrow_record_id: i32,
    pub amount: Decimal,
    pub fine_type: FineType,
    pub description: Option<String>,
}

/// Count and total of a user's PENDING fines
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct UnpaidFines {
    pub count: i64,
    pub total: Decimal,
}

/// Waive request body
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct WaiveFine {
    #[validate(length(min = 1, max = 1000, message = "A reason is required"))]
    pub reason: String,
}

/// Damage assessment body
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssessDamage {
    pub borrow_record_id: i32,
    pub amount: Decimal,
    #[validate(length(min = 1, max = 1000, message = "A description is required"))]
    pub description: String,
}

/// Fine listing filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct FineQuery {
    pub status: Option<FineStatus>,
    pub user_id: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
