//! Borrowing eligibility summary

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

/// Result of the read-only eligibility check
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Eligibility {
    pub is_eligible: bool,
    pub reason: Option<String>,
    /// Borrow records currently OVERDUE or LOST
    pub overdue_count: i64,
    pub unpaid_fine_count: i64,
    pub total_unpaid_fine_amount: Decimal,
}

impl Eligibility {
    pub fn evaluate(overdue_count: i64, unpaid_fine_count: i64, total_unpaid_fine_amount: Decimal) -> Self {
        let reason = match (overdue_count > 0, unpaid_fine_count > 0) {
            (true, true) => Some(format!(
                "{} overdue or lost item(s) and {} unpaid fine(s) totalling {}",
                overdue_count, unpaid_fine_count, total_unpaid_fine_amount
            )),
            (true, false) => Some(format!("{} overdue or lost item(s)", overdue_count)),
            (false, true) => Some(format!(
                "{} unpaid fine(s) totalling {}",
                unpaid_fine_count, total_unpaid_fine_amount
            )),
            (false, false) => None,
        };

        Self {
            is_eligible: reason.is_none(),
            reason,
            overdue_count,
            unpaid_fine_count,
            total_unpaid_fine_amount,
        }
    }
}
