//! Borrowing eligibility

use crate::{
    error::AppResult,
    models::{eligibility::Eligibility, enums::UserStatus, user::User},
    repository::Repository,
};

#[derive(Clone)]
pub struct EligibilityService {
    repository: Repository,
}

impl EligibilityService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Read-only: a user may borrow with no OVERDUE/LOST record and no PENDING fine
    pub async fn check_eligibility(&self, user_id: i32) -> AppResult<Eligibility> {
        self.repository.users.get_by_id(user_id).await?;

        let overdue = self.repository.borrows.count_overdue_or_lost(user_id).await?;
        let unpaid = self.repository.fines.unpaid_summary(user_id).await?;

        Ok(Eligibility::evaluate(overdue, unpaid.count, unpaid.total))
    }

    /// Block an ineligible APPROVED user, restore an eligible BLOCKED one.
    /// Other statuses are left alone.
    pub async fn apply_eligibility_consequence(&self, user_id: i32) -> AppResult<User> {
        let eligibility = self.check_eligibility(user_id).await?;
        let user = self.repository.users.get_by_id(user_id).await?;

        let transition = match (eligibility.is_eligible, user.status) {
            (false, UserStatus::Approved) => Some((UserStatus::Approved, UserStatus::Blocked)),
            (true, UserStatus::Blocked) => Some((UserStatus::Blocked, UserStatus::Approved)),
            _ => None,
        };

        let Some((from, to)) = transition else {
            return Ok(user);
        };

        match self.repository.users.transition_status(user_id, from, to).await? {
            Some(updated) => {
                tracing::info!(user_id, from = %from, to = %to, "User standing changed");
                Ok(updated)
            }
            // Someone else changed the status in between
            None => self.repository.users.get_by_id(user_id).await,
        }
    }

    /// Apply the consequence after a state change that already succeeded;
    /// failures are only logged.
    pub(crate) async fn refresh_standing(&self, user_id: i32) {
        if let Err(e) = self.apply_eligibility_consequence(user_id).await {
            tracing::warn!(user_id, error = %e, "Failed to refresh user standing");
        }
    }
}
