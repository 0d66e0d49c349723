//! Borrow and return workflow

use chrono::{Duration, Utc};

use super::{eligibility::EligibilityService, holds::HoldsService, notifications::Notifications};
use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{
        borrow::{BorrowQuery, BorrowRecord, NewBorrow},
        enums::BorrowStatus,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct BorrowsService {
    repository: Repository,
    lending: LendingConfig,
    eligibility: EligibilityService,
    holds: HoldsService,
    notifications: Notifications,
}

impl BorrowsService {
    pub fn new(
        repository: Repository,
        lending: LendingConfig,
        eligibility: EligibilityService,
        holds: HoldsService,
        notifications: Notifications,
    ) -> Self {
        Self {
            repository,
            lending,
            eligibility,
            holds,
            notifications,
        }
    }

    pub async fn get_borrow(&self, borrow_id: i32) -> AppResult<BorrowRecord> {
        self.repository.borrows.get_by_id(borrow_id).await
    }

    pub async fn list_borrows(&self, query: &BorrowQuery) -> AppResult<(Vec<BorrowRecord>, i64)> {
        self.repository.borrows.list(query).await
    }

    /// Check out one copy of a book for `loan_days`
    pub async fn borrow(&self, book_id: i32, user_id: i32) -> AppResult<BorrowRecord> {
        let user = self.repository.users.get_by_id(user_id).await?;
        if !user.is_approved() {
            return Err(AppError::BusinessRule(format!(
                "Only approved accounts can borrow (account is {})",
                user.status
            )));
        }

        let book = self.repository.books.get_by_id(book_id).await?;

        if self.repository.borrows.find_active(user_id, book_id).await?.is_some() {
            return Err(AppError::Conflict("You have already borrowed this book".to_string()));
        }

        let eligibility = self.eligibility.check_eligibility(user_id).await?;
        if !eligibility.is_eligible {
            return Err(AppError::BusinessRule(format!(
                "Not eligible to borrow: {}",
                eligibility.reason.unwrap_or_default()
            )));
        }

        let borrow_date = Utc::now().date_naive();
        let new_borrow = NewBorrow {
            user_id,
            book_id,
            borrow_date,
            due_date: borrow_date + Duration::days(self.lending.loan_days),
        };

        let record = self
            .repository
            .borrows
            .checkout(&new_borrow)
            .await?
            .ok_or_else(|| AppError::BusinessRule("Book is not available".to_string()))?;

        tracing::info!(
            borrow_id = record.id,
            user_id,
            book_id,
            due_date = %record.due_date,
            "Book borrowed"
        );

        self.notifications.borrow_confirmation(&user, &book, &record).await;
        self.notifications.borrow_receipt(&user, &book, &record).await;

        Ok(record)
    }

    /// Admin status change. Only forward transitions are allowed; RETURNED
    /// puts the copy back on the shelf and offers it to the hold queue.
    pub async fn change_borrow_status(
        &self,
        borrow_id: i32,
        status: BorrowStatus,
    ) -> AppResult<BorrowRecord> {
        let record = self.repository.borrows.get_by_id(borrow_id).await?;
        if !record.status.can_transition_to(status) {
            return Err(AppError::state_conflict(
                format!("Cannot change borrow status to {}", status),
                record.status,
            ));
        }

        let updated = if status == BorrowStatus::Returned {
            self.repository
                .borrows
                .check_in(borrow_id, Utc::now().date_naive())
                .await?
        } else {
            self.repository
                .borrows
                .transition(borrow_id, record.status, status)
                .await?
        };

        let Some(updated) = updated else {
            let current = self.repository.borrows.get_by_id(borrow_id).await?;
            return Err(AppError::state_conflict(
                format!("Cannot change borrow status to {}", status),
                current.status,
            ));
        };

        tracing::info!(borrow_id, from = %record.status, to = %status, "Borrow status changed");

        // The return is committed; a failed promotion is retried by the next
        // return, cancellation, expiry or copy increase on this book
        if status == BorrowStatus::Returned {
            if let Err(e) = self.holds.promote_next_hold(updated.book_id).await {
                tracing::warn!(borrow_id, book_id = updated.book_id, error = %e, "Hold promotion failed");
            }
        }
        self.eligibility.refresh_standing(updated.user_id).await;

        Ok(updated)
    }
}
