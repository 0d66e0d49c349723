//! Hold queue management

use chrono::{DateTime, Duration, Utc};

use super::{lookup_user_and_book, notifications::Notifications};
use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{
        enums::HoldStatus,
        hold::{BookHold, HoldWithPosition},
        sweep::SweepReport,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct HoldsService {
    repository: Repository,
    lending: LendingConfig,
    notifications: Notifications,
}

impl HoldsService {
    pub fn new(repository: Repository, lending: LendingConfig, notifications: Notifications) -> Self {
        Self {
            repository,
            lending,
            notifications,
        }
    }

    pub async fn get_hold(&self, hold_id: i32) -> AppResult<BookHold> {
        self.repository.holds.get_by_id(hold_id).await
    }

    async fn with_position(&self, hold: BookHold) -> AppResult<HoldWithPosition> {
        let queue_position = self.repository.holds.queue_position(&hold).await?;
        Ok(HoldWithPosition {
            hold,
            queue_position,
        })
    }

    /// Join the waitlist of a book with no unreserved copy
    pub async fn place_hold(&self, user_id: i32, book_id: i32) -> AppResult<HoldWithPosition> {
        let user = self.repository.users.get_by_id(user_id).await?;
        if !user.is_approved() {
            return Err(AppError::BusinessRule(format!(
                "Only approved accounts can place holds (account is {})",
                user.status
            )));
        }

        let book = self.repository.books.get_by_id(book_id).await?;
        let reserved = self.repository.holds.count_ready(book_id).await?;
        if i64::from(book.available_copies) > reserved {
            return Err(AppError::BusinessRule(
                "Book is available, borrow it instead of placing a hold".to_string(),
            ));
        }

        if self.repository.holds.find_active(user_id, book_id).await?.is_some() {
            return Err(AppError::Conflict(
                "You already have an active hold on this book".to_string(),
            ));
        }
        if self.repository.borrows.find_active(user_id, book_id).await?.is_some() {
            return Err(AppError::Conflict("You have already borrowed this book".to_string()));
        }

        let hold = self.repository.holds.create(user_id, book_id, Utc::now()).await?;
        let hold = self.with_position(hold).await?;
        tracing::info!(hold_id = hold.hold.id, user_id, book_id, position = ?hold.queue_position, "Hold placed");

        self.notifications
            .hold_placed(&user, &book, hold.queue_position)
            .await;

        Ok(hold)
    }

    /// Cancel a hold that is neither FULFILLED nor CANCELLED. Cancelling a
    /// READY hold frees its copy for the next waiter.
    pub async fn cancel_hold(&self, hold_id: i32) -> AppResult<BookHold> {
        let hold = self.repository.holds.get_by_id(hold_id).await?;
        if !hold.status.can_cancel() {
            return Err(AppError::state_conflict("Hold cannot be cancelled", hold.status));
        }

        let cancelled = match self.repository.holds.cancel(hold_id).await? {
            Some(cancelled) => cancelled,
            None => {
                let current = self.repository.holds.get_by_id(hold_id).await?;
                return Err(AppError::state_conflict("Hold cannot be cancelled", current.status));
            }
        };
        tracing::info!(hold_id, book_id = hold.book_id, "Hold cancelled");

        if let Some((user, book)) = lookup_user_and_book(&self.repository, hold.user_id, hold.book_id).await {
            self.notifications.hold_cancelled(&user, &book).await;
        }

        if hold.status == HoldStatus::Ready {
            if let Err(e) = self.promote_next_at(hold.book_id, Utc::now()).await {
                tracing::warn!(hold_id, book_id = hold.book_id, error = %e, "Hold promotion failed");
            }
        }

        Ok(cancelled)
    }

    /// READY -> FULFILLED. Creating the borrow record is a separate call.
    pub async fn fulfill_hold(&self, hold_id: i32) -> AppResult<BookHold> {
        let hold = self.repository.holds.get_by_id(hold_id).await?;
        if hold.status != HoldStatus::Ready {
            return Err(AppError::state_conflict("Only READY holds can be fulfilled", hold.status));
        }

        match self.repository.holds.fulfill(hold_id).await? {
            Some(fulfilled) => {
                tracing::info!(hold_id, book_id = hold.book_id, "Hold fulfilled");
                Ok(fulfilled)
            }
            None => {
                let current = self.repository.holds.get_by_id(hold_id).await?;
                Err(AppError::state_conflict("Only READY holds can be fulfilled", current.status))
            }
        }
    }

    /// Offer a freed copy to the oldest WAITING hold of the book
    pub async fn promote_next_hold(&self, book_id: i32) -> AppResult<Option<BookHold>> {
        self.promote_next_at(book_id, Utc::now()).await
    }

    async fn promote_next_at(&self, book_id: i32, now: DateTime<Utc>) -> AppResult<Option<BookHold>> {
        let expiry = now + Duration::days(self.lending.hold_pickup_days);
        let Some(hold) = self.repository.holds.promote_next(book_id, now, expiry).await? else {
            return Ok(None);
        };
        tracing::info!(hold_id = hold.id, user_id = hold.user_id, book_id, %expiry, "Hold ready for pickup");

        if let Some((user, book)) = lookup_user_and_book(&self.repository, hold.user_id, book_id).await {
            self.notifications.hold_ready(&user, &book, &hold).await;
        }

        Ok(Some(hold))
    }

    /// Expire READY holds past their pickup window, promoting the next waiter
    /// of each book right after every single expiry.
    pub async fn sweep_expired_holds(&self) -> AppResult<SweepReport> {
        self.sweep_expired_holds_at(Utc::now()).await
    }

    pub async fn sweep_expired_holds_at(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let expired = self.repository.holds.list_expired(now).await?;
        let mut report = SweepReport {
            scanned: expired.len(),
            ..Default::default()
        };

        for hold in expired {
            let Some(hold) = self.repository.holds.expire(hold.id, now).await? else {
                continue;
            };
            report.transitioned += 1;
            tracing::info!(hold_id = hold.id, book_id = hold.book_id, "Hold expired");

            if let Some((user, book)) = lookup_user_and_book(&self.repository, hold.user_id, hold.book_id).await {
                self.notifications.hold_expired(&user, &book).await;
            }

            if let Err(e) = self.promote_next_at(hold.book_id, now).await {
                tracing::warn!(hold_id = hold.id, book_id = hold.book_id, error = %e, "Hold promotion failed");
            }
        }

        tracing::info!(
            scanned = report.scanned,
            expired = report.transitioned,
            "Hold expiry sweep finished"
        );
        Ok(report)
    }

    pub async fn list_user_holds(&self, user_id: i32) -> AppResult<Vec<HoldWithPosition>> {
        let holds = self.repository.holds.list_for_user(user_id).await?;
        let mut result = Vec::with_capacity(holds.len());
        for hold in holds {
            result.push(self.with_position(hold).await?);
        }
        Ok(result)
    }

    /// WAITING and READY holds of a book in queue order
    pub async fn book_queue(&self, book_id: i32) -> AppResult<Vec<HoldWithPosition>> {
        self.repository.books.get_by_id(book_id).await?;

        let holds = self.repository.holds.list_queue(book_id).await?;
        let mut position = 0;
        Ok(holds
            .into_iter()
            .map(|hold| {
                let queue_position = (hold.status == HoldStatus::Waiting).then(|| {
                    position += 1;
                    position
                });
                HoldWithPosition {
                    hold,
                    queue_position,
                }
            })
            .collect())
    }
}
