//! Fine engine: overdue and lost sweeps, payments and waivers

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::{
    eligibility::EligibilityService, lookup_user, lookup_user_and_book, notifications::Notifications,
};
use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{
        enums::{BorrowStatus, FineStatus, FineType},
        fine::{Fine, FineQuery, NewFine, UnpaidFines},
        sweep::SweepReport,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct FinesService {
    repository: Repository,
    lending: LendingConfig,
    eligibility: EligibilityService,
    notifications: Notifications,
}

fn already_resolved(fine: &Fine) -> AppError {
    AppError::state_conflict(
        format!("Fine is already {}", fine.status.as_str().to_lowercase()),
        fine.status,
    )
}

impl FinesService {
    pub fn new(
        repository: Repository,
        lending: LendingConfig,
        eligibility: EligibilityService,
        notifications: Notifications,
    ) -> Self {
        Self {
            repository,
            lending,
            eligibility,
            notifications,
        }
    }

    pub async fn get_fine(&self, fine_id: i32) -> AppResult<Fine> {
        self.repository.fines.get_by_id(fine_id).await
    }

    pub async fn list_fines(&self, query: &FineQuery) -> AppResult<(Vec<Fine>, i64)> {
        self.repository.fines.list(query).await
    }

    pub async fn unpaid_summary(&self, user_id: i32) -> AppResult<UnpaidFines> {
        self.repository.users.get_by_id(user_id).await?;
        self.repository.fines.unpaid_summary(user_id).await
    }

    /// Flip BORROWED records past their due date to OVERDUE with one fine each
    pub async fn sweep_overdue(&self) -> AppResult<SweepReport> {
        self.sweep_overdue_on(Utc::now().date_naive()).await
    }

    pub async fn sweep_overdue_on(&self, today: NaiveDate) -> AppResult<SweepReport> {
        let records = self
            .repository
            .borrows
            .list_due_before(&[BorrowStatus::Borrowed], today)
            .await?;

        let mut report = SweepReport {
            scanned: records.len(),
            ..Default::default()
        };

        for mut record in records {
            let days_overdue = record.days_overdue(today);
            if days_overdue <= 0 {
                continue;
            }

            let new_fine = NewFine {
                user_id: record.user_id,
                borrow_record_id: record.id,
                amount: Decimal::from(days_overdue * self.lending.overdue_fine_per_day),
                fine_type: FineType::Overdue,
                description: Some(format!("Overdue by {} day(s)", days_overdue)),
            };

            let Some(fine) = self
                .repository
                .borrows
                .transition_with_fine(record.id, &[BorrowStatus::Borrowed], BorrowStatus::Overdue, &new_fine)
                .await?
            else {
                continue;
            };
            report.transitioned += 1;
            report.fines_created += 1;
            record.status = BorrowStatus::Overdue;

            tracing::info!(
                borrow_id = record.id,
                user_id = record.user_id,
                fine_id = fine.id,
                amount = %fine.amount,
                "Borrow marked overdue"
            );

            if let Some((user, book)) = lookup_user_and_book(&self.repository, record.user_id, record.book_id).await {
                self.notifications.overdue(&user, &book, &record, &fine).await;
            }
            self.eligibility.refresh_standing(record.user_id).await;
        }

        tracing::info!(
            scanned = report.scanned,
            transitioned = report.transitioned,
            fines_created = report.fines_created,
            "Overdue sweep finished"
        );
        Ok(report)
    }

    /// Declare BORROWED or OVERDUE records lost once they are more than
    /// `lost_after_days` past due, charging the flat lost-book fine.
    pub async fn sweep_lost_books(&self) -> AppResult<SweepReport> {
        self.sweep_lost_books_on(Utc::now().date_naive()).await
    }

    pub async fn sweep_lost_books_on(&self, today: NaiveDate) -> AppResult<SweepReport> {
        let cutoff = today - Duration::days(self.lending.lost_after_days);
        let from = [BorrowStatus::Borrowed, BorrowStatus::Overdue];
        let records = self.repository.borrows.list_due_before(&from, cutoff).await?;

        let mut report = SweepReport {
            scanned: records.len(),
            ..Default::default()
        };

        for mut record in records {
            let new_fine = NewFine {
                user_id: record.user_id,
                borrow_record_id: record.id,
                amount: Decimal::from(self.lending.lost_book_fine),
                fine_type: FineType::Lost,
                description: Some(format!(
                    "Declared lost {} day(s) after the due date",
                    record.days_overdue(today)
                )),
            };

            let Some(fine) = self
                .repository
                .borrows
                .transition_with_fine(record.id, &from, BorrowStatus::Lost, &new_fine)
                .await?
            else {
                continue;
            };
            report.transitioned += 1;
            report.fines_created += 1;
            record.status = BorrowStatus::Lost;

            tracing::info!(
                borrow_id = record.id,
                user_id = record.user_id,
                fine_id = fine.id,
                "Borrow declared lost"
            );

            if let Some((user, book)) = lookup_user_and_book(&self.repository, record.user_id, record.book_id).await {
                self.notifications.lost(&user, &book, &record, &fine).await;
            }
            self.eligibility.refresh_standing(record.user_id).await;
        }

        tracing::info!(
            scanned = report.scanned,
            transitioned = report.transitioned,
            fines_created = report.fines_created,
            "Lost book sweep finished"
        );
        Ok(report)
    }

    pub async fn mark_fine_paid(&self, fine_id: i32) -> AppResult<Fine> {
        let fine = self.repository.fines.get_by_id(fine_id).await?;
        if fine.status != FineStatus::Pending {
            return Err(already_resolved(&fine));
        }

        let paid = match self.repository.fines.mark_paid(fine_id, Utc::now()).await? {
            Some(paid) => paid,
            None => return Err(already_resolved(&self.repository.fines.get_by_id(fine_id).await?)),
        };
        tracing::info!(fine_id, user_id = paid.user_id, amount = %paid.amount, "Fine paid");

        self.eligibility.refresh_standing(paid.user_id).await;
        if let Some(user) = lookup_user(&self.repository, paid.user_id).await {
            self.notifications.fine_paid(&user, &paid).await;
        }

        Ok(paid)
    }

    pub async fn waive_fine(&self, fine_id: i32, admin_id: i32, reason: &str) -> AppResult<Fine> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation("A reason is required to waive a fine".to_string()));
        }

        let fine = self.repository.fines.get_by_id(fine_id).await?;
        if fine.status != FineStatus::Pending {
            return Err(already_resolved(&fine));
        }

        let waived = match self
            .repository
            .fines
            .waive(fine_id, admin_id, reason, Utc::now())
            .await?
        {
            Some(waived) => waived,
            None => return Err(already_resolved(&self.repository.fines.get_by_id(fine_id).await?)),
        };
        tracing::info!(fine_id, admin_id, user_id = waived.user_id, "Fine waived");

        self.eligibility.refresh_standing(waived.user_id).await;
        if let Some(user) = lookup_user(&self.repository, waived.user_id).await {
            self.notifications.fine_waived(&user, &waived).await;
        }

        Ok(waived)
    }

    /// Charge a DAMAGE fine against a borrow record
    pub async fn assess_damage(
        &self,
        borrow_record_id: i32,
        amount: Decimal,
        description: &str,
    ) -> AppResult<Fine> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation("Fine amount must be positive".to_string()));
        }

        let record = self.repository.borrows.get_by_id(borrow_record_id).await?;
        let fine = self
            .repository
            .fines
            .create(&NewFine {
                user_id: record.user_id,
                borrow_record_id,
                amount,
                fine_type: FineType::Damage,
                description: Some(description.trim().to_string()),
            })
            .await?;
        tracing::info!(fine_id = fine.id, borrow_record_id, amount = %fine.amount, "Damage fine assessed");

        self.eligibility.refresh_standing(record.user_id).await;
        if let Some(user) = lookup_user(&self.repository, record.user_id).await {
            self.notifications.damage_fine(&user, &fine).await;
        }

        Ok(fine)
    }
}
