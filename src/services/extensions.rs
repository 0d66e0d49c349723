//! Due-date extension requests

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Utc};

use super::{lookup_user, notifications::Notifications};
use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::{
        enums::{BorrowStatus, ExtensionStatus},
        extension::{CreateExtension, ExtensionDecision, ExtensionQuery, ExtensionRequest, NewExtension},
    },
    repository::Repository,
};

/// Midnight UTC on the first day of `now`'s month
pub(crate) fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let today = now.date_naive();
    let first = today.with_day(1).unwrap_or(today);
    Utc.from_utc_datetime(&first.and_time(NaiveTime::MIN))
}

#[derive(Clone)]
pub struct ExtensionsService {
    repository: Repository,
    lending: LendingConfig,
    notifications: Notifications,
}

impl ExtensionsService {
    pub fn new(repository: Repository, lending: LendingConfig, notifications: Notifications) -> Self {
        Self {
            repository,
            lending,
            notifications,
        }
    }

    pub async fn get_extension_request(&self, id: i32) -> AppResult<ExtensionRequest> {
        self.repository.extensions.get_by_id(id).await
    }

    pub async fn list_extension_requests(&self, query: &ExtensionQuery) -> AppResult<Vec<ExtensionRequest>> {
        self.repository.extensions.list(query).await
    }

    /// Ask to move the due date of one of the caller's BORROWED records
    pub async fn create_extension_request(
        &self,
        user_id: i32,
        request: &CreateExtension,
    ) -> AppResult<ExtensionRequest> {
        let user = self.repository.users.get_by_id(user_id).await?;
        if !user.is_approved() {
            return Err(AppError::BusinessRule(format!(
                "Only approved accounts can request extensions (account is {})",
                user.status
            )));
        }

        let record = self.repository.borrows.get_by_id(request.borrow_record_id).await?;
        if record.user_id != user_id {
            return Err(AppError::BusinessRule(
                "You can only request extensions for your own borrows".to_string(),
            ));
        }
        if record.status != BorrowStatus::Borrowed {
            return Err(AppError::state_conflict(
                "Only borrowed items can be extended",
                record.status,
            ));
        }
        if request.requested_due_date <= record.due_date {
            return Err(AppError::Validation(format!(
                "Requested due date must be after the current due date ({})",
                record.due_date
            )));
        }

        if self.repository.extensions.find_pending(record.id).await?.is_some() {
            return Err(AppError::Conflict(
                "An extension request is already pending for this borrow".to_string(),
            ));
        }

        let now = Utc::now();
        let approved = self
            .repository
            .extensions
            .count_approved_since(user_id, month_start(now))
            .await?;
        if approved >= self.lending.max_approved_extensions_per_month {
            return Err(AppError::BusinessRule(format!(
                "Monthly extension limit reached ({} approved this month)",
                approved
            )));
        }

        let created = self
            .repository
            .extensions
            .create(&NewExtension {
                user_id,
                borrow_record_id: record.id,
                current_due_date: record.due_date,
                requested_due_date: request.requested_due_date,
                reason: request.reason.clone(),
                created_at: now,
            })
            .await?;
        tracing::info!(
            extension_id = created.id,
            borrow_id = record.id,
            user_id,
            requested_due_date = %created.requested_due_date,
            "Extension requested"
        );

        match self.repository.users.first_admin().await {
            Ok(Some(admin)) => {
                self.notifications
                    .extension_requested(&admin, &user, &created)
                    .await
            }
            Ok(None) => tracing::warn!(extension_id = created.id, "No administrator to notify"),
            Err(e) => tracing::warn!(extension_id = created.id, error = %e, "Cannot look up administrator"),
        }

        Ok(created)
    }

    /// Approve or reject a PENDING request. Approval moves the borrow's due
    /// date and is refused once the borrow is no longer BORROWED.
    pub async fn decide_extension_request(
        &self,
        id: i32,
        decision: ExtensionDecision,
        admin_note: Option<&str>,
    ) -> AppResult<ExtensionRequest> {
        let request = self.repository.extensions.get_by_id(id).await?;
        if request.status != ExtensionStatus::Pending {
            return Err(AppError::state_conflict(
                "Extension request has already been decided",
                request.status,
            ));
        }

        let now = Utc::now();
        let decided = match decision {
            ExtensionDecision::Reject => self.repository.extensions.reject(id, admin_note, now).await?,
            ExtensionDecision::Approve => {
                let record = self.repository.borrows.get_by_id(request.borrow_record_id).await?;
                if record.status != BorrowStatus::Borrowed {
                    return Err(AppError::state_conflict(
                        "Borrow record is no longer borrowed",
                        record.status,
                    ));
                }
                self.repository.extensions.approve(id, admin_note, now).await?
            }
        };

        let Some(decided) = decided else {
            let current = self.repository.extensions.get_by_id(id).await?;
            if current.status != ExtensionStatus::Pending {
                return Err(AppError::state_conflict(
                    "Extension request has already been decided",
                    current.status,
                ));
            }
            let record = self.repository.borrows.get_by_id(request.borrow_record_id).await?;
            return Err(AppError::state_conflict(
                "Borrow record is no longer borrowed",
                record.status,
            ));
        };

        tracing::info!(
            extension_id = id,
            borrow_id = decided.borrow_record_id,
            status = %decided.status,
            "Extension request decided"
        );

        if let Some(user) = lookup_user(&self.repository, decided.user_id).await {
            self.notifications.extension_decided(&user, &decided).await;
        }

        Ok(decided)
    }
}
