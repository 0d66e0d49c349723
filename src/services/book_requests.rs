//! Acquisition requests for titles the library does not own

use chrono::Utc;

use super::{lookup_user, notifications::Notifications};
use crate::{
    error::{AppError, AppResult},
    models::{
        book_request::{BookRequest, CreateBookRequest},
        enums::BookRequestStatus,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct BookRequestsService {
    repository: Repository,
    notifications: Notifications,
}

impl BookRequestsService {
    pub fn new(repository: Repository, notifications: Notifications) -> Self {
        Self {
            repository,
            notifications,
        }
    }

    pub async fn list(
        &self,
        status: Option<BookRequestStatus>,
        user_id: Option<i32>,
    ) -> AppResult<Vec<BookRequest>> {
        self.repository.book_requests.list(status, user_id).await
    }

    pub async fn create(&self, user_id: i32, request: &CreateBookRequest) -> AppResult<BookRequest> {
        self.repository.users.get_by_id(user_id).await?;

        let created = self.repository.book_requests.create(user_id, request).await?;
        tracing::info!(book_request_id = created.id, user_id, title = %created.title, "Book requested");
        Ok(created)
    }

    /// PENDING -> APPROVED | REJECTED, APPROVED -> FULFILLED
    pub async fn decide(
        &self,
        id: i32,
        status: BookRequestStatus,
        admin_note: Option<&str>,
    ) -> AppResult<BookRequest> {
        let request = self.repository.book_requests.get_by_id(id).await?;
        if !request.status.can_transition_to(status) {
            return Err(AppError::state_conflict(
                format!("Book request cannot become {}", status),
                request.status,
            ));
        }

        let Some(decided) = self
            .repository
            .book_requests
            .decide(id, request.status, status, admin_note, Utc::now())
            .await?
        else {
            let current = self.repository.book_requests.get_by_id(id).await?;
            return Err(AppError::state_conflict(
                format!("Book request cannot become {}", status),
                current.status,
            ));
        };
        tracing::info!(book_request_id = id, from = %request.status, to = %status, "Book request decided");

        if let Some(user) = lookup_user(&self.repository, decided.user_id).await {
            self.notifications.book_request_decided(&user, &decided).await;
        }

        Ok(decided)
    }
}
