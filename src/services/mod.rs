//! Business logic services

pub mod book_requests;
pub mod borrows;
pub mod catalog;
pub mod eligibility;
pub mod extensions;
pub mod fines;
pub mod holds;
pub mod notifications;
pub mod rooms;
pub mod scheduler;
pub mod users;

use std::sync::Arc;

use crate::{
    config::LendingConfig,
    models::{book::Book, user::User},
    repository::Repository,
};

use self::notifications::{Notifications, Notifier};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub eligibility: eligibility::EligibilityService,
    pub borrows: borrows::BorrowsService,
    pub fines: fines::FinesService,
    pub holds: holds::HoldsService,
    pub extensions: extensions::ExtensionsService,
    pub book_requests: book_requests::BookRequestsService,
    pub rooms: rooms::RoomsService,
}

impl Services {
    /// Create all services over one repository and one notification sink
    pub fn new(repository: Repository, lending: LendingConfig, notifier: Arc<dyn Notifier>) -> Self {
        let notifications = Notifications::new(notifier);
        let eligibility = eligibility::EligibilityService::new(repository.clone());
        let holds = holds::HoldsService::new(repository.clone(), lending.clone(), notifications.clone());

        Self {
            users: users::UsersService::new(repository.clone(), notifications.clone()),
            catalog: catalog::CatalogService::new(repository.clone(), holds.clone()),
            borrows: borrows::BorrowsService::new(
                repository.clone(),
                lending.clone(),
                eligibility.clone(),
                holds.clone(),
                notifications.clone(),
            ),
            fines: fines::FinesService::new(
                repository.clone(),
                lending.clone(),
                eligibility.clone(),
                notifications.clone(),
            ),
            extensions: extensions::ExtensionsService::new(
                repository.clone(),
                lending,
                notifications.clone(),
            ),
            book_requests: book_requests::BookRequestsService::new(repository.clone(), notifications.clone()),
            rooms: rooms::RoomsService::new(repository, notifications),
            eligibility,
            holds,
        }
    }
}

/// Recipient lookup for a notification sent after a committed change
pub(crate) async fn lookup_user(repository: &Repository, user_id: i32) -> Option<User> {
    match repository.users.get_by_id(user_id).await {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::warn!(user_id, error = %e, "Cannot load notification recipient");
            None
        }
    }
}

pub(crate) async fn lookup_user_and_book(
    repository: &Repository,
    user_id: i32,
    book_id: i32,
) -> Option<(User, Book)> {
    let user = lookup_user(repository, user_id).await?;
    match repository.books.get_by_id(book_id).await {
        Ok(book) => Some((user, book)),
        Err(e) => {
            tracing::warn!(book_id, error = %e, "Cannot load book for notification");
            None
        }
    }
}
