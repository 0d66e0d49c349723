//! Account registration and approval

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::UserStatus,
        user::{CreateUser, User, UserQuery},
    },
    repository::Repository,
};

use super::notifications::Notifications;

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    notifications: Notifications,
}

impl UsersService {
    pub fn new(repository: Repository, notifications: Notifications) -> Self {
        Self {
            repository,
            notifications,
        }
    }

    /// Register a new account; it stays PENDING until an admin decides
    pub async fn register(&self, user: &CreateUser) -> AppResult<User> {
        let created = self.repository.users.create(user).await?;
        tracing::info!(user_id = created.id, email = %created.email, "User registered");
        Ok(created)
    }

    pub async fn get_user(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    pub async fn list_users(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        self.repository.users.list(query).await
    }

    pub async fn approve(&self, id: i32) -> AppResult<User> {
        self.decide(id, UserStatus::Approved).await
    }

    pub async fn reject(&self, id: i32) -> AppResult<User> {
        self.decide(id, UserStatus::Rejected).await
    }

    async fn decide(&self, id: i32, status: UserStatus) -> AppResult<User> {
        let Some(user) = self
            .repository
            .users
            .transition_status(id, UserStatus::Pending, status)
            .await?
        else {
            let current = self.repository.users.get_by_id(id).await?;
            return Err(AppError::state_conflict(
                "Only pending accounts can be approved or rejected",
                current.status,
            ));
        };
        tracing::info!(user_id = id, status = %status, "Account decided");

        self.notifications.account_decided(&user).await;
        Ok(user)
    }
}
