//! Shared fixtures: services over the in-memory store and a notifier that
//! records every message instead of sending it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use unilib_server::{
    config::LendingConfig,
    models::{
        book::{Book, CreateBook},
        enums::UserRole,
        user::{CreateUser, User},
    },
    repository::Repository,
    services::{notifications::Notifier, Services},
    AppResult,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub to: String,
    pub subject: String,
}

#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<Sent>>,
}

impl Outbox {
    pub fn subjects_for(&self, to: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.to == to)
            .map(|m| m.subject.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Notifier for Outbox {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> AppResult<()> {
        self.sent.lock().push(Sent {
            to: to.to_string(),
            subject: subject.to_string(),
        });
        Ok(())
    }
}

pub struct Harness {
    pub services: Services,
    pub outbox: Arc<Outbox>,
}

pub fn harness() -> Harness {
    harness_with(LendingConfig::default())
}

pub fn harness_with(lending: LendingConfig) -> Harness {
    let outbox = Arc::new(Outbox::default());
    let services = Services::new(Repository::in_memory(), lending, outbox.clone());
    Harness { services, outbox }
}

impl Harness {
    pub async fn member(&self, name: &str) -> User {
        let user = self
            .services
            .users
            .register(&CreateUser {
                email: format!("{}@university.example", name),
                name: name.to_string(),
                role: None,
            })
            .await
            .unwrap();
        self.services.users.approve(user.id).await.unwrap()
    }

    pub async fn admin(&self) -> User {
        let user = self
            .services
            .users
            .register(&CreateUser {
                email: "librarian@university.example".to_string(),
                name: "Librarian".to_string(),
                role: Some(UserRole::Admin),
            })
            .await
            .unwrap();
        self.services.users.approve(user.id).await.unwrap()
    }

    pub async fn book(&self, title: &str, copies: i32) -> Book {
        self.services
            .catalog
            .create_book(&CreateBook {
                title: title.to_string(),
                author: "Various".to_string(),
                isbn: None,
                total_copies: copies,
            })
            .await
            .unwrap()
    }
}
