//! A failing hold promotion never undoes the return or cancellation before it

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use unilib_server::{
    config::LendingConfig,
    models::{
        book::CreateBook,
        enums::{BorrowStatus, HoldStatus},
        hold::BookHold,
        user::CreateUser,
    },
    repository::{holds::HoldsRepository, Repository},
    services::Services,
    AppError, AppResult,
};

use crate::common::Outbox;

/// Delegates to the in-memory store; `promote_next` fails while `down` is set
struct FlakyHolds {
    inner: Arc<dyn HoldsRepository>,
    down: Arc<AtomicBool>,
}

#[async_trait]
impl HoldsRepository for FlakyHolds {
    async fn get_by_id(&self, id: i32) -> AppResult<BookHold> {
        self.inner.get_by_id(id).await
    }

    async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<BookHold>> {
        self.inner.list_for_user(user_id).await
    }

    async fn list_queue(&self, book_id: i32) -> AppResult<Vec<BookHold>> {
        self.inner.list_queue(book_id).await
    }

    async fn find_active(&self, user_id: i32, book_id: i32) -> AppResult<Option<BookHold>> {
        self.inner.find_active(user_id, book_id).await
    }

    async fn count_ready(&self, book_id: i32) -> AppResult<i64> {
        self.inner.count_ready(book_id).await
    }

    async fn create(&self, user_id: i32, book_id: i32, at: DateTime<Utc>) -> AppResult<BookHold> {
        self.inner.create(user_id, book_id, at).await
    }

    async fn cancel(&self, id: i32) -> AppResult<Option<BookHold>> {
        self.inner.cancel(id).await
    }

    async fn fulfill(&self, id: i32) -> AppResult<Option<BookHold>> {
        self.inner.fulfill(id).await
    }

    async fn promote_next(
        &self,
        book_id: i32,
        now: DateTime<Utc>,
        expiry: DateTime<Utc>,
    ) -> AppResult<Option<BookHold>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::Internal("connection reset".to_string()));
        }
        self.inner.promote_next(book_id, now, expiry).await
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<BookHold>> {
        self.inner.list_expired(now).await
    }

    async fn expire(&self, id: i32, now: DateTime<Utc>) -> AppResult<Option<BookHold>> {
        self.inner.expire(id, now).await
    }

    async fn queue_position(&self, hold: &BookHold) -> AppResult<Option<i64>> {
        self.inner.queue_position(hold).await
    }
}

async fn approved(services: &Services, name: &str) -> i32 {
    let user = services
        .users
        .register(&CreateUser {
            email: format!("{}@university.example", name),
            name: name.to_string(),
            role: None,
        })
        .await
        .unwrap();
    services.users.approve(user.id).await.unwrap().id
}

#[tokio::test]
async fn test_failed_promotion_keeps_committed_changes() {
    let mut repository = Repository::in_memory();
    let down = Arc::new(AtomicBool::new(false));
    repository.holds = Arc::new(FlakyHolds {
        inner: repository.holds.clone(),
        down: down.clone(),
    });
    let services = Services::new(repository, LendingConfig::default(), Arc::new(Outbox::default()));

    let ada = approved(&services, "ada").await;
    let bob = approved(&services, "bob").await;
    let cyd = approved(&services, "cyd").await;
    let book = services
        .catalog
        .create_book(&CreateBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: None,
            total_copies: 1,
        })
        .await
        .unwrap();
    let record = services.borrows.borrow(book.id, ada).await.unwrap();
    let bob_hold = services.holds.place_hold(bob, book.id).await.unwrap();
    let cyd_hold = services.holds.place_hold(cyd, book.id).await.unwrap();

    down.store(true, Ordering::SeqCst);
    let returned = services
        .borrows
        .change_borrow_status(record.id, BorrowStatus::Returned)
        .await
        .unwrap();
    assert_eq!(returned.status, BorrowStatus::Returned);
    assert_eq!(services.catalog.get_book(book.id).await.unwrap().available_copies, 1);
    assert_eq!(
        services.holds.get_hold(bob_hold.hold.id).await.unwrap().status,
        HoldStatus::Waiting
    );

    down.store(false, Ordering::SeqCst);
    let promoted = services.holds.promote_next_hold(book.id).await.unwrap().unwrap();
    assert_eq!(promoted.id, bob_hold.hold.id);

    down.store(true, Ordering::SeqCst);
    let cancelled = services.holds.cancel_hold(bob_hold.hold.id).await.unwrap();
    assert_eq!(cancelled.status, HoldStatus::Cancelled);
    assert_eq!(
        services.holds.get_hold(cyd_hold.hold.id).await.unwrap().status,
        HoldStatus::Waiting
    );
}
