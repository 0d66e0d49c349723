//! Lending flows against PostgreSQL. Needs DATABASE_URL pointing at a server
//! where test databases may be created.

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;
use sqlx::PgPool;

use unilib_server::{
    config::LendingConfig,
    models::{
        book::{Book, CreateBook},
        enums::{BorrowStatus, HoldStatus, UserRole},
        extension::CreateExtension,
        user::{CreateUser, User},
    },
    repository::Repository,
    services::Services,
    AppError,
};

use crate::common::Outbox;

fn services(pool: PgPool) -> (Services, Arc<Outbox>) {
    let outbox = Arc::new(Outbox::default());
    let services = Services::new(Repository::postgres(pool), LendingConfig::default(), outbox.clone());
    (services, outbox)
}

async fn account(services: &Services, name: &str, role: Option<UserRole>) -> User {
    let user = services
        .users
        .register(&CreateUser {
            email: format!("{}@university.example", name),
            name: name.to_string(),
            role,
        })
        .await
        .unwrap();
    services.users.approve(user.id).await.unwrap()
}

async fn book(services: &Services, copies: i32) -> Book {
    services
        .catalog
        .create_book(&CreateBook {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: None,
            total_copies: copies,
        })
        .await
        .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore] // Run with: cargo test -- --ignored
async fn test_pg_hold_queue_and_reserved_copy(pool: PgPool) {
    let (services, _) = services(pool);
    let ada = account(&services, "ada", None).await;
    let bob = account(&services, "bob", None).await;
    let cyd = account(&services, "cyd", None).await;
    let book = book(&services, 1).await;

    let record = services.borrows.borrow(book.id, ada.id).await.unwrap();
    let err = services.borrows.borrow(book.id, ada.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let bob_hold = services.holds.place_hold(bob.id, book.id).await.unwrap();
    let cyd_hold = services.holds.place_hold(cyd.id, book.id).await.unwrap();
    assert_eq!(bob_hold.queue_position, Some(1));
    assert_eq!(cyd_hold.queue_position, Some(2));

    services
        .borrows
        .change_borrow_status(record.id, BorrowStatus::Returned)
        .await
        .unwrap();
    assert_eq!(
        services.holds.get_hold(bob_hold.hold.id).await.unwrap().status,
        HoldStatus::Ready
    );
    let queue = services.holds.book_queue(book.id).await.unwrap();
    assert_eq!(queue[1].queue_position, Some(1));

    let err = services.catalog.set_total_copies(book.id, 0).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));
    let err = services.borrows.borrow(book.id, cyd.id).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    services.borrows.borrow(book.id, bob.id).await.unwrap();
    assert_eq!(
        services.holds.get_hold(bob_hold.hold.id).await.unwrap().status,
        HoldStatus::Fulfilled
    );
    assert_eq!(services.catalog.get_book(book.id).await.unwrap().available_copies, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_pg_concurrent_borrows_of_last_copy(pool: PgPool) {
    let (services, _) = services(pool);
    let book = book(&services, 1).await;
    let mut readers = Vec::new();
    for name in ["ada", "bob", "cyd", "dee"] {
        readers.push(account(&services, name, None).await.id);
    }

    let book_id = book.id;
    let mut tasks = tokio::task::JoinSet::new();
    for user_id in readers {
        let borrows = services.borrows.clone();
        tasks.spawn(async move { borrows.borrow(book_id, user_id).await });
    }

    let mut granted = 0;
    while let Some(outcome) = tasks.join_next().await {
        if outcome.unwrap().is_ok() {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);
    assert_eq!(services.catalog.get_book(book_id).await.unwrap().available_copies, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_pg_overdue_then_lost(pool: PgPool) {
    let (services, _) = services(pool);
    let ada = account(&services, "ada", None).await;
    let book = book(&services, 1).await;
    let record = services.borrows.borrow(book.id, ada.id).await.unwrap();

    let report = services
        .fines
        .sweep_overdue_on(record.due_date + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(report.transitioned, 1);
    let report = services
        .fines
        .sweep_lost_books_on(record.due_date + Duration::days(43))
        .await
        .unwrap();
    assert_eq!(report.transitioned, 1);

    let record = services.borrows.get_borrow(record.id).await.unwrap();
    assert_eq!(record.status, BorrowStatus::Lost);
    let summary = services.fines.unpaid_summary(ada.id).await.unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.total, Decimal::from(1005));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_pg_extension_notice_skips_rejected_admin(pool: PgPool) {
    let (services, outbox) = services(pool);
    let former = services
        .users
        .register(&CreateUser {
            email: "former@university.example".to_string(),
            name: "Former".to_string(),
            role: Some(UserRole::Admin),
        })
        .await
        .unwrap();
    services.users.reject(former.id).await.unwrap();
    let admin = account(&services, "librarian", Some(UserRole::Admin)).await;
    let ada = account(&services, "ada", None).await;
    let book = book(&services, 1).await;
    let record = services.borrows.borrow(book.id, ada.id).await.unwrap();
    outbox.clear();

    services
        .extensions
        .create_extension_request(
            ada.id,
            &CreateExtension {
                borrow_record_id: record.id,
                requested_due_date: record.due_date + Duration::days(7),
                reason: None,
            },
        )
        .await
        .unwrap();

    assert!(outbox.subjects_for(&former.email).is_empty());
    assert_eq!(outbox.subjects_for(&admin.email), vec!["New extension request".to_string()]);
}
