//! Lending lifecycle tests over the in-memory store

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use unilib_server::{
    config::LendingConfig,
    models::{
        book_request::CreateBookRequest,
        borrow::BorrowQuery,
        enums::{
            BookRequestStatus, BorrowStatus, ExtensionStatus, FineStatus, FineType, HoldStatus,
            UserRole, UserStatus,
        },
        extension::{CreateExtension, ExtensionDecision},
        fine::FineQuery,
        room::{CreateRoom, CreateRoomBooking},
        user::CreateUser,
    },
    AppError,
};

use crate::common::{harness, harness_with};

fn today() -> chrono::NaiveDate {
    Utc::now().date_naive()
}

// Borrow and return

#[tokio::test]
async fn test_borrow_and_return_restore_copies() {
    let h = harness();
    let ada = h.member("ada").await;
    let book = h.book("Dune", 2).await;

    let record = h.services.borrows.borrow(book.id, ada.id).await.unwrap();
    assert_eq!(record.status, BorrowStatus::Borrowed);
    assert_eq!(record.borrow_date, today());
    assert_eq!(record.due_date, today() + Duration::days(7));
    assert_eq!(h.services.catalog.get_book(book.id).await.unwrap().available_copies, 1);

    let returned = h
        .services
        .borrows
        .change_borrow_status(record.id, BorrowStatus::Returned)
        .await
        .unwrap();
    assert_eq!(returned.status, BorrowStatus::Returned);
    assert_eq!(returned.return_date, Some(today()));
    assert_eq!(h.services.catalog.get_book(book.id).await.unwrap().available_copies, 2);

    // Terminal records never move again
    let err = h
        .services
        .borrows
        .change_borrow_status(record.id, BorrowStatus::Borrowed)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StateConflict { .. }));
}

#[tokio::test]
async fn test_borrow_sends_confirmation_and_receipt() {
    let h = harness();
    let ada = h.member("ada").await;
    let book = h.book("Dune", 1).await;
    h.outbox.clear();

    h.services.borrows.borrow(book.id, ada.id).await.unwrap();

    assert_eq!(
        h.outbox.subjects_for(&ada.email),
        vec!["Borrow confirmation".to_string(), "Borrow receipt".to_string()]
    );
}

#[tokio::test]
async fn test_same_book_cannot_be_borrowed_twice() {
    let h = harness();
    let ada = h.member("ada").await;
    let book = h.book("Dune", 3).await;

    h.services.borrows.borrow(book.id, ada.id).await.unwrap();
    let err = h.services.borrows.borrow(book.id, ada.id).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(h.services.catalog.get_book(book.id).await.unwrap().available_copies, 2);
}

#[tokio::test]
async fn test_last_copy_goes_to_one_borrower() {
    let h = harness();
    let ada = h.member("ada").await;
    let bob = h.member("bob").await;
    let book = h.book("Dune", 1).await;

    h.services.borrows.borrow(book.id, ada.id).await.unwrap();
    let err = h.services.borrows.borrow(book.id, bob.id).await.unwrap_err();

    match err {
        AppError::BusinessRule(msg) => assert_eq!(msg, "Book is not available"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(h.services.catalog.get_book(book.id).await.unwrap().available_copies, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_borrows_of_last_copy() {
    let h = harness();
    let book = h.book("Dune", 1).await;
    let mut readers = Vec::new();
    for name in ["ada", "bob", "cyd", "dee", "eve", "fay", "gus", "hal"] {
        readers.push(h.member(name).await.id);
    }

    let book_id = book.id;
    let mut tasks = tokio::task::JoinSet::new();
    for user_id in readers {
        let borrows = h.services.borrows.clone();
        tasks.spawn(async move { borrows.borrow(book_id, user_id).await });
    }

    let mut granted = 0;
    while let Some(outcome) = tasks.join_next().await {
        match outcome.unwrap() {
            Ok(_) => granted += 1,
            Err(AppError::BusinessRule(msg)) => assert_eq!(msg, "Book is not available"),
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(granted, 1);
    assert_eq!(h.services.catalog.get_book(book.id).await.unwrap().available_copies, 0);
    let (records, total) = h
        .services
        .borrows
        .list_borrows(&BorrowQuery {
            book_id: Some(book.id),
            status: Some(BorrowStatus::Borrowed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_pending_account_cannot_borrow() {
    let h = harness();
    let book = h.book("Dune", 1).await;
    let pending = h
        .services
        .users
        .register(&CreateUser {
            email: "new@university.example".to_string(),
            name: "New".to_string(),
            role: None,
        })
        .await
        .unwrap();

    let err = h.services.borrows.borrow(book.id, pending.id).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));
}

// Fines and standing

#[tokio::test]
async fn test_overdue_sweep_is_idempotent() {
    let h = harness();
    let ada = h.member("ada").await;
    let book = h.book("Dune", 1).await;
    let record = h.services.borrows.borrow(book.id, ada.id).await.unwrap();

    // Due date itself is not late
    let report = h.services.fines.sweep_overdue_on(record.due_date).await.unwrap();
    assert_eq!(report.transitioned, 0);

    let later = record.due_date + Duration::days(3);
    let report = h.services.fines.sweep_overdue_on(later).await.unwrap();
    assert_eq!(report.transitioned, 1);
    assert_eq!(report.fines_created, 1);

    let report = h.services.fines.sweep_overdue_on(later).await.unwrap();
    assert_eq!(report.transitioned, 0);
    assert_eq!(report.fines_created, 0);

    let (fines, total) = h
        .services
        .fines
        .list_fines(&FineQuery {
            user_id: Some(ada.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(fines[0].fine_type, FineType::Overdue);
    assert_eq!(fines[0].amount, Decimal::from(15));
    assert_eq!(fines[0].status, FineStatus::Pending);

    let record = h.services.borrows.get_borrow(record.id).await.unwrap();
    assert_eq!(record.status, BorrowStatus::Overdue);
}

#[tokio::test]
async fn test_overdue_user_is_blocked_until_settled() {
    let h = harness();
    let ada = h.member("ada").await;
    let dune = h.book("Dune", 1).await;
    let emma = h.book("Emma", 1).await;
    let record = h.services.borrows.borrow(dune.id, ada.id).await.unwrap();

    h.services
        .fines
        .sweep_overdue_on(record.due_date + Duration::days(2))
        .await
        .unwrap();
    assert_eq!(h.services.users.get_user(ada.id).await.unwrap().status, UserStatus::Blocked);

    let eligibility = h.services.eligibility.check_eligibility(ada.id).await.unwrap();
    assert!(!eligibility.is_eligible);
    assert_eq!(eligibility.overdue_count, 1);
    assert_eq!(eligibility.unpaid_fine_count, 1);
    assert_eq!(eligibility.total_unpaid_fine_amount, Decimal::from(10));

    let err = h.services.borrows.borrow(emma.id, ada.id).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    // Returning alone leaves the fine unpaid
    h.services
        .borrows
        .change_borrow_status(record.id, BorrowStatus::Returned)
        .await
        .unwrap();
    assert_eq!(h.services.users.get_user(ada.id).await.unwrap().status, UserStatus::Blocked);

    let (fines, _) = h.services.fines.list_fines(&FineQuery::default()).await.unwrap();
    let paid = h.services.fines.mark_fine_paid(fines[0].id).await.unwrap();
    assert_eq!(paid.status, FineStatus::Paid);
    assert!(paid.paid_at.is_some());

    assert_eq!(h.services.users.get_user(ada.id).await.unwrap().status, UserStatus::Approved);
    h.services.borrows.borrow(emma.id, ada.id).await.unwrap();
}

#[tokio::test]
async fn test_lost_sweep_after_grace_period() {
    let h = harness();
    let ada = h.member("ada").await;
    let book = h.book("Dune", 1).await;
    let record = h.services.borrows.borrow(book.id, ada.id).await.unwrap();

    let report = h
        .services
        .fines
        .sweep_lost_books_on(record.due_date + Duration::days(42))
        .await
        .unwrap();
    assert_eq!(report.transitioned, 0);

    h.services
        .fines
        .sweep_overdue_on(record.due_date + Duration::days(1))
        .await
        .unwrap();
    let report = h
        .services
        .fines
        .sweep_lost_books_on(record.due_date + Duration::days(43))
        .await
        .unwrap();
    assert_eq!(report.transitioned, 1);

    let record = h.services.borrows.get_borrow(record.id).await.unwrap();
    assert_eq!(record.status, BorrowStatus::Lost);
    // Lost copies stay off the shelf
    assert_eq!(h.services.catalog.get_book(book.id).await.unwrap().available_copies, 0);

    let summary = h.services.fines.unpaid_summary(ada.id).await.unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.total, Decimal::from(1005));

    let err = h
        .services
        .borrows
        .change_borrow_status(record.id, BorrowStatus::Returned)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StateConflict { .. }));
}

#[tokio::test]
async fn test_waive_requires_reason_and_pending_fine() {
    let h = harness();
    let admin = h.admin().await;
    let ada = h.member("ada").await;
    let book = h.book("Dune", 1).await;
    let record = h.services.borrows.borrow(book.id, ada.id).await.unwrap();

    let fine = h
        .services
        .fines
        .assess_damage(record.id, Decimal::new(1250, 2), "Torn cover")
        .await
        .unwrap();
    assert_eq!(fine.fine_type, FineType::Damage);
    assert_eq!(h.services.users.get_user(ada.id).await.unwrap().status, UserStatus::Blocked);

    let err = h.services.fines.waive_fine(fine.id, admin.id, "  ").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let waived = h
        .services
        .fines
        .waive_fine(fine.id, admin.id, "Damage predates the loan")
        .await
        .unwrap();
    assert_eq!(waived.status, FineStatus::Waived);
    assert_eq!(waived.waived_by, Some(admin.id));
    assert!(waived
        .description
        .unwrap_or_default()
        .contains("Damage predates the loan"));
    assert_eq!(h.services.users.get_user(ada.id).await.unwrap().status, UserStatus::Approved);

    let err = h.services.fines.waive_fine(fine.id, admin.id, "again").await.unwrap_err();
    assert!(matches!(err, AppError::StateConflict { .. }));
    let err = h.services.fines.mark_fine_paid(fine.id).await.unwrap_err();
    assert!(matches!(err, AppError::StateConflict { .. }));
}

#[tokio::test]
async fn test_damage_amount_must_be_positive() {
    let h = harness();
    let ada = h.member("ada").await;
    let book = h.book("Dune", 1).await;
    let record = h.services.borrows.borrow(book.id, ada.id).await.unwrap();

    let err = h
        .services
        .fines
        .assess_damage(record.id, Decimal::ZERO, "Nothing")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

// Holds

#[tokio::test]
async fn test_hold_rejected_while_copies_are_free() {
    let h = harness();
    let ada = h.member("ada").await;
    let book = h.book("Dune", 1).await;

    let err = h.services.holds.place_hold(ada.id, book.id).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));
}

#[tokio::test]
async fn test_hold_queue_promotes_in_request_order() {
    let h = harness();
    let ada = h.member("ada").await;
    let bob = h.member("bob").await;
    let cyd = h.member("cyd").await;
    let dee = h.member("dee").await;
    let book = h.book("Dune", 1).await;
    let record = h.services.borrows.borrow(book.id, ada.id).await.unwrap();

    let bob_hold = h.services.holds.place_hold(bob.id, book.id).await.unwrap();
    let cyd_hold = h.services.holds.place_hold(cyd.id, book.id).await.unwrap();
    assert_eq!(bob_hold.queue_position, Some(1));
    assert_eq!(cyd_hold.queue_position, Some(2));

    let err = h.services.holds.place_hold(bob.id, book.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    let err = h.services.holds.place_hold(ada.id, book.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    h.outbox.clear();
    h.services
        .borrows
        .change_borrow_status(record.id, BorrowStatus::Returned)
        .await
        .unwrap();
    assert_eq!(h.services.catalog.get_book(book.id).await.unwrap().available_copies, 1);

    let ready = h.services.holds.get_hold(bob_hold.hold.id).await.unwrap();
    assert_eq!(ready.status, HoldStatus::Ready);
    let notified = ready.notification_date.unwrap();
    assert_eq!(ready.expiry_date, Some(notified + Duration::days(3)));
    assert_eq!(h.outbox.subjects_for(&bob.email), vec!["Book available for pickup".to_string()]);

    let queue = h.services.holds.book_queue(book.id).await.unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[1].hold.user_id, cyd.id);
    assert_eq!(queue[1].queue_position, Some(1));

    // The free copy is reserved for bob
    let err = h.services.borrows.borrow(book.id, dee.id).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    h.services.borrows.borrow(book.id, bob.id).await.unwrap();
    let fulfilled = h.services.holds.get_hold(bob_hold.hold.id).await.unwrap();
    assert_eq!(fulfilled.status, HoldStatus::Fulfilled);
    assert_eq!(h.services.catalog.get_book(book.id).await.unwrap().available_copies, 0);
}

#[tokio::test]
async fn test_expired_hold_passes_copy_to_next_waiter() {
    let h = harness();
    let ada = h.member("ada").await;
    let bob = h.member("bob").await;
    let cyd = h.member("cyd").await;
    let book = h.book("Dune", 1).await;
    let record = h.services.borrows.borrow(book.id, ada.id).await.unwrap();
    let bob_hold = h.services.holds.place_hold(bob.id, book.id).await.unwrap();
    let cyd_hold = h.services.holds.place_hold(cyd.id, book.id).await.unwrap();
    h.services
        .borrows
        .change_borrow_status(record.id, BorrowStatus::Returned)
        .await
        .unwrap();

    let report = h.services.holds.sweep_expired_holds_at(Utc::now()).await.unwrap();
    assert_eq!(report.transitioned, 0);

    let later = Utc::now() + Duration::days(4);
    let report = h.services.holds.sweep_expired_holds_at(later).await.unwrap();
    assert_eq!(report.transitioned, 1);
    assert_eq!(
        h.services.holds.get_hold(bob_hold.hold.id).await.unwrap().status,
        HoldStatus::Expired
    );
    let next = h.services.holds.get_hold(cyd_hold.hold.id).await.unwrap();
    assert_eq!(next.status, HoldStatus::Ready);
    assert_eq!(next.expiry_date, Some(later + Duration::days(3)));

    let report = h.services.holds.sweep_expired_holds_at(later).await.unwrap();
    assert_eq!(report.transitioned, 0);
}

#[tokio::test]
async fn test_expiring_several_holds_promotes_waiters_in_order() {
    let h = harness();
    let ada = h.member("ada").await;
    let eve = h.member("eve").await;
    let book = h.book("Dune", 2).await;
    let first = h.services.borrows.borrow(book.id, ada.id).await.unwrap();
    let second = h.services.borrows.borrow(book.id, eve.id).await.unwrap();

    let mut holds = Vec::new();
    for name in ["bob", "cyd", "dan", "fay", "gus"] {
        let member = h.member(name).await;
        holds.push(h.services.holds.place_hold(member.id, book.id).await.unwrap().hold.id);
    }
    for record in [first.id, second.id] {
        h.services
            .borrows
            .change_borrow_status(record, BorrowStatus::Returned)
            .await
            .unwrap();
    }

    let later = Utc::now() + Duration::days(4);
    let report = h.services.holds.sweep_expired_holds_at(later).await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.transitioned, 2);

    let mut statuses = Vec::new();
    for id in &holds {
        statuses.push(h.services.holds.get_hold(*id).await.unwrap().status);
    }
    assert_eq!(
        statuses,
        vec![
            HoldStatus::Expired,
            HoldStatus::Expired,
            HoldStatus::Ready,
            HoldStatus::Ready,
            HoldStatus::Waiting,
        ]
    );

    let queue = h.services.holds.book_queue(book.id).await.unwrap();
    assert_eq!(queue.len(), 3);
    assert_eq!(queue[2].hold.id, holds[4]);
    assert_eq!(queue[2].queue_position, Some(1));
    assert_eq!(h.services.catalog.get_book(book.id).await.unwrap().available_copies, 2);

    let report = h.services.holds.sweep_expired_holds_at(later).await.unwrap();
    assert_eq!(report.transitioned, 0);
}

#[tokio::test]
async fn test_cancelling_ready_hold_promotes_next() {
    let h = harness();
    let ada = h.member("ada").await;
    let bob = h.member("bob").await;
    let cyd = h.member("cyd").await;
    let book = h.book("Dune", 1).await;
    let record = h.services.borrows.borrow(book.id, ada.id).await.unwrap();
    let bob_hold = h.services.holds.place_hold(bob.id, book.id).await.unwrap();
    let cyd_hold = h.services.holds.place_hold(cyd.id, book.id).await.unwrap();
    h.services
        .borrows
        .change_borrow_status(record.id, BorrowStatus::Returned)
        .await
        .unwrap();

    let err = h.services.holds.fulfill_hold(cyd_hold.hold.id).await.unwrap_err();
    assert!(matches!(err, AppError::StateConflict { .. }));

    let cancelled = h.services.holds.cancel_hold(bob_hold.hold.id).await.unwrap();
    assert_eq!(cancelled.status, HoldStatus::Cancelled);
    assert_eq!(
        h.services.holds.get_hold(cyd_hold.hold.id).await.unwrap().status,
        HoldStatus::Ready
    );

    let err = h.services.holds.cancel_hold(bob_hold.hold.id).await.unwrap_err();
    assert!(matches!(err, AppError::StateConflict { .. }));

    let fulfilled = h.services.holds.fulfill_hold(cyd_hold.hold.id).await.unwrap();
    assert_eq!(fulfilled.status, HoldStatus::Fulfilled);
}

#[tokio::test]
async fn test_adding_copies_serves_waiting_holds() {
    let h = harness();
    let ada = h.member("ada").await;
    let bob = h.member("bob").await;
    let book = h.book("Dune", 1).await;
    h.services.borrows.borrow(book.id, ada.id).await.unwrap();
    let hold = h.services.holds.place_hold(bob.id, book.id).await.unwrap();

    let err = h.services.catalog.set_total_copies(book.id, 0).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    let updated = h.services.catalog.set_total_copies(book.id, 2).await.unwrap();
    assert_eq!(updated.total_copies, 2);
    assert_eq!(updated.available_copies, 1);
    assert_eq!(
        h.services.holds.get_hold(hold.hold.id).await.unwrap().status,
        HoldStatus::Ready
    );
}

#[tokio::test]
async fn test_reserved_copy_cannot_be_removed() {
    let h = harness();
    let ada = h.member("ada").await;
    let bob = h.member("bob").await;
    let book = h.book("Dune", 1).await;
    let record = h.services.borrows.borrow(book.id, ada.id).await.unwrap();
    let hold = h.services.holds.place_hold(bob.id, book.id).await.unwrap();
    h.services
        .borrows
        .change_borrow_status(record.id, BorrowStatus::Returned)
        .await
        .unwrap();
    assert_eq!(
        h.services.holds.get_hold(hold.hold.id).await.unwrap().status,
        HoldStatus::Ready
    );

    let err = h.services.catalog.set_total_copies(book.id, 0).await.unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));
    let unchanged = h.services.catalog.get_book(book.id).await.unwrap();
    assert_eq!(unchanged.total_copies, 1);
    assert_eq!(unchanged.available_copies, 1);

    h.services.borrows.borrow(book.id, bob.id).await.unwrap();
    assert_eq!(
        h.services.holds.get_hold(hold.hold.id).await.unwrap().status,
        HoldStatus::Fulfilled
    );
}

// Extensions

#[tokio::test]
async fn test_extension_approval_moves_due_date() {
    let h = harness();
    let admin = h.admin().await;
    let ada = h.member("ada").await;
    let book = h.book("Dune", 1).await;
    let record = h.services.borrows.borrow(book.id, ada.id).await.unwrap();

    let err = h
        .services
        .extensions
        .create_extension_request(
            ada.id,
            &CreateExtension {
                borrow_record_id: record.id,
                requested_due_date: record.due_date,
                reason: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    h.outbox.clear();
    let requested_due_date = record.due_date + Duration::days(7);
    let request = h
        .services
        .extensions
        .create_extension_request(
            ada.id,
            &CreateExtension {
                borrow_record_id: record.id,
                requested_due_date,
                reason: Some("Thesis deadline".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(request.status, ExtensionStatus::Pending);
    assert_eq!(request.current_due_date, record.due_date);
    assert_eq!(h.outbox.subjects_for(&admin.email), vec!["New extension request".to_string()]);

    let err = h
        .services
        .extensions
        .create_extension_request(
            ada.id,
            &CreateExtension {
                borrow_record_id: record.id,
                requested_due_date: requested_due_date + Duration::days(1),
                reason: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let decided = h
        .services
        .extensions
        .decide_extension_request(request.id, ExtensionDecision::Approve, Some("Granted"))
        .await
        .unwrap();
    assert_eq!(decided.status, ExtensionStatus::Approved);
    assert!(decided.decided_at.is_some());
    assert_eq!(
        h.services.borrows.get_borrow(record.id).await.unwrap().due_date,
        requested_due_date
    );

    let err = h
        .services
        .extensions
        .decide_extension_request(request.id, ExtensionDecision::Reject, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StateConflict { .. }));
}

#[tokio::test]
async fn test_extension_notice_goes_to_approved_admin_only() {
    let h = harness();
    let rejected = h
        .services
        .users
        .register(&CreateUser {
            email: "former@university.example".to_string(),
            name: "Former".to_string(),
            role: Some(UserRole::Admin),
        })
        .await
        .unwrap();
    h.services.users.reject(rejected.id).await.unwrap();
    let admin = h.admin().await;
    let ada = h.member("ada").await;
    let book = h.book("Dune", 1).await;
    let record = h.services.borrows.borrow(book.id, ada.id).await.unwrap();
    h.outbox.clear();

    h.services
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

    assert!(h.outbox.subjects_for(&rejected.email).is_empty());
    assert_eq!(h.outbox.subjects_for(&admin.email), vec!["New extension request".to_string()]);
}

#[tokio::test]
async fn test_extension_only_for_own_borrowed_records() {
    let h = harness();
    let ada = h.member("ada").await;
    let bob = h.member("bob").await;
    let book = h.book("Dune", 1).await;
    let record = h.services.borrows.borrow(book.id, ada.id).await.unwrap();
    let body = CreateExtension {
        borrow_record_id: record.id,
        requested_due_date: record.due_date + Duration::days(3),
        reason: None,
    };

    let err = h
        .services
        .extensions
        .create_extension_request(bob.id, &body)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BusinessRule(_)));

    let request = h
        .services
        .extensions
        .create_extension_request(ada.id, &body)
        .await
        .unwrap();

    // Went overdue while the request was pending
    h.services
        .fines
        .sweep_overdue_on(record.due_date + Duration::days(1))
        .await
        .unwrap();
    let err = h
        .services
        .extensions
        .decide_extension_request(request.id, ExtensionDecision::Approve, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StateConflict { .. }));
    assert_eq!(
        h.services.borrows.get_borrow(record.id).await.unwrap().due_date,
        record.due_date
    );

    let rejected = h
        .services
        .extensions
        .decide_extension_request(request.id, ExtensionDecision::Reject, Some("Overdue"))
        .await
        .unwrap();
    assert_eq!(rejected.status, ExtensionStatus::Rejected);
}

#[tokio::test]
async fn test_monthly_extension_quota() {
    let h = harness();
    let ada = h.member("ada").await;

    let mut records = Vec::new();
    for title in ["Dune", "Emma", "Ulysses"] {
        let book = h.book(title, 1).await;
        records.push(h.services.borrows.borrow(book.id, ada.id).await.unwrap());
    }
    let ask = |index: usize| CreateExtension {
        borrow_record_id: records[index].id,
        requested_due_date: records[index].due_date + Duration::days(7),
        reason: None,
    };

    for index in 0..2 {
        let request = h
            .services
            .extensions
            .create_extension_request(ada.id, &ask(index))
            .await
            .unwrap();
        h.services
            .extensions
            .decide_extension_request(request.id, ExtensionDecision::Approve, None)
            .await
            .unwrap();
    }

    let err = h
        .services
        .extensions
        .create_extension_request(ada.id, &ask(2))
        .await
        .unwrap_err();
    match err {
        AppError::BusinessRule(msg) => assert!(msg.starts_with("Monthly extension limit reached")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_rejected_extensions_do_not_use_quota() {
    let h = harness_with(LendingConfig {
        max_approved_extensions_per_month: 1,
        ..LendingConfig::default()
    });
    let ada = h.member("ada").await;
    let book = h.book("Dune", 1).await;
    let record = h.services.borrows.borrow(book.id, ada.id).await.unwrap();
    let body = CreateExtension {
        borrow_record_id: record.id,
        requested_due_date: record.due_date + Duration::days(7),
        reason: None,
    };

    let first = h
        .services
        .extensions
        .create_extension_request(ada.id, &body)
        .await
        .unwrap();
    h.services
        .extensions
        .decide_extension_request(first.id, ExtensionDecision::Reject, None)
        .await
        .unwrap();

    let second = h
        .services
        .extensions
        .create_extension_request(ada.id, &body)
        .await
        .unwrap();
    assert_eq!(second.status, ExtensionStatus::Pending);
}

// Accounts, acquisitions and rooms

#[tokio::test]
async fn test_account_decisions_happen_once() {
    let h = harness();
    let ada = h.member("ada").await;

    let err = h
        .services
        .users
        .register(&CreateUser {
            email: "ADA@university.example".to_string(),
            name: "Ada again".to_string(),
            role: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = h.services.users.reject(ada.id).await.unwrap_err();
    match err {
        AppError::StateConflict { current_status, .. } => assert_eq!(current_status, "APPROVED"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_book_request_lifecycle() {
    let h = harness();
    let ada = h.member("ada").await;

    let request = h
        .services
        .book_requests
        .create(
            ada.id,
            &CreateBookRequest {
                title: "Gödel, Escher, Bach".to_string(),
                author: Some("Douglas Hofstadter".to_string()),
                isbn: None,
                reason: Some("Course reading".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(request.status, BookRequestStatus::Pending);

    let err = h
        .services
        .book_requests
        .decide(request.id, BookRequestStatus::Fulfilled, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StateConflict { .. }));

    h.services
        .book_requests
        .decide(request.id, BookRequestStatus::Approved, Some("Ordered"))
        .await
        .unwrap();
    let fulfilled = h
        .services
        .book_requests
        .decide(request.id, BookRequestStatus::Fulfilled, None)
        .await
        .unwrap();
    assert_eq!(fulfilled.status, BookRequestStatus::Fulfilled);

    let mine = h
        .services
        .book_requests
        .list(None, Some(ada.id))
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
async fn test_room_bookings_do_not_overlap() {
    let h = harness();
    let ada = h.member("ada").await;
    let bob = h.member("bob").await;
    let room = h
        .services
        .rooms
        .create_room(&CreateRoom {
            name: "Study Room A".to_string(),
            capacity: 6,
            location: Some("Level 2".to_string()),
        })
        .await
        .unwrap();

    let start = Utc::now() + Duration::days(1);
    let slot = |from: i64, to: i64| CreateRoomBooking {
        start_time: start + Duration::hours(from),
        end_time: start + Duration::hours(to),
        purpose: None,
    };

    let booking = h.services.rooms.book_room(ada.id, room.id, &slot(0, 2)).await.unwrap();

    let err = h.services.rooms.book_room(bob.id, room.id, &slot(1, 3)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Back-to-back is fine
    h.services.rooms.book_room(bob.id, room.id, &slot(2, 4)).await.unwrap();

    let err = h.services.rooms.book_room(bob.id, room.id, &slot(5, 10)).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let err = h.services.rooms.book_room(bob.id, room.id, &slot(3, 3)).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    h.services.rooms.cancel_booking(booking.id).await.unwrap();
    let err = h.services.rooms.cancel_booking(booking.id).await.unwrap_err();
    assert!(matches!(err, AppError::StateConflict { .. }));
    h.services.rooms.book_room(bob.id, room.id, &slot(0, 2)).await.unwrap();

    let schedule = h
        .services
        .rooms
        .room_schedule(room.id, start, start + Duration::hours(8))
        .await
        .unwrap();
    assert_eq!(schedule.len(), 2);
}

#[tokio::test]
async fn test_borrow_listing_filters() {
    let h = harness();
    let ada = h.member("ada").await;
    let bob = h.member("bob").await;
    let book = h.book("Dune", 2).await;
    h.services.borrows.borrow(book.id, ada.id).await.unwrap();
    h.services.borrows.borrow(book.id, bob.id).await.unwrap();

    let (records, total) = h
        .services
        .borrows
        .list_borrows(&BorrowQuery {
            user_id: Some(bob.id),
            status: Some(BorrowStatus::Borrowed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(records[0].user_id, bob.id);
}
