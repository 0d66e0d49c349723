//! In-memory storage backend.
//!
//! Every table lives in one [`MemoryState`] behind a single mutex, so each
//! repository call is atomic exactly like its PostgreSQL transaction.
//! Used by the test suite and for running the server without a database.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;

use super::{
    book_requests::BookRequestsRepository, books::BooksRepository, borrows::BorrowsRepository,
    extensions::ExtensionsRepository, fines::waived_description, fines::FinesRepository,
    holds::HoldsRepository, page_window, rooms::RoomsRepository, users::UsersRepository,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook},
        book_request::{BookRequest, CreateBookRequest},
        borrow::{BorrowQuery, BorrowRecord, NewBorrow},
        enums::{
            BookRequestStatus, BorrowStatus, ExtensionStatus, FineStatus, HoldStatus,
            RoomBookingStatus, UserRole, UserStatus,
        },
        extension::{ExtensionQuery, ExtensionRequest, NewExtension},
        fine::{Fine, FineQuery, NewFine, UnpaidFines},
        hold::BookHold,
        room::{CreateRoom, NewRoomBooking, Room, RoomBooking},
        user::{CreateUser, User, UserQuery},
    },
};

#[derive(Default)]
struct MemoryState {
    next_id: i32,
    users: Vec<User>,
    books: Vec<Book>,
    borrows: Vec<BorrowRecord>,
    fines: Vec<Fine>,
    holds: Vec<BookHold>,
    extensions: Vec<ExtensionRequest>,
    book_requests: Vec<BookRequest>,
    rooms: Vec<Room>,
    bookings: Vec<RoomBooking>,
}

impl MemoryState {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn book_mut(&mut self, id: i32) -> AppResult<&mut Book> {
        self.books
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    fn ready_holds(&self, book_id: i32, except_user: Option<i32>) -> i64 {
        self.holds
            .iter()
            .filter(|h| h.book_id == book_id && h.status == HoldStatus::Ready)
            .filter(|h| except_user.map_or(true, |u| h.user_id != u))
            .count() as i64
    }

    fn insert_fine(&mut self, fine: &NewFine) -> Fine {
        let fine = Fine {
            id: self.next_id(),
            user_id: fine.user_id,
            borrow_record_id: fine.borrow_record_id,
            amount: fine.amount,
            fine_type: fine.fine_type,
            status: FineStatus::Pending,
            description: fine.description.clone(),
            created_at: Utc::now(),
            paid_at: None,
            waived_at: None,
            waived_by: None,
        };
        self.fines.push(fine.clone());
        fine
    }
}

fn paginate<T>(rows: Vec<T>, page: Option<i64>, per_page: Option<i64>) -> (Vec<T>, i64) {
    let (limit, offset) = page_window(page, per_page);
    let total = rows.len() as i64;
    let rows = rows
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect();
    (rows, total)
}

/// Shared in-memory store implementing every repository trait
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UsersRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.state
            .lock()
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn create(&self, user: &CreateUser) -> AppResult<User> {
        let mut state = self.state.lock();
        let email = user.email.to_lowercase();
        if state.users.iter().any(|u| u.email == email) {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let user = User {
            id: state.next_id(),
            email,
            name: user.name.clone(),
            status: UserStatus::Pending,
            role: user.role.unwrap_or(UserRole::User),
            created_at: Utc::now(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn list(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        let state = self.state.lock();
        let search = query.search.as_ref().map(|s| s.to_lowercase());
        let mut users: Vec<User> = state
            .users
            .iter()
            .filter(|u| query.status.map_or(true, |s| u.status == s))
            .filter(|u| {
                search.as_ref().map_or(true, |s| {
                    u.name.to_lowercase().contains(s) || u.email.contains(s)
                })
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(paginate(users, query.page, query.per_page))
    }

    async fn first_admin(&self) -> AppResult<Option<User>> {
        Ok(self
            .state
            .lock()
            .users
            .iter()
            .filter(|u| u.role == UserRole::Admin && u.status == UserStatus::Approved)
            .min_by_key(|u| u.id)
            .cloned())
    }

    async fn transition_status(
        &self,
        id: i32,
        from: UserStatus,
        to: UserStatus,
    ) -> AppResult<Option<User>> {
        let mut state = self.state.lock();
        Ok(state
            .users
            .iter_mut()
            .find(|u| u.id == id && u.status == from)
            .map(|u| {
                u.status = to;
                u.clone()
            }))
    }
}

#[async_trait]
impl BooksRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        self.state.lock().book_mut(id).map(|b| b.clone())
    }

    async fn list(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let state = self.state.lock();
        let search = query.search.as_ref().map(|s| s.to_lowercase());
        let mut books: Vec<Book> = state
            .books
            .iter()
            .filter(|b| !query.available_only.unwrap_or(false) || b.available_copies > 0)
            .filter(|b| {
                search.as_ref().map_or(true, |s| {
                    b.title.to_lowercase().contains(s)
                        || b.author.to_lowercase().contains(s)
                        || b.isbn.as_deref().map_or(false, |i| i.contains(s.as_str()))
                })
            })
            .cloned()
            .collect();
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(paginate(books, query.page, query.per_page))
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let mut state = self.state.lock();
        let book = Book {
            id: state.next_id(),
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            total_copies: book.total_copies,
            available_copies: book.total_copies,
            created_at: Utc::now(),
        };
        state.books.push(book.clone());
        Ok(book)
    }

    async fn set_total_copies(&self, id: i32, total_copies: i32) -> AppResult<Option<Book>> {
        let mut state = self.state.lock();
        let reserved = state.ready_holds(id, None);
        let book = state.book_mut(id)?;
        let available = book.available_copies + (total_copies - book.total_copies);
        if i64::from(available) < reserved {
            return Ok(None);
        }
        book.available_copies = available;
        book.total_copies = total_copies;
        Ok(Some(book.clone()))
    }
}

#[async_trait]
impl BorrowsRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<BorrowRecord> {
        self.state
            .lock()
            .borrows
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Borrow record with id {} not found", id)))
    }

    async fn list(&self, query: &BorrowQuery) -> AppResult<(Vec<BorrowRecord>, i64)> {
        let state = self.state.lock();
        let mut records: Vec<BorrowRecord> = state
            .borrows
            .iter()
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .filter(|r| query.user_id.map_or(true, |u| r.user_id == u))
            .filter(|r| query.book_id.map_or(true, |b| r.book_id == b))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.borrow_date.cmp(&a.borrow_date).then(b.id.cmp(&a.id)));
        Ok(paginate(records, query.page, query.per_page))
    }

    async fn find_active(&self, user_id: i32, book_id: i32) -> AppResult<Option<BorrowRecord>> {
        Ok(self
            .state
            .lock()
            .borrows
            .iter()
            .find(|r| r.user_id == user_id && r.book_id == book_id && r.status.is_active())
            .cloned())
    }

    async fn count_overdue_or_lost(&self, user_id: i32) -> AppResult<i64> {
        Ok(self
            .state
            .lock()
            .borrows
            .iter()
            .filter(|r| r.user_id == user_id)
            .filter(|r| matches!(r.status, BorrowStatus::Overdue | BorrowStatus::Lost))
            .count() as i64)
    }

    async fn checkout(&self, borrow: &NewBorrow) -> AppResult<Option<BorrowRecord>> {
        let mut state = self.state.lock();

        let reserved_by_others = state.ready_holds(borrow.book_id, Some(borrow.user_id));
        let book = state.book_mut(borrow.book_id)?;
        if i64::from(book.available_copies) <= reserved_by_others {
            return Ok(None);
        }

        if state
            .borrows
            .iter()
            .any(|r| r.user_id == borrow.user_id && r.book_id == borrow.book_id && r.status.is_active())
        {
            return Err(AppError::Conflict("You have already borrowed this book".to_string()));
        }

        state.book_mut(borrow.book_id)?.available_copies -= 1;

        let record = BorrowRecord {
            id: state.next_id(),
            user_id: borrow.user_id,
            book_id: borrow.book_id,
            borrow_date: borrow.borrow_date,
            due_date: borrow.due_date,
            return_date: None,
            status: BorrowStatus::Borrowed,
            created_at: Utc::now(),
        };
        state.borrows.push(record.clone());

        for hold in state.holds.iter_mut().filter(|h| {
            h.user_id == borrow.user_id && h.book_id == borrow.book_id && h.status == HoldStatus::Ready
        }) {
            hold.status = HoldStatus::Fulfilled;
        }

        Ok(Some(record))
    }

    async fn check_in(&self, id: i32, return_date: NaiveDate) -> AppResult<Option<BorrowRecord>> {
        let mut state = self.state.lock();

        let Some(record) = state
            .borrows
            .iter_mut()
            .find(|r| r.id == id && r.status.is_active())
        else {
            return Ok(None);
        };
        record.status = BorrowStatus::Returned;
        record.return_date = Some(return_date);
        let record = record.clone();

        let book = state.book_mut(record.book_id)?;
        book.available_copies = (book.available_copies + 1).min(book.total_copies);

        Ok(Some(record))
    }

    async fn transition(
        &self,
        id: i32,
        from: BorrowStatus,
        to: BorrowStatus,
    ) -> AppResult<Option<BorrowRecord>> {
        let mut state = self.state.lock();
        Ok(state
            .borrows
            .iter_mut()
            .find(|r| r.id == id && r.status == from)
            .map(|r| {
                r.status = to;
                r.clone()
            }))
    }

    async fn transition_with_fine(
        &self,
        id: i32,
        from: &[BorrowStatus],
        to: BorrowStatus,
        fine: &NewFine,
    ) -> AppResult<Option<Fine>> {
        let mut state = self.state.lock();

        let Some(record) = state
            .borrows
            .iter_mut()
            .find(|r| r.id == id && from.contains(&r.status))
        else {
            return Ok(None);
        };
        record.status = to;

        Ok(Some(state.insert_fine(fine)))
    }

    async fn list_due_before(
        &self,
        statuses: &[BorrowStatus],
        date: NaiveDate,
    ) -> AppResult<Vec<BorrowRecord>> {
        let state = self.state.lock();
        let mut records: Vec<BorrowRecord> = state
            .borrows
            .iter()
            .filter(|r| statuses.contains(&r.status) && r.due_date < date)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));
        Ok(records)
    }
}

#[async_trait]
impl FinesRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<Fine> {
        self.state
            .lock()
            .fines
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", id)))
    }

    async fn list(&self, query: &FineQuery) -> AppResult<(Vec<Fine>, i64)> {
        let state = self.state.lock();
        let mut fines: Vec<Fine> = state
            .fines
            .iter()
            .filter(|f| query.status.map_or(true, |s| f.status == s))
            .filter(|f| query.user_id.map_or(true, |u| f.user_id == u))
            .cloned()
            .collect();
        fines.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(fines, query.page, query.per_page))
    }

    async fn create(&self, fine: &NewFine) -> AppResult<Fine> {
        Ok(self.state.lock().insert_fine(fine))
    }

    async fn unpaid_summary(&self, user_id: i32) -> AppResult<UnpaidFines> {
        let state = self.state.lock();
        let pending = state
            .fines
            .iter()
            .filter(|f| f.user_id == user_id && f.status == FineStatus::Pending);

        Ok(pending.fold(UnpaidFines::default(), |acc, f| UnpaidFines {
            count: acc.count + 1,
            total: acc.total + f.amount,
        }))
    }

    async fn mark_paid(&self, id: i32, at: DateTime<Utc>) -> AppResult<Option<Fine>> {
        let mut state = self.state.lock();
        Ok(state
            .fines
            .iter_mut()
            .find(|f| f.id == id && f.status == FineStatus::Pending)
            .map(|f| {
                f.status = FineStatus::Paid;
                f.paid_at = Some(at);
                f.clone()
            }))
    }

    async fn waive(
        &self,
        id: i32,
        admin_id: i32,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Fine>> {
        let mut state = self.state.lock();
        Ok(state
            .fines
            .iter_mut()
            .find(|f| f.id == id && f.status == FineStatus::Pending)
            .map(|f| {
                f.status = FineStatus::Waived;
                f.waived_at = Some(at);
                f.waived_by = Some(admin_id);
                f.description = Some(waived_description(f.description.as_deref(), reason));
                f.clone()
            }))
    }
}

#[async_trait]
impl HoldsRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<BookHold> {
        self.state
            .lock()
            .holds
            .iter()
            .find(|h| h.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Hold with id {} not found", id)))
    }

    async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<BookHold>> {
        let state = self.state.lock();
        let mut holds: Vec<BookHold> = state
            .holds
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        holds.sort_by(|a, b| b.request_date.cmp(&a.request_date).then(b.id.cmp(&a.id)));
        Ok(holds)
    }

    async fn list_queue(&self, book_id: i32) -> AppResult<Vec<BookHold>> {
        let state = self.state.lock();
        let mut holds: Vec<BookHold> = state
            .holds
            .iter()
            .filter(|h| h.book_id == book_id && h.status.is_active())
            .cloned()
            .collect();
        holds.sort_by(|a, b| a.request_date.cmp(&b.request_date).then(a.id.cmp(&b.id)));
        Ok(holds)
    }

    async fn find_active(&self, user_id: i32, book_id: i32) -> AppResult<Option<BookHold>> {
        Ok(self
            .state
            .lock()
            .holds
            .iter()
            .find(|h| h.user_id == user_id && h.book_id == book_id && h.status.is_active())
            .cloned())
    }

    async fn count_ready(&self, book_id: i32) -> AppResult<i64> {
        Ok(self.state.lock().ready_holds(book_id, None))
    }

    async fn create(&self, user_id: i32, book_id: i32, at: DateTime<Utc>) -> AppResult<BookHold> {
        let mut state = self.state.lock();
        if state
            .holds
            .iter()
            .any(|h| h.user_id == user_id && h.book_id == book_id && h.status.is_active())
        {
            return Err(AppError::Conflict(
                "You already have an active hold on this book".to_string(),
            ));
        }

        let hold = BookHold {
            id: state.next_id(),
            user_id,
            book_id,
            status: HoldStatus::Waiting,
            request_date: at,
            notification_date: None,
            expiry_date: None,
        };
        state.holds.push(hold.clone());
        Ok(hold)
    }

    async fn cancel(&self, id: i32) -> AppResult<Option<BookHold>> {
        let mut state = self.state.lock();
        Ok(state
            .holds
            .iter_mut()
            .find(|h| h.id == id && h.status.can_cancel())
            .map(|h| {
                h.status = HoldStatus::Cancelled;
                h.clone()
            }))
    }

    async fn fulfill(&self, id: i32) -> AppResult<Option<BookHold>> {
        let mut state = self.state.lock();
        Ok(state
            .holds
            .iter_mut()
            .find(|h| h.id == id && h.status == HoldStatus::Ready)
            .map(|h| {
                h.status = HoldStatus::Fulfilled;
                h.clone()
            }))
    }

    async fn promote_next(
        &self,
        book_id: i32,
        now: DateTime<Utc>,
        expiry: DateTime<Utc>,
    ) -> AppResult<Option<BookHold>> {
        let mut state = self.state.lock();

        let available = state.book_mut(book_id)?.available_copies;
        if i64::from(available) <= state.ready_holds(book_id, None) {
            return Ok(None);
        }

        let next = state
            .holds
            .iter_mut()
            .filter(|h| h.book_id == book_id && h.status == HoldStatus::Waiting)
            .min_by(|a, b| a.request_date.cmp(&b.request_date).then(a.id.cmp(&b.id)));

        Ok(next.map(|h| {
            h.status = HoldStatus::Ready;
            h.notification_date = Some(now);
            h.expiry_date = Some(expiry);
            h.clone()
        }))
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<BookHold>> {
        let state = self.state.lock();
        let mut holds: Vec<BookHold> = state
            .holds
            .iter()
            .filter(|h| h.status == HoldStatus::Ready && h.expiry_date.map_or(false, |e| e < now))
            .cloned()
            .collect();
        holds.sort_by(|a, b| a.expiry_date.cmp(&b.expiry_date).then(a.id.cmp(&b.id)));
        Ok(holds)
    }

    async fn expire(&self, id: i32, now: DateTime<Utc>) -> AppResult<Option<BookHold>> {
        let mut state = self.state.lock();
        Ok(state
            .holds
            .iter_mut()
            .find(|h| {
                h.id == id && h.status == HoldStatus::Ready && h.expiry_date.map_or(false, |e| e < now)
            })
            .map(|h| {
                h.status = HoldStatus::Expired;
                h.clone()
            }))
    }

    async fn queue_position(&self, hold: &BookHold) -> AppResult<Option<i64>> {
        if hold.status != HoldStatus::Waiting {
            return Ok(None);
        }

        let ahead = self
            .state
            .lock()
            .holds
            .iter()
            .filter(|h| h.book_id == hold.book_id && h.status == HoldStatus::Waiting)
            .filter(|h| (h.request_date, h.id) < (hold.request_date, hold.id))
            .count() as i64;

        Ok(Some(ahead + 1))
    }
}

#[async_trait]
impl ExtensionsRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<ExtensionRequest> {
        self.state
            .lock()
            .extensions
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Extension request with id {} not found", id)))
    }

    async fn list(&self, query: &ExtensionQuery) -> AppResult<Vec<ExtensionRequest>> {
        let state = self.state.lock();
        let mut requests: Vec<ExtensionRequest> = state
            .extensions
            .iter()
            .filter(|e| query.status.map_or(true, |s| e.status == s))
            .filter(|e| query.user_id.map_or(true, |u| e.user_id == u))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn find_pending(&self, borrow_record_id: i32) -> AppResult<Option<ExtensionRequest>> {
        Ok(self
            .state
            .lock()
            .extensions
            .iter()
            .find(|e| e.borrow_record_id == borrow_record_id && e.status == ExtensionStatus::Pending)
            .cloned())
    }

    async fn count_approved_since(&self, user_id: i32, since: DateTime<Utc>) -> AppResult<i64> {
        Ok(self
            .state
            .lock()
            .extensions
            .iter()
            .filter(|e| e.user_id == user_id && e.status == ExtensionStatus::Approved)
            .filter(|e| e.created_at >= since)
            .count() as i64)
    }

    async fn create(&self, request: &NewExtension) -> AppResult<ExtensionRequest> {
        let mut state = self.state.lock();
        if state.extensions.iter().any(|e| {
            e.borrow_record_id == request.borrow_record_id && e.status == ExtensionStatus::Pending
        }) {
            return Err(AppError::Conflict(
                "An extension request is already pending for this borrow".to_string(),
            ));
        }

        let request = ExtensionRequest {
            id: state.next_id(),
            user_id: request.user_id,
            borrow_record_id: request.borrow_record_id,
            current_due_date: request.current_due_date,
            requested_due_date: request.requested_due_date,
            reason: request.reason.clone(),
            status: ExtensionStatus::Pending,
            admin_note: None,
            created_at: request.created_at,
            decided_at: None,
        };
        state.extensions.push(request.clone());
        Ok(request)
    }

    async fn reject(
        &self,
        id: i32,
        admin_note: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<Option<ExtensionRequest>> {
        let mut state = self.state.lock();
        Ok(state
            .extensions
            .iter_mut()
            .find(|e| e.id == id && e.status == ExtensionStatus::Pending)
            .map(|e| {
                e.status = ExtensionStatus::Rejected;
                e.admin_note = admin_note.map(str::to_string);
                e.decided_at = Some(at);
                e.clone()
            }))
    }

    async fn approve(
        &self,
        id: i32,
        admin_note: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<Option<ExtensionRequest>> {
        let mut state = self.state.lock();

        let Some(index) = state
            .extensions
            .iter()
            .position(|e| e.id == id && e.status == ExtensionStatus::Pending)
        else {
            return Ok(None);
        };
        let borrow_id = state.extensions[index].borrow_record_id;
        let requested = state.extensions[index].requested_due_date;

        let Some(record) = state
            .borrows
            .iter_mut()
            .find(|r| r.id == borrow_id && r.status == BorrowStatus::Borrowed)
        else {
            return Ok(None);
        };
        record.due_date = requested;

        let request = &mut state.extensions[index];
        request.status = ExtensionStatus::Approved;
        request.admin_note = admin_note.map(str::to_string);
        request.decided_at = Some(at);
        Ok(Some(request.clone()))
    }
}

#[async_trait]
impl BookRequestsRepository for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<BookRequest> {
        self.state
            .lock()
            .book_requests
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book request with id {} not found", id)))
    }

    async fn list(
        &self,
        status: Option<BookRequestStatus>,
        user_id: Option<i32>,
    ) -> AppResult<Vec<BookRequest>> {
        let state = self.state.lock();
        let mut requests: Vec<BookRequest> = state
            .book_requests
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .filter(|r| user_id.map_or(true, |u| r.user_id == u))
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn create(&self, user_id: i32, request: &CreateBookRequest) -> AppResult<BookRequest> {
        let mut state = self.state.lock();
        let request = BookRequest {
            id: state.next_id(),
            user_id,
            title: request.title.clone(),
            author: request.author.clone(),
            isbn: request.isbn.clone(),
            reason: request.reason.clone(),
            status: BookRequestStatus::Pending,
            admin_note: None,
            created_at: Utc::now(),
            decided_at: None,
        };
        state.book_requests.push(request.clone());
        Ok(request)
    }

    async fn decide(
        &self,
        id: i32,
        from: BookRequestStatus,
        to: BookRequestStatus,
        admin_note: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<Option<BookRequest>> {
        let mut state = self.state.lock();
        Ok(state
            .book_requests
            .iter_mut()
            .find(|r| r.id == id && r.status == from)
            .map(|r| {
                r.status = to;
                if let Some(note) = admin_note {
                    r.admin_note = Some(note.to_string());
                }
                r.decided_at = Some(at);
                r.clone()
            }))
    }
}

#[async_trait]
impl RoomsRepository for MemoryStore {
    async fn list_rooms(&self) -> AppResult<Vec<Room>> {
        let mut rooms = self.state.lock().rooms.clone();
        rooms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(rooms)
    }

    async fn get_room(&self, id: i32) -> AppResult<Room> {
        self.state
            .lock()
            .rooms
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Room with id {} not found", id)))
    }

    async fn create_room(&self, room: &CreateRoom) -> AppResult<Room> {
        let mut state = self.state.lock();
        if state.rooms.iter().any(|r| r.name == room.name) {
            return Err(AppError::Conflict("A room with this name already exists".to_string()));
        }

        let room = Room {
            id: state.next_id(),
            name: room.name.clone(),
            capacity: room.capacity,
            location: room.location.clone(),
        };
        state.rooms.push(room.clone());
        Ok(room)
    }

    async fn get_booking(&self, id: i32) -> AppResult<RoomBooking> {
        self.state
            .lock()
            .bookings
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Room booking with id {} not found", id)))
    }

    async fn list_bookings_for_user(&self, user_id: i32) -> AppResult<Vec<RoomBooking>> {
        let state = self.state.lock();
        let mut bookings: Vec<RoomBooking> = state
            .bookings
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
        Ok(bookings)
    }

    async fn list_bookings_for_room(
        &self,
        room_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<RoomBooking>> {
        let state = self.state.lock();
        let mut bookings: Vec<RoomBooking> = state
            .bookings
            .iter()
            .filter(|b| b.room_id == room_id && b.overlaps(from, to))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(bookings)
    }

    async fn create_booking(&self, booking: &NewRoomBooking) -> AppResult<Option<RoomBooking>> {
        let mut state = self.state.lock();
        if !state.rooms.iter().any(|r| r.id == booking.room_id) {
            return Err(AppError::NotFound(format!("Room with id {} not found", booking.room_id)));
        }
        if state
            .bookings
            .iter()
            .any(|b| b.room_id == booking.room_id && b.overlaps(booking.start_time, booking.end_time))
        {
            return Ok(None);
        }

        let created = RoomBooking {
            id: state.next_id(),
            room_id: booking.room_id,
            user_id: booking.user_id,
            start_time: booking.start_time,
            end_time: booking.end_time,
            purpose: booking.purpose.clone(),
            status: RoomBookingStatus::Confirmed,
            created_at: Utc::now(),
        };
        state.bookings.push(created.clone());
        Ok(Some(created))
    }

    async fn cancel_booking(&self, id: i32) -> AppResult<Option<RoomBooking>> {
        let mut state = self.state.lock();
        Ok(state
            .bookings
            .iter_mut()
            .find(|b| b.id == id && b.status == RoomBookingStatus::Confirmed)
            .map(|b| {
                b.status = RoomBookingStatus::Cancelled;
                b.clone()
            }))
    }
}
