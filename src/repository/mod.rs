//! Repository layer for database operations

pub mod book_requests;
pub mod books;
pub mod borrows;
pub mod extensions;
pub mod fines;
pub mod holds;
pub mod memory;
pub mod rooms;
pub mod users;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

use self::{
    book_requests::{BookRequestsRepository, PgBookRequestsRepository},
    books::{BooksRepository, PgBooksRepository},
    borrows::{BorrowsRepository, PgBorrowsRepository},
    extensions::{ExtensionsRepository, PgExtensionsRepository},
    fines::{FinesRepository, PgFinesRepository},
    holds::{HoldsRepository, PgHoldsRepository},
    memory::MemoryStore,
    rooms::{PgRoomsRepository, RoomsRepository},
    users::{PgUsersRepository, UsersRepository},
};

const DEFAULT_PER_PAGE: i64 = 50;
const MAX_PER_PAGE: i64 = 200;

/// Turn optional page parameters into `(limit, offset)`
pub(crate) fn page_window(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    (per_page, (page - 1) * per_page)
}

/// Main repository struct holding one handle per table group
#[derive(Clone)]
pub struct Repository {
    pub users: Arc<dyn UsersRepository>,
    pub books: Arc<dyn BooksRepository>,
    pub borrows: Arc<dyn BorrowsRepository>,
    pub fines: Arc<dyn FinesRepository>,
    pub holds: Arc<dyn HoldsRepository>,
    pub extensions: Arc<dyn ExtensionsRepository>,
    pub book_requests: Arc<dyn BookRequestsRepository>,
    pub rooms: Arc<dyn RoomsRepository>,
}

impl Repository {
    /// Create a repository backed by PostgreSQL
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            users: Arc::new(PgUsersRepository::new(pool.clone())),
            books: Arc::new(PgBooksRepository::new(pool.clone())),
            borrows: Arc::new(PgBorrowsRepository::new(pool.clone())),
            fines: Arc::new(PgFinesRepository::new(pool.clone())),
            holds: Arc::new(PgHoldsRepository::new(pool.clone())),
            extensions: Arc::new(PgExtensionsRepository::new(pool.clone())),
            book_requests: Arc::new(PgBookRequestsRepository::new(pool.clone())),
            rooms: Arc::new(PgRoomsRepository::new(pool)),
        }
    }

    /// Create a repository where every table lives in one shared in-memory store
    pub fn in_memory() -> Self {
        let store = MemoryStore::new();
        Self {
            users: Arc::new(store.clone()),
            books: Arc::new(store.clone()),
            borrows: Arc::new(store.clone()),
            fines: Arc::new(store.clone()),
            holds: Arc::new(store.clone()),
            extensions: Arc::new(store.clone()),
            book_requests: Arc::new(store.clone()),
            rooms: Arc::new(store),
        }
    }
}
