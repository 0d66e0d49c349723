//! Books (catalog) repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::page_window;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookQuery, CreateBook},
        enums::HoldStatus,
    },
};

#[async_trait]
pub trait BooksRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Book>;

    async fn list(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)>;

    /// Insert a book with every copy available
    async fn create(&self, book: &CreateBook) -> AppResult<Book>;

    /// Change the owned copies, shifting `available_copies` by the same delta.
    /// Returns None when that would leave fewer available copies than READY
    /// holds reserve.
    async fn set_total_copies(&self, id: i32, total_copies: i32) -> AppResult<Option<Book>>;
}

#[derive(Clone)]
pub struct PgBooksRepository {
    pool: Pool<Postgres>,
}

impl PgBooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BooksRepository for PgBooksRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn list(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let (limit, offset) = page_window(query.page, query.per_page);

        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(ref search) = query.search {
            params.push(format!("%{}%", search.to_lowercase()));
            conditions.push(format!(
                "(LOWER(title) LIKE ${n} OR LOWER(author) LIKE ${n} OR isbn LIKE ${n})",
                n = params.len()
            ));
        }

        if query.available_only.unwrap_or(false) {
            conditions.push("available_copies > 0".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM books {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM books {} ORDER BY title, id LIMIT {} OFFSET {}",
            where_clause, limit, offset
        );
        let mut select_builder = sqlx::query_as::<_, Book>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let books = select_builder.fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, total_copies, available_copies)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.total_copies)
        .fetch_one(&self.pool)
        .await?;

        Ok(book)
    }

    async fn set_total_copies(&self, id: i32, total_copies: i32) -> AppResult<Option<Book>> {
        let mut tx = self.pool.begin().await?;

        // Same lock order as checkout and hold promotion
        let current: Option<(i32, i32)> = sqlx::query_as(
            "SELECT total_copies, available_copies FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((total, available)) = current else {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        };

        let reserved: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM book_holds WHERE book_id = $1 AND status = $2",
        )
        .bind(id)
        .bind(HoldStatus::Ready)
        .fetch_one(&mut *tx)
        .await?;

        let new_available = available + (total_copies - total);
        if i64::from(new_available) < reserved {
            tx.rollback().await?;
            return Ok(None);
        }

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET total_copies = $1, available_copies = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(total_copies)
        .bind(new_available)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(book))
    }
}
