//! Book acquisition requests repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book_request::{BookRequest, CreateBookRequest},
        enums::BookRequestStatus,
    },
};

#[async_trait]
pub trait BookRequestsRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<BookRequest>;

    /// Requests, optionally restricted to one status and/or one user
    async fn list(
        &self,
        status: Option<BookRequestStatus>,
        user_id: Option<i32>,
    ) -> AppResult<Vec<BookRequest>>;

    async fn create(&self, user_id: i32, request: &CreateBookRequest) -> AppResult<BookRequest>;

    /// Set `to` only while the status is still `from`
    async fn decide(
        &self,
        id: i32,
        from: BookRequestStatus,
        to: BookRequestStatus,
        admin_note: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<Option<BookRequest>>;
}

#[derive(Clone)]
pub struct PgBookRequestsRepository {
    pool: Pool<Postgres>,
}

impl PgBookRequestsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRequestsRepository for PgBookRequestsRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<BookRequest> {
        sqlx::query_as::<_, BookRequest>("SELECT * FROM book_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book request with id {} not found", id)))
    }

    async fn list(
        &self,
        status: Option<BookRequestStatus>,
        user_id: Option<i32>,
    ) -> AppResult<Vec<BookRequest>> {
        let requests = sqlx::query_as::<_, BookRequest>(
            r#"
            SELECT * FROM book_requests
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::int IS NULL OR user_id = $2)
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(status)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    async fn create(&self, user_id: i32, request: &CreateBookRequest) -> AppResult<BookRequest> {
        let request = sqlx::query_as::<_, BookRequest>(
            r#"
            INSERT INTO book_requests (user_id, title, author, isbn, reason, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&request.title)
        .bind(&request.author)
        .bind(&request.isbn)
        .bind(&request.reason)
        .bind(BookRequestStatus::Pending)
        .fetch_one(&self.pool)
        .await?;
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
        let request = sqlx::query_as::<_, BookRequest>(
            r#"
            UPDATE book_requests
            SET status = $1, admin_note = COALESCE($2, admin_note), decided_at = $3
            WHERE id = $4 AND status = $5
            RETURNING *
            "#,
        )
        .bind(to)
        .bind(admin_note)
        .bind(at)
        .bind(id)
        .bind(from)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }
}
