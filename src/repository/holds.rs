//! Book holds (waitlist) repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{enums::HoldStatus, hold::BookHold},
};

#[async_trait]
pub trait HoldsRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<BookHold>;

    /// All holds of a user, newest first
    async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<BookHold>>;

    /// WAITING and READY holds of a book in request order
    async fn list_queue(&self, book_id: i32) -> AppResult<Vec<BookHold>>;

    /// The user's WAITING or READY hold on this book
    async fn find_active(&self, user_id: i32, book_id: i32) -> AppResult<Option<BookHold>>;

    /// READY holds on a book, each reserving one available copy
    async fn count_ready(&self, book_id: i32) -> AppResult<i64>;

    /// Insert a WAITING hold
    async fn create(&self, user_id: i32, book_id: i32, at: DateTime<Utc>) -> AppResult<BookHold>;

    /// Any status but FULFILLED/CANCELLED -> CANCELLED
    async fn cancel(&self, id: i32) -> AppResult<Option<BookHold>>;

    /// READY -> FULFILLED
    async fn fulfill(&self, id: i32) -> AppResult<Option<BookHold>>;

    /// Oldest WAITING hold -> READY, provided the book still has an available
    /// copy not reserved by another READY hold. Serialized per book.
    async fn promote_next(
        &self,
        book_id: i32,
        now: DateTime<Utc>,
        expiry: DateTime<Utc>,
    ) -> AppResult<Option<BookHold>>;

    /// READY holds whose pickup window ended before `now`
    async fn list_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<BookHold>>;

    /// READY -> EXPIRED, only if the window really ended before `now`
    async fn expire(&self, id: i32, now: DateTime<Utc>) -> AppResult<Option<BookHold>>;

    /// 1-based position among the book's WAITING holds
    async fn queue_position(&self, hold: &BookHold) -> AppResult<Option<i64>>;
}

#[derive(Clone)]
pub struct PgHoldsRepository {
    pool: Pool<Postgres>,
}

impl PgHoldsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HoldsRepository for PgHoldsRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<BookHold> {
        sqlx::query_as::<_, BookHold>("SELECT * FROM book_holds WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Hold with id {} not found", id)))
    }

    async fn list_for_user(&self, user_id: i32) -> AppResult<Vec<BookHold>> {
        let holds = sqlx::query_as::<_, BookHold>(
            "SELECT * FROM book_holds WHERE user_id = $1 ORDER BY request_date DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(holds)
    }

    async fn list_queue(&self, book_id: i32) -> AppResult<Vec<BookHold>> {
        let holds = sqlx::query_as::<_, BookHold>(
            r#"
            SELECT * FROM book_holds
            WHERE book_id = $1 AND status IN ('WAITING', 'READY')
            ORDER BY request_date, id
            "#,
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(holds)
    }

    async fn find_active(&self, user_id: i32, book_id: i32) -> AppResult<Option<BookHold>> {
        let hold = sqlx::query_as::<_, BookHold>(
            r#"
            SELECT * FROM book_holds
            WHERE user_id = $1 AND book_id = $2 AND status IN ('WAITING', 'READY')
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hold)
    }

    async fn count_ready(&self, book_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM book_holds WHERE book_id = $1 AND status = $2",
        )
        .bind(book_id)
        .bind(HoldStatus::Ready)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn create(&self, user_id: i32, book_id: i32, at: DateTime<Utc>) -> AppResult<BookHold> {
        sqlx::query_as::<_, BookHold>(
            r#"
            INSERT INTO book_holds (user_id, book_id, status, request_date)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(HoldStatus::Waiting)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "You already have an active hold on this book"))
    }

    async fn cancel(&self, id: i32) -> AppResult<Option<BookHold>> {
        let hold = sqlx::query_as::<_, BookHold>(
            r#"
            UPDATE book_holds SET status = $1
            WHERE id = $2 AND status NOT IN ('FULFILLED', 'CANCELLED')
            RETURNING *
            "#,
        )
        .bind(HoldStatus::Cancelled)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hold)
    }

    async fn fulfill(&self, id: i32) -> AppResult<Option<BookHold>> {
        let hold = sqlx::query_as::<_, BookHold>(
            "UPDATE book_holds SET status = $1 WHERE id = $2 AND status = $3 RETURNING *",
        )
        .bind(HoldStatus::Fulfilled)
        .bind(id)
        .bind(HoldStatus::Ready)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hold)
    }

    async fn promote_next(
        &self,
        book_id: i32,
        now: DateTime<Utc>,
        expiry: DateTime<Utc>,
    ) -> AppResult<Option<BookHold>> {
        let mut tx = self.pool.begin().await?;

        // Lock the book row so concurrent promotions for the same book queue up
        let available: Option<i32> = sqlx::query_scalar(
            "SELECT available_copies FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(available) = available else {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("Book with id {} not found", book_id)));
        };

        let reserved: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM book_holds WHERE book_id = $1 AND status = $2",
        )
        .bind(book_id)
        .bind(HoldStatus::Ready)
        .fetch_one(&mut *tx)
        .await?;

        if i64::from(available) <= reserved {
            tx.rollback().await?;
            return Ok(None);
        }

        let hold = sqlx::query_as::<_, BookHold>(
            r#"
            UPDATE book_holds
            SET status = $1, notification_date = $2, expiry_date = $3
            WHERE id = (
                SELECT id FROM book_holds
                WHERE book_id = $4 AND status = $5
                ORDER BY request_date, id
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(HoldStatus::Ready)
        .bind(now)
        .bind(expiry)
        .bind(book_id)
        .bind(HoldStatus::Waiting)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(hold)
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<BookHold>> {
        let holds = sqlx::query_as::<_, BookHold>(
            r#"
            SELECT * FROM book_holds
            WHERE status = $1 AND expiry_date < $2
            ORDER BY expiry_date, id
            "#,
        )
        .bind(HoldStatus::Ready)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(holds)
    }

    async fn expire(&self, id: i32, now: DateTime<Utc>) -> AppResult<Option<BookHold>> {
        let hold = sqlx::query_as::<_, BookHold>(
            r#"
            UPDATE book_holds SET status = $1
            WHERE id = $2 AND status = $3 AND expiry_date < $4
            RETURNING *
            "#,
        )
        .bind(HoldStatus::Expired)
        .bind(id)
        .bind(HoldStatus::Ready)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(hold)
    }

    async fn queue_position(&self, hold: &BookHold) -> AppResult<Option<i64>> {
        if hold.status != HoldStatus::Waiting {
            return Ok(None);
        }

        let ahead: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM book_holds
            WHERE book_id = $1 AND status = $2
              AND (request_date, id) < ($3, $4)
            "#,
        )
        .bind(hold.book_id)
        .bind(HoldStatus::Waiting)
        .bind(hold.request_date)
        .bind(hold.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(ahead + 1))
    }
}
