//! Borrow records repository

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use super::page_window;
use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::{BorrowQuery, BorrowRecord, NewBorrow},
        enums::{BorrowStatus, HoldStatus},
        fine::{Fine, NewFine},
    },
};

#[async_trait]
pub trait BorrowsRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<BorrowRecord>;

    async fn list(&self, query: &BorrowQuery) -> AppResult<(Vec<BorrowRecord>, i64)>;

    /// The user's BORROWED or OVERDUE record for this book
    async fn find_active(&self, user_id: i32, book_id: i32) -> AppResult<Option<BorrowRecord>>;

    /// Records in OVERDUE or LOST status
    async fn count_overdue_or_lost(&self, user_id: i32) -> AppResult<i64>;

    /// Take one copy and insert the record in a single transaction.
    ///
    /// A copy is only taken while more copies are available than READY holds
    /// of other users; the borrower's own READY hold is fulfilled. Returns None
    /// when no unreserved copy is left.
    async fn checkout(&self, borrow: &NewBorrow) -> AppResult<Option<BorrowRecord>>;

    /// Active record -> RETURNED, putting the copy back on the shelf.
    /// Returns None when the record was not active.
    async fn check_in(&self, id: i32, return_date: NaiveDate) -> AppResult<Option<BorrowRecord>>;

    /// Plain status update, applied only while the status is still `from`
    async fn transition(
        &self,
        id: i32,
        from: BorrowStatus,
        to: BorrowStatus,
    ) -> AppResult<Option<BorrowRecord>>;

    /// Move the record from one of `from` to `to` and insert `fine`, atomically.
    /// Returns None when the record was no longer in any `from` status.
    async fn transition_with_fine(
        &self,
        id: i32,
        from: &[BorrowStatus],
        to: BorrowStatus,
        fine: &NewFine,
    ) -> AppResult<Option<Fine>>;

    /// Records in any of `statuses` with a due date strictly before `date`
    async fn list_due_before(
        &self,
        statuses: &[BorrowStatus],
        date: NaiveDate,
    ) -> AppResult<Vec<BorrowRecord>>;
}

fn status_texts(statuses: &[BorrowStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

#[derive(Clone)]
pub struct PgBorrowsRepository {
    pool: Pool<Postgres>,
}

impl PgBorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BorrowsRepository for PgBorrowsRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<BorrowRecord> {
        sqlx::query_as::<_, BorrowRecord>("SELECT * FROM borrow_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow record with id {} not found", id)))
    }

    async fn list(&self, query: &BorrowQuery) -> AppResult<(Vec<BorrowRecord>, i64)> {
        let (limit, offset) = page_window(query.page, query.per_page);

        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.status.is_some() {
            conditions.push(format!("status = ${}", idx));
            idx += 1;
        }
        if query.user_id.is_some() {
            conditions.push(format!("user_id = ${}", idx));
            idx += 1;
        }
        if query.book_id.is_some() {
            conditions.push(format!("book_id = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_q = format!("SELECT COUNT(*) FROM borrow_records {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(status) = query.status { count_builder = count_builder.bind(status); }
        if let Some(user_id) = query.user_id { count_builder = count_builder.bind(user_id); }
        if let Some(book_id) = query.book_id { count_builder = count_builder.bind(book_id); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "SELECT * FROM borrow_records {} ORDER BY borrow_date DESC, id DESC LIMIT {} OFFSET {}",
            where_clause, limit, offset
        );
        let mut builder = sqlx::query_as::<_, BorrowRecord>(&select_q);
        if let Some(status) = query.status { builder = builder.bind(status); }
        if let Some(user_id) = query.user_id { builder = builder.bind(user_id); }
        if let Some(book_id) = query.book_id { builder = builder.bind(book_id); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    async fn find_active(&self, user_id: i32, book_id: i32) -> AppResult<Option<BorrowRecord>> {
        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            SELECT * FROM borrow_records
            WHERE user_id = $1 AND book_id = $2 AND status IN ('BORROWED', 'OVERDUE')
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn count_overdue_or_lost(&self, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records WHERE user_id = $1 AND status IN ('OVERDUE', 'LOST')",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn checkout(&self, borrow: &NewBorrow) -> AppResult<Option<BorrowRecord>> {
        let mut tx = self.pool.begin().await?;

        // Lock the book row before counting READY holds
        let available: Option<i32> = sqlx::query_scalar(
            "SELECT available_copies FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(borrow.book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(available) = available else {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("Book with id {} not found", borrow.book_id)));
        };

        let reserved_for_others: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM book_holds WHERE book_id = $1 AND status = $2 AND user_id <> $3",
        )
        .bind(borrow.book_id)
        .bind(HoldStatus::Ready)
        .bind(borrow.user_id)
        .fetch_one(&mut *tx)
        .await?;

        if i64::from(available) <= reserved_for_others {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query("UPDATE books SET available_copies = available_copies - 1 WHERE id = $1")
            .bind(borrow.book_id)
            .execute(&mut *tx)
            .await?;

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            INSERT INTO borrow_records (user_id, book_id, borrow_date, due_date, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(borrow.user_id)
        .bind(borrow.book_id)
        .bind(borrow.borrow_date)
        .bind(borrow.due_date)
        .bind(BorrowStatus::Borrowed)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "You have already borrowed this book"))?;

        sqlx::query(
            "UPDATE book_holds SET status = $1 WHERE user_id = $2 AND book_id = $3 AND status = $4",
        )
        .bind(HoldStatus::Fulfilled)
        .bind(borrow.user_id)
        .bind(borrow.book_id)
        .bind(HoldStatus::Ready)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(record))
    }

    async fn check_in(&self, id: i32, return_date: NaiveDate) -> AppResult<Option<BorrowRecord>> {
        let mut tx = self.pool.begin().await?;

        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrow_records SET status = $1, return_date = $2
            WHERE id = $3 AND status IN ('BORROWED', 'OVERDUE')
            RETURNING *
            "#,
        )
        .bind(BorrowStatus::Returned)
        .bind(return_date)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = record else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            "UPDATE books SET available_copies = LEAST(total_copies, available_copies + 1) WHERE id = $1",
        )
        .bind(record.book_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(record))
    }

    async fn transition(
        &self,
        id: i32,
        from: BorrowStatus,
        to: BorrowStatus,
    ) -> AppResult<Option<BorrowRecord>> {
        let record = sqlx::query_as::<_, BorrowRecord>(
            "UPDATE borrow_records SET status = $1 WHERE id = $2 AND status = $3 RETURNING *",
        )
        .bind(to)
        .bind(id)
        .bind(from)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn transition_with_fine(
        &self,
        id: i32,
        from: &[BorrowStatus],
        to: BorrowStatus,
        fine: &NewFine,
    ) -> AppResult<Option<Fine>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_scalar::<_, i32>(
            "UPDATE borrow_records SET status = $1 WHERE id = $2 AND status = ANY($3) RETURNING id",
        )
        .bind(to)
        .bind(id)
        .bind(status_texts(from))
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let fine = sqlx::query_as::<_, Fine>(
            r#"
            INSERT INTO fines (user_id, borrow_record_id, amount, fine_type, status, description)
            VALUES ($1, $2, $3, $4, 'PENDING', $5)
            RETURNING *
            "#,
        )
        .bind(fine.user_id)
        .bind(fine.borrow_record_id)
        .bind(fine.amount)
        .bind(fine.fine_type)
        .bind(&fine.description)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(fine))
    }

    async fn list_due_before(
        &self,
        statuses: &[BorrowStatus],
        date: NaiveDate,
    ) -> AppResult<Vec<BorrowRecord>> {
        let records = sqlx::query_as::<_, BorrowRecord>(
            r#"
            SELECT * FROM borrow_records
            WHERE status = ANY($1) AND due_date < $2
            ORDER BY due_date, id
            "#,
        )
        .bind(status_texts(statuses))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
