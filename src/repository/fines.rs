//! Fines repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Pool, Postgres, Row};

use super::page_window;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::FineStatus,
        fine::{Fine, FineQuery, NewFine, UnpaidFines},
    },
};

#[async_trait]
pub trait FinesRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Fine>;

    async fn list(&self, query: &FineQuery) -> AppResult<(Vec<Fine>, i64)>;

    /// Insert a PENDING fine
    async fn create(&self, fine: &NewFine) -> AppResult<Fine>;

    /// Count and total of PENDING fines
    async fn unpaid_summary(&self, user_id: i32) -> AppResult<UnpaidFines>;

    /// PENDING -> PAID
    async fn mark_paid(&self, id: i32, at: DateTime<Utc>) -> AppResult<Option<Fine>>;

    /// PENDING -> WAIVED, appending the reason to the description
    async fn waive(
        &self,
        id: i32,
        admin_id: i32,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Fine>>;
}

/// Description after a waiver: existing text, then the waiver reason
pub(crate) fn waived_description(existing: Option<&str>, reason: &str) -> String {
    match existing {
        Some(text) if !text.is_empty() => format!("{} | Waived: {}", text, reason),
        _ => format!("Waived: {}", reason),
    }
}

#[derive(Clone)]
pub struct PgFinesRepository {
    pool: Pool<Postgres>,
}

impl PgFinesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FinesRepository for PgFinesRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Fine> {
        sqlx::query_as::<_, Fine>("SELECT * FROM fines WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", id)))
    }

    async fn list(&self, query: &FineQuery) -> AppResult<(Vec<Fine>, i64)> {
        let (limit, offset) = page_window(query.page, query.per_page);

        let mut conditions = Vec::new();
        let mut idx = 1;

        if query.status.is_some() {
            conditions.push(format!("status = ${}", idx));
            idx += 1;
        }
        if query.user_id.is_some() {
            conditions.push(format!("user_id = ${}", idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_q = format!("SELECT COUNT(*) FROM fines {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_q);
        if let Some(status) = query.status { count_builder = count_builder.bind(status); }
        if let Some(user_id) = query.user_id { count_builder = count_builder.bind(user_id); }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_q = format!(
            "SELECT * FROM fines {} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
            where_clause, limit, offset
        );
        let mut builder = sqlx::query_as::<_, Fine>(&select_q);
        if let Some(status) = query.status { builder = builder.bind(status); }
        if let Some(user_id) = query.user_id { builder = builder.bind(user_id); }

        let rows = builder.fetch_all(&self.pool).await?;
        Ok((rows, total))
    }

    async fn create(&self, fine: &NewFine) -> AppResult<Fine> {
        let fine = sqlx::query_as::<_, Fine>(
            r#"
            INSERT INTO fines (user_id, borrow_record_id, amount, fine_type, status, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(fine.user_id)
        .bind(fine.borrow_record_id)
        .bind(fine.amount)
        .bind(fine.fine_type)
        .bind(FineStatus::Pending)
        .bind(&fine.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(fine)
    }

    async fn unpaid_summary(&self, user_id: i32) -> AppResult<UnpaidFines> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS count, COALESCE(SUM(amount), 0) AS total
            FROM fines
            WHERE user_id = $1 AND status = $2
            "#,
        )
        .bind(user_id)
        .bind(FineStatus::Pending)
        .fetch_one(&self.pool)
        .await?;

        Ok(UnpaidFines {
            count: row.get::<i64, _>("count"),
            total: row.get::<Decimal, _>("total"),
        })
    }

    async fn mark_paid(&self, id: i32, at: DateTime<Utc>) -> AppResult<Option<Fine>> {
        let fine = sqlx::query_as::<_, Fine>(
            "UPDATE fines SET status = $1, paid_at = $2 WHERE id = $3 AND status = $4 RETURNING *",
        )
        .bind(FineStatus::Paid)
        .bind(at)
        .bind(id)
        .bind(FineStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;

        Ok(fine)
    }

    async fn waive(
        &self,
        id: i32,
        admin_id: i32,
        reason: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<Fine>> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, Fine>(
            "SELECT * FROM fines WHERE id = $1 AND status = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(FineStatus::Pending)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(existing) = existing else {
            tx.rollback().await?;
            return Ok(None);
        };

        let fine = sqlx::query_as::<_, Fine>(
            r#"
            UPDATE fines
            SET status = $1, waived_at = $2, waived_by = $3, description = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(FineStatus::Waived)
        .bind(at)
        .bind(admin_id)
        .bind(waived_description(existing.description.as_deref(), reason))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(fine))
    }
}
