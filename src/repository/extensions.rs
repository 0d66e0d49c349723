//! Extension requests repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{BorrowStatus, ExtensionStatus},
        extension::{ExtensionQuery, ExtensionRequest, NewExtension},
    },
};

#[async_trait]
pub trait ExtensionsRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<ExtensionRequest>;

    async fn list(&self, query: &ExtensionQuery) -> AppResult<Vec<ExtensionRequest>>;

    async fn find_pending(&self, borrow_record_id: i32) -> AppResult<Option<ExtensionRequest>>;

    /// APPROVED requests of a user created at or after `since`
    async fn count_approved_since(&self, user_id: i32, since: DateTime<Utc>) -> AppResult<i64>;

    /// Insert a PENDING request
    async fn create(&self, request: &NewExtension) -> AppResult<ExtensionRequest>;

    /// PENDING -> REJECTED
    async fn reject(
        &self,
        id: i32,
        admin_note: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<Option<ExtensionRequest>>;

    /// PENDING -> APPROVED and move the borrow record's due date, in one
    /// transaction. Nothing changes (None) unless the request is PENDING and
    /// the borrow record is still BORROWED.
    async fn approve(
        &self,
        id: i32,
        admin_note: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<Option<ExtensionRequest>>;
}

#[derive(Clone)]
pub struct PgExtensionsRepository {
    pool: Pool<Postgres>,
}

impl PgExtensionsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExtensionsRepository for PgExtensionsRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<ExtensionRequest> {
        sqlx::query_as::<_, ExtensionRequest>("SELECT * FROM extension_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Extension request with id {} not found", id)))
    }

    async fn list(&self, query: &ExtensionQuery) -> AppResult<Vec<ExtensionRequest>> {
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

        let select_q = format!(
            "SELECT * FROM extension_requests {} ORDER BY created_at DESC, id DESC",
            where_clause
        );
        let mut builder = sqlx::query_as::<_, ExtensionRequest>(&select_q);
        if let Some(status) = query.status { builder = builder.bind(status); }
        if let Some(user_id) = query.user_id { builder = builder.bind(user_id); }

        Ok(builder.fetch_all(&self.pool).await?)
    }

    async fn find_pending(&self, borrow_record_id: i32) -> AppResult<Option<ExtensionRequest>> {
        let request = sqlx::query_as::<_, ExtensionRequest>(
            "SELECT * FROM extension_requests WHERE borrow_record_id = $1 AND status = $2",
        )
        .bind(borrow_record_id)
        .bind(ExtensionStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    async fn count_approved_since(&self, user_id: i32, since: DateTime<Utc>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM extension_requests
            WHERE user_id = $1 AND status = $2 AND created_at >= $3
            "#,
        )
        .bind(user_id)
        .bind(ExtensionStatus::Approved)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn create(&self, request: &NewExtension) -> AppResult<ExtensionRequest> {
        sqlx::query_as::<_, ExtensionRequest>(
            r#"
            INSERT INTO extension_requests (
                user_id, borrow_record_id, current_due_date, requested_due_date,
                reason, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(request.user_id)
        .bind(request.borrow_record_id)
        .bind(request.current_due_date)
        .bind(request.requested_due_date)
        .bind(&request.reason)
        .bind(ExtensionStatus::Pending)
        .bind(request.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(e, "An extension request is already pending for this borrow")
        })
    }

    async fn reject(
        &self,
        id: i32,
        admin_note: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<Option<ExtensionRequest>> {
        let request = sqlx::query_as::<_, ExtensionRequest>(
            r#"
            UPDATE extension_requests SET status = $1, admin_note = $2, decided_at = $3
            WHERE id = $4 AND status = $5
            RETURNING *
            "#,
        )
        .bind(ExtensionStatus::Rejected)
        .bind(admin_note)
        .bind(at)
        .bind(id)
        .bind(ExtensionStatus::Pending)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    async fn approve(
        &self,
        id: i32,
        admin_note: Option<&str>,
        at: DateTime<Utc>,
    ) -> AppResult<Option<ExtensionRequest>> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, ExtensionRequest>(
            r#"
            UPDATE extension_requests SET status = $1, admin_note = $2, decided_at = $3
            WHERE id = $4 AND status = $5
            RETURNING *
            "#,
        )
        .bind(ExtensionStatus::Approved)
        .bind(admin_note)
        .bind(at)
        .bind(id)
        .bind(ExtensionStatus::Pending)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(request) = request else {
            tx.rollback().await?;
            return Ok(None);
        };

        let moved = sqlx::query(
            "UPDATE borrow_records SET due_date = $1 WHERE id = $2 AND status = $3",
        )
        .bind(request.requested_due_date)
        .bind(request.borrow_record_id)
        .bind(BorrowStatus::Borrowed)
        .execute(&mut *tx)
        .await?;

        if moved.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(request))
    }
}
