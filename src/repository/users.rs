//! Users repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::page_window;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{UserRole, UserStatus},
        user::{CreateUser, User, UserQuery},
    },
};

#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<User>;

    /// Insert a PENDING account
    async fn create(&self, user: &CreateUser) -> AppResult<User>;

    async fn list(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)>;

    /// Oldest APPROVED administrator account, if any
    async fn first_admin(&self) -> AppResult<Option<User>>;

    /// Set `to` only while the status is still `from`
    async fn transition_status(
        &self,
        id: i32,
        from: UserStatus,
        to: UserStatus,
    ) -> AppResult<Option<User>>;
}

#[derive(Clone)]
pub struct PgUsersRepository {
    pool: Pool<Postgres>,
}

impl PgUsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsersRepository for PgUsersRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn create(&self, user: &CreateUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, status, role)
            VALUES (LOWER($1), $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&user.email)
        .bind(&user.name)
        .bind(UserStatus::Pending)
        .bind(user.role.unwrap_or(UserRole::User))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "Email is already registered"))
    }

    async fn list(&self, query: &UserQuery) -> AppResult<(Vec<User>, i64)> {
        let (limit, offset) = page_window(query.page, query.per_page);

        let mut conditions = Vec::new();
        let mut params: Vec<String> = Vec::new();

        if let Some(status) = query.status {
            params.push(status.as_str().to_string());
            conditions.push(format!("status = ${}", params.len()));
        }

        if let Some(ref search) = query.search {
            params.push(format!("%{}%", search.to_lowercase()));
            conditions.push(format!(
                "(LOWER(name) LIKE ${} OR email LIKE ${})",
                params.len(),
                params.len()
            ));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM users {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM users {} ORDER BY name, id LIMIT {} OFFSET {}",
            where_clause, limit, offset
        );
        let mut select_builder = sqlx::query_as::<_, User>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let users = select_builder.fetch_all(&self.pool).await?;

        Ok((users, total))
    }

    async fn first_admin(&self) -> AppResult<Option<User>> {
        let admin = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE role = $1 AND status = $2 ORDER BY id LIMIT 1",
        )
        .bind(UserRole::Admin)
        .bind(UserStatus::Approved)
        .fetch_optional(&self.pool)
        .await?;

        Ok(admin)
    }

    async fn transition_status(
        &self,
        id: i32,
        from: UserStatus,
        to: UserStatus,
    ) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET status = $1 WHERE id = $2 AND status = $3 RETURNING *",
        )
        .bind(to)
        .bind(id)
        .bind(from)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
