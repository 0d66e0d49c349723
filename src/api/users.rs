//! User management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::{AppError, AppResult},
    models::{
        eligibility::Eligibility,
        enums::UserRole,
        user::{CreateUser, User, UserQuery},
    },
    AppState,
};

use super::{validate, AuthenticatedUser, PaginatedResponse};

/// Register a new account (starts PENDING).
///
/// Open to anonymous callers. Only an administrator may request a role
/// other than USER.
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "Account registered", body = User),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Only administrators may assign roles"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    caller: Option<AuthenticatedUser>,
    Json(user): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    validate(&user)?;

    if user.role.is_some_and(|role| role != UserRole::User) {
        match caller {
            Some(AuthenticatedUser(claims)) => claims.require_admin()?,
            None => {
                return Err(AppError::Authorization(
                    "Only administrators may assign roles".to_string(),
                ))
            }
        }
    }

    let created = state.services.users.register(&user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// List users with filters and pagination
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "List of users", body = PaginatedResponse<User>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<PaginatedResponse<User>>> {
    claims.require_admin()?;

    let (users, total) = state.services.users.list_users(&query).await?;
    Ok(Json(PaginatedResponse::new(users, total, query.page, query.per_page)))
}

/// Get user details by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    claims.require_self_or_admin(id)?;

    let user = state.services.users.get_user(id).await?;
    Ok(Json(user))
}

/// Approve a PENDING account
#[utoipa::path(
    post,
    path = "/users/{id}/approve",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Account approved", body = User),
        (status = 409, description = "Account is not pending", body = crate::error::ErrorResponse)
    )
)]
pub async fn approve_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;

    let user = state.services.users.approve(id).await?;
    Ok(Json(user))
}

/// Reject a PENDING account
#[utoipa::path(
    post,
    path = "/users/{id}/reject",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Account rejected", body = User),
        (status = 409, description = "Account is not pending", body = crate::error::ErrorResponse)
    )
)]
pub async fn reject_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;

    let user = state.services.users.reject(id).await?;
    Ok(Json(user))
}

/// Read-only borrowing eligibility
#[utoipa::path(
    get,
    path = "/users/{id}/eligibility",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Eligibility summary", body = Eligibility),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_eligibility(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Eligibility>> {
    claims.require_self_or_admin(id)?;

    let eligibility = state.services.eligibility.check_eligibility(id).await?;
    Ok(Json(eligibility))
}

/// Block or unblock the account according to its eligibility
#[utoipa::path(
    post,
    path = "/users/{id}/eligibility/apply",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User with refreshed status", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn apply_eligibility(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;

    let user = state.services.eligibility.apply_eligibility_consequence(id).await?;
    Ok(Json(user))
}
