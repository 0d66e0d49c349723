//! Borrow endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::borrow::{BorrowQuery, BorrowRecord, ChangeBorrowStatus, CreateBorrow},
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// Borrow a book for yourself, or on behalf of a user (admin)
#[utoipa::path(
    post,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    request_body = CreateBorrow,
    responses(
        (status = 201, description = "Book borrowed", body = BorrowRecord),
        (status = 404, description = "User or book not found"),
        (status = 409, description = "Book already borrowed by this user", body = crate::error::ErrorResponse),
        (status = 422, description = "Book not available or user not eligible", body = crate::error::ErrorResponse)
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateBorrow>,
) -> AppResult<(StatusCode, Json<BorrowRecord>)> {
    let user_id = request.user_id.unwrap_or(claims.user_id);
    claims.require_self_or_admin(user_id)?;

    let record = state.services.borrows.borrow(request.book_id, user_id).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// The caller's borrow records
#[utoipa::path(
    get,
    path = "/borrows/mine",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(BorrowQuery),
    responses(
        (status = 200, description = "Borrow records", body = PaginatedResponse<BorrowRecord>)
    )
)]
pub async fn my_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(mut query): Query<BorrowQuery>,
) -> AppResult<Json<PaginatedResponse<BorrowRecord>>> {
    query.user_id = Some(claims.user_id);

    let (records, total) = state.services.borrows.list_borrows(&query).await?;
    Ok(Json(PaginatedResponse::new(records, total, query.page, query.per_page)))
}

/// All borrow records, filtered by status, user or book
#[utoipa::path(
    get,
    path = "/borrows",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(BorrowQuery),
    responses(
        (status = 200, description = "Borrow records", body = PaginatedResponse<BorrowRecord>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BorrowQuery>,
) -> AppResult<Json<PaginatedResponse<BorrowRecord>>> {
    claims.require_admin()?;

    let (records, total) = state.services.borrows.list_borrows(&query).await?;
    Ok(Json(PaginatedResponse::new(records, total, query.page, query.per_page)))
}

/// Move a borrow record forward (RETURNED, OVERDUE or LOST)
#[utoipa::path(
    put,
    path = "/borrows/{id}/status",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrow record ID")
    ),
    request_body = ChangeBorrowStatus,
    responses(
        (status = 200, description = "Status changed", body = BorrowRecord),
        (status = 404, description = "Borrow record not found"),
        (status = 409, description = "Transition not allowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn change_status(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(body): Json<ChangeBorrowStatus>,
) -> AppResult<Json<BorrowRecord>> {
    claims.require_admin()?;

    let record = state.services.borrows.change_borrow_status(id, body.status).await?;
    Ok(Json(record))
}
