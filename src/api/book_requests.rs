//! Book acquisition request endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::book_request::{BookRequest, BookRequestQuery, CreateBookRequest, DecideBookRequest},
    AppState,
};

use super::{validate, AuthenticatedUser};

/// Suggest a title for the library to acquire
#[utoipa::path(
    post,
    path = "/book-requests",
    tag = "book-requests",
    security(("bearer_auth" = [])),
    request_body = CreateBookRequest,
    responses(
        (status = 201, description = "Request created", body = BookRequest),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_book_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(body): Json<CreateBookRequest>,
) -> AppResult<(StatusCode, Json<BookRequest>)> {
    validate(&body)?;

    let request = state.services.book_requests.create(claims.user_id, &body).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// The caller's book requests
#[utoipa::path(
    get,
    path = "/book-requests/mine",
    tag = "book-requests",
    security(("bearer_auth" = [])),
    params(BookRequestQuery),
    responses(
        (status = 200, description = "Book requests", body = Vec<BookRequest>)
    )
)]
pub async fn my_book_requests(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BookRequestQuery>,
) -> AppResult<Json<Vec<BookRequest>>> {
    let requests = state
        .services
        .book_requests
        .list(query.status, Some(claims.user_id))
        .await?;
    Ok(Json(requests))
}

/// All book requests
#[utoipa::path(
    get,
    path = "/book-requests",
    tag = "book-requests",
    security(("bearer_auth" = [])),
    params(BookRequestQuery),
    responses(
        (status = 200, description = "Book requests", body = Vec<BookRequest>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_book_requests(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<BookRequestQuery>,
) -> AppResult<Json<Vec<BookRequest>>> {
    claims.require_admin()?;

    let requests = state.services.book_requests.list(query.status, None).await?;
    Ok(Json(requests))
}

/// Approve, reject or mark a request fulfilled
#[utoipa::path(
    post,
    path = "/book-requests/{id}/decide",
    tag = "book-requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book request ID")
    ),
    request_body = DecideBookRequest,
    responses(
        (status = 200, description = "Request updated", body = BookRequest),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Transition not allowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn decide_book_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(body): Json<DecideBookRequest>,
) -> AppResult<Json<BookRequest>> {
    claims.require_admin()?;
    validate(&body)?;

    let request = state
        .services
        .book_requests
        .decide(id, body.status, body.admin_note.as_deref())
        .await?;
    Ok(Json(request))
}
