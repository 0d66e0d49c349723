//! Catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::book::{Book, BookQuery, CreateBook, UpdateCopies},
    AppState,
};

use super::{validate, AuthenticatedUser, PaginatedResponse};

/// List books with search and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "List of books", body = PaginatedResponse<Book>)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<PaginatedResponse<Book>>> {
    let (books, total) = state.services.catalog.search_books(&query).await?;
    Ok(Json(PaginatedResponse::new(books, total, query.page, query.per_page)))
}

/// Get book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    claims.require_admin()?;
    validate(&book)?;

    let created = state.services.catalog.create_book(&book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Change the number of owned copies
#[utoipa::path(
    put,
    path = "/books/{id}/copies",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = UpdateCopies,
    responses(
        (status = 200, description = "Copies updated", body = Book),
        (status = 422, description = "Copies on loan cannot be removed", body = crate::error::ErrorResponse)
    )
)]
pub async fn set_total_copies(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(body): Json<UpdateCopies>,
) -> AppResult<Json<Book>> {
    claims.require_admin()?;
    validate(&body)?;

    let book = state.services.catalog.set_total_copies(id, body.total_copies).await?;
    Ok(Json(book))
}
