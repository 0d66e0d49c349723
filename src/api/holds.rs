//! Hold queue endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::hold::{BookHold, CreateHold, HoldWithPosition},
    AppState,
};

use super::AuthenticatedUser;

/// Join the waitlist of a book
#[utoipa::path(
    post,
    path = "/holds",
    tag = "holds",
    security(("bearer_auth" = [])),
    request_body = CreateHold,
    responses(
        (status = 201, description = "Hold placed", body = HoldWithPosition),
        (status = 409, description = "Active hold or borrow already exists", body = crate::error::ErrorResponse),
        (status = 422, description = "Book is available", body = crate::error::ErrorResponse)
    )
)]
pub async fn place_hold(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(body): Json<CreateHold>,
) -> AppResult<(StatusCode, Json<HoldWithPosition>)> {
    let hold = state.services.holds.place_hold(claims.user_id, body.book_id).await?;
    Ok((StatusCode::CREATED, Json(hold)))
}

/// The caller's holds with queue positions
#[utoipa::path(
    get,
    path = "/holds/mine",
    tag = "holds",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Holds", body = Vec<HoldWithPosition>)
    )
)]
pub async fn my_holds(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<HoldWithPosition>>> {
    let holds = state.services.holds.list_user_holds(claims.user_id).await?;
    Ok(Json(holds))
}

/// Waiting and ready holds of a book
#[utoipa::path(
    get,
    path = "/books/{id}/holds",
    tag = "holds",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Hold queue", body = Vec<HoldWithPosition>),
        (status = 404, description = "Book not found")
    )
)]
pub async fn book_queue(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<Json<Vec<HoldWithPosition>>> {
    let queue = state.services.holds.book_queue(book_id).await?;
    Ok(Json(queue))
}

/// Cancel a hold (owner or admin)
#[utoipa::path(
    post,
    path = "/holds/{id}/cancel",
    tag = "holds",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Hold ID")
    ),
    responses(
        (status = 200, description = "Hold cancelled", body = BookHold),
        (status = 404, description = "Hold not found"),
        (status = 409, description = "Hold already fulfilled or cancelled", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_hold(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BookHold>> {
    let hold = state.services.holds.get_hold(id).await?;
    claims.require_self_or_admin(hold.user_id)?;

    let hold = state.services.holds.cancel_hold(id).await?;
    Ok(Json(hold))
}

/// Mark a READY hold as picked up
#[utoipa::path(
    post,
    path = "/holds/{id}/fulfill",
    tag = "holds",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Hold ID")
    ),
    responses(
        (status = 200, description = "Hold fulfilled", body = BookHold),
        (status = 409, description = "Hold is not ready", body = crate::error::ErrorResponse)
    )
)]
pub async fn fulfill_hold(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BookHold>> {
    claims.require_admin()?;

    let hold = state.services.holds.fulfill_hold(id).await?;
    Ok(Json(hold))
}
