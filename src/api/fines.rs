//! Fine endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::fine::{AssessDamage, Fine, FineQuery, UnpaidFines, WaiveFine},
    AppState,
};

use super::{validate, AuthenticatedUser, PaginatedResponse};

/// The caller's fines
#[utoipa::path(
    get,
    path = "/fines/mine",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(FineQuery),
    responses(
        (status = 200, description = "Fines", body = PaginatedResponse<Fine>)
    )
)]
pub async fn my_fines(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(mut query): Query<FineQuery>,
) -> AppResult<Json<PaginatedResponse<Fine>>> {
    query.user_id = Some(claims.user_id);

    let (fines, total) = state.services.fines.list_fines(&query).await?;
    Ok(Json(PaginatedResponse::new(fines, total, query.page, query.per_page)))
}

/// All fines, filtered by status or user
#[utoipa::path(
    get,
    path = "/fines",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(FineQuery),
    responses(
        (status = 200, description = "Fines", body = PaginatedResponse<Fine>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_fines(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<FineQuery>,
) -> AppResult<Json<PaginatedResponse<Fine>>> {
    claims.require_admin()?;

    let (fines, total) = state.services.fines.list_fines(&query).await?;
    Ok(Json(PaginatedResponse::new(fines, total, query.page, query.per_page)))
}

/// Count and total of a user's unpaid fines
#[utoipa::path(
    get,
    path = "/users/{id}/fines/summary",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Unpaid fines", body = UnpaidFines),
        (status = 404, description = "User not found")
    )
)]
pub async fn unpaid_summary(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<UnpaidFines>> {
    claims.require_self_or_admin(user_id)?;

    let summary = state.services.fines.unpaid_summary(user_id).await?;
    Ok(Json(summary))
}

/// Record payment of a PENDING fine
#[utoipa::path(
    post,
    path = "/fines/{id}/pay",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Fine ID")
    ),
    responses(
        (status = 200, description = "Fine paid", body = Fine),
        (status = 404, description = "Fine not found"),
        (status = 409, description = "Fine already resolved", body = crate::error::ErrorResponse)
    )
)]
pub async fn pay_fine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Fine>> {
    claims.require_admin()?;

    let fine = state.services.fines.mark_fine_paid(id).await?;
    Ok(Json(fine))
}

/// Waive a PENDING fine with a reason
#[utoipa::path(
    post,
    path = "/fines/{id}/waive",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Fine ID")
    ),
    request_body = WaiveFine,
    responses(
        (status = 200, description = "Fine waived", body = Fine),
        (status = 404, description = "Fine not found"),
        (status = 409, description = "Fine already resolved", body = crate::error::ErrorResponse)
    )
)]
pub async fn waive_fine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(body): Json<WaiveFine>,
) -> AppResult<Json<Fine>> {
    claims.require_admin()?;
    validate(&body)?;

    let fine = state
        .services
        .fines
        .waive_fine(id, claims.user_id, &body.reason)
        .await?;
    Ok(Json(fine))
}

/// Charge a damage fine against a borrow record
#[utoipa::path(
    post,
    path = "/fines/damage",
    tag = "fines",
    security(("bearer_auth" = [])),
    request_body = AssessDamage,
    responses(
        (status = 201, description = "Fine created", body = Fine),
        (status = 400, description = "Invalid amount or description"),
        (status = 404, description = "Borrow record not found")
    )
)]
pub async fn assess_damage(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(body): Json<AssessDamage>,
) -> AppResult<(StatusCode, Json<Fine>)> {
    claims.require_admin()?;
    validate(&body)?;

    let fine = state
        .services
        .fines
        .assess_damage(body.borrow_record_id, body.amount, &body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(fine)))
}
