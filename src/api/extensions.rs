//! Extension request endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::extension::{CreateExtension, DecideExtension, ExtensionQuery, ExtensionRequest},
    AppState,
};

use super::{validate, AuthenticatedUser};

/// Ask for a later due date on one of your borrows
#[utoipa::path(
    post,
    path = "/extensions",
    tag = "extensions",
    security(("bearer_auth" = [])),
    request_body = CreateExtension,
    responses(
        (status = 201, description = "Request created", body = ExtensionRequest),
        (status = 400, description = "Requested date not after the current due date"),
        (status = 409, description = "A request is already pending", body = crate::error::ErrorResponse),
        (status = 422, description = "Monthly quota reached", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_extension(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(body): Json<CreateExtension>,
) -> AppResult<(StatusCode, Json<ExtensionRequest>)> {
    validate(&body)?;

    let request = state
        .services
        .extensions
        .create_extension_request(claims.user_id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// The caller's extension requests
#[utoipa::path(
    get,
    path = "/extensions/mine",
    tag = "extensions",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Extension requests", body = Vec<ExtensionRequest>)
    )
)]
pub async fn my_extensions(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<ExtensionRequest>>> {
    let query = ExtensionQuery {
        user_id: Some(claims.user_id),
        ..Default::default()
    };

    let requests = state.services.extensions.list_extension_requests(&query).await?;
    Ok(Json(requests))
}

/// All extension requests
#[utoipa::path(
    get,
    path = "/extensions",
    tag = "extensions",
    security(("bearer_auth" = [])),
    params(ExtensionQuery),
    responses(
        (status = 200, description = "Extension requests", body = Vec<ExtensionRequest>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_extensions(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ExtensionQuery>,
) -> AppResult<Json<Vec<ExtensionRequest>>> {
    claims.require_admin()?;

    let requests = state.services.extensions.list_extension_requests(&query).await?;
    Ok(Json(requests))
}

/// Approve or reject a pending request
#[utoipa::path(
    post,
    path = "/extensions/{id}/decide",
    tag = "extensions",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Extension request ID")
    ),
    request_body = DecideExtension,
    responses(
        (status = 200, description = "Request decided", body = ExtensionRequest),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Already decided or borrow no longer active", body = crate::error::ErrorResponse)
    )
)]
pub async fn decide_extension(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(body): Json<DecideExtension>,
) -> AppResult<Json<ExtensionRequest>> {
    claims.require_admin()?;
    validate(&body)?;

    let request = state
        .services
        .extensions
        .decide_extension_request(id, body.decision, body.admin_note.as_deref())
        .await?;
    Ok(Json(request))
}
