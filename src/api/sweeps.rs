//! Manual triggers for the scheduled sweeps

use axum::{extract::State, Json};

use crate::{error::AppResult, models::sweep::SweepReport, AppState};

use super::AuthenticatedUser;

/// Mark overdue borrows and charge overdue fines
#[utoipa::path(
    post,
    path = "/admin/sweeps/overdue",
    tag = "sweeps",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep report", body = SweepReport),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn sweep_overdue(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<SweepReport>> {
    claims.require_admin()?;
    Ok(Json(state.services.fines.sweep_overdue().await?))
}

/// Declare long-overdue borrows lost
#[utoipa::path(
    post,
    path = "/admin/sweeps/lost",
    tag = "sweeps",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep report", body = SweepReport),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn sweep_lost_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<SweepReport>> {
    claims.require_admin()?;
    Ok(Json(state.services.fines.sweep_lost_books().await?))
}

/// Expire unclaimed holds and promote the next waiters
#[utoipa::path(
    post,
    path = "/admin/sweeps/holds",
    tag = "sweeps",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep report", body = SweepReport),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn sweep_expired_holds(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<SweepReport>> {
    claims.require_admin()?;
    Ok(Json(state.services.holds.sweep_expired_holds().await?))
}
