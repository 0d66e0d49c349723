//! Study room endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::room::{CreateRoom, CreateRoomBooking, Room, RoomBooking, RoomScheduleQuery},
    AppState,
};

use super::{validate, AuthenticatedUser};

/// List study rooms
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Rooms", body = Vec<Room>)
    )
)]
pub async fn list_rooms(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Room>>> {
    let rooms = state.services.rooms.list_rooms().await?;
    Ok(Json(rooms))
}

/// Create a study room
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    security(("bearer_auth" = [])),
    request_body = CreateRoom,
    responses(
        (status = 201, description = "Room created", body = Room),
        (status = 409, description = "Room name already used", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_room(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(body): Json<CreateRoom>,
) -> AppResult<(StatusCode, Json<Room>)> {
    claims.require_admin()?;
    validate(&body)?;

    let room = state.services.rooms.create_room(&body).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// Confirmed bookings of a room in a time window
#[utoipa::path(
    get,
    path = "/rooms/{id}/bookings",
    tag = "rooms",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Room ID"),
        RoomScheduleQuery
    ),
    responses(
        (status = 200, description = "Bookings", body = Vec<RoomBooking>),
        (status = 404, description = "Room not found")
    )
)]
pub async fn room_schedule(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(room_id): Path<i32>,
    Query(query): Query<RoomScheduleQuery>,
) -> AppResult<Json<Vec<RoomBooking>>> {
    let bookings = state
        .services
        .rooms
        .room_schedule(room_id, query.from, query.to)
        .await?;
    Ok(Json(bookings))
}

/// Book a room for up to four hours
#[utoipa::path(
    post,
    path = "/rooms/{id}/bookings",
    tag = "rooms",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Room ID")
    ),
    request_body = CreateRoomBooking,
    responses(
        (status = 201, description = "Room booked", body = RoomBooking),
        (status = 400, description = "Invalid time window"),
        (status = 409, description = "Overlaps an existing booking", body = crate::error::ErrorResponse)
    )
)]
pub async fn book_room(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(room_id): Path<i32>,
    Json(body): Json<CreateRoomBooking>,
) -> AppResult<(StatusCode, Json<RoomBooking>)> {
    validate(&body)?;

    let booking = state
        .services
        .rooms
        .book_room(claims.user_id, room_id, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// The caller's room bookings
#[utoipa::path(
    get,
    path = "/room-bookings/mine",
    tag = "rooms",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Bookings", body = Vec<RoomBooking>)
    )
)]
pub async fn my_bookings(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<RoomBooking>>> {
    let bookings = state.services.rooms.list_user_bookings(claims.user_id).await?;
    Ok(Json(bookings))
}

/// Cancel a booking (owner or admin)
#[utoipa::path(
    post,
    path = "/room-bookings/{id}/cancel",
    tag = "rooms",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking cancelled", body = RoomBooking),
        (status = 409, description = "Booking already cancelled", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<RoomBooking>> {
    let booking = state.services.rooms.get_booking(id).await?;
    claims.require_self_or_admin(booking.user_id)?;

    let booking = state.services.rooms.cancel_booking(id).await?;
    Ok(Json(booking))
}
