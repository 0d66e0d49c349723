//! Study room reservations

use chrono::{DateTime, Duration, Utc};

use super::{lookup_user, notifications::Notifications};
use crate::{
    error::{AppError, AppResult},
    models::room::{CreateRoom, CreateRoomBooking, NewRoomBooking, Room, RoomBooking},
    repository::Repository,
};

const MAX_BOOKING_HOURS: i64 = 4;

#[derive(Clone)]
pub struct RoomsService {
    repository: Repository,
    notifications: Notifications,
}

impl RoomsService {
    pub fn new(repository: Repository, notifications: Notifications) -> Self {
        Self {
            repository,
            notifications,
        }
    }

    pub async fn list_rooms(&self) -> AppResult<Vec<Room>> {
        self.repository.rooms.list_rooms().await
    }

    pub async fn create_room(&self, room: &CreateRoom) -> AppResult<Room> {
        let created = self.repository.rooms.create_room(room).await?;
        tracing::info!(room_id = created.id, name = %created.name, "Room created");
        Ok(created)
    }

    pub async fn get_booking(&self, id: i32) -> AppResult<RoomBooking> {
        self.repository.rooms.get_booking(id).await
    }

    pub async fn list_user_bookings(&self, user_id: i32) -> AppResult<Vec<RoomBooking>> {
        self.repository.rooms.list_bookings_for_user(user_id).await
    }

    /// CONFIRMED bookings of a room within `[from, to)`
    pub async fn room_schedule(
        &self,
        room_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<RoomBooking>> {
        if from >= to {
            return Err(AppError::Validation("`from` must be before `to`".to_string()));
        }
        self.repository.rooms.get_room(room_id).await?;
        self.repository.rooms.list_bookings_for_room(room_id, from, to).await
    }

    pub async fn book_room(
        &self,
        user_id: i32,
        room_id: i32,
        request: &CreateRoomBooking,
    ) -> AppResult<RoomBooking> {
        let user = self.repository.users.get_by_id(user_id).await?;
        if !user.is_approved() {
            return Err(AppError::BusinessRule(format!(
                "Only approved accounts can book rooms (account is {})",
                user.status
            )));
        }

        if request.start_time >= request.end_time {
            return Err(AppError::Validation("Booking must end after it starts".to_string()));
        }
        if request.start_time <= Utc::now() {
            return Err(AppError::Validation("Booking must start in the future".to_string()));
        }
        if request.end_time - request.start_time > Duration::hours(MAX_BOOKING_HOURS) {
            return Err(AppError::Validation(format!(
                "Bookings are limited to {} hours",
                MAX_BOOKING_HOURS
            )));
        }

        let room = self.repository.rooms.get_room(room_id).await?;
        let booking = self
            .repository
            .rooms
            .create_booking(&NewRoomBooking {
                room_id,
                user_id,
                start_time: request.start_time,
                end_time: request.end_time,
                purpose: request.purpose.clone(),
            })
            .await?
            .ok_or_else(|| AppError::Conflict("Room is already booked for this time".to_string()))?;
        tracing::info!(booking_id = booking.id, room_id, user_id, "Room booked");

        self.notifications.room_booked(&user, &room, &booking).await;
        Ok(booking)
    }

    pub async fn cancel_booking(&self, id: i32) -> AppResult<RoomBooking> {
        let Some(cancelled) = self.repository.rooms.cancel_booking(id).await? else {
            let current = self.repository.rooms.get_booking(id).await?;
            return Err(AppError::state_conflict("Booking is already cancelled", current.status));
        };
        tracing::info!(booking_id = id, room_id = cancelled.room_id, "Room booking cancelled");

        if let (Some(user), Ok(room)) = (
            lookup_user(&self.repository, cancelled.user_id).await,
            self.repository.rooms.get_room(cancelled.room_id).await,
        ) {
            self.notifications
                .room_booking_cancelled(&user, &room, &cancelled)
                .await;
        }

        Ok(cancelled)
    }
}
