//! Study rooms and bookings repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::RoomBookingStatus,
        room::{CreateRoom, NewRoomBooking, Room, RoomBooking},
    },
};

#[async_trait]
pub trait RoomsRepository: Send + Sync {
    async fn list_rooms(&self) -> AppResult<Vec<Room>>;

    async fn get_room(&self, id: i32) -> AppResult<Room>;

    async fn create_room(&self, room: &CreateRoom) -> AppResult<Room>;

    async fn get_booking(&self, id: i32) -> AppResult<RoomBooking>;

    async fn list_bookings_for_user(&self, user_id: i32) -> AppResult<Vec<RoomBooking>>;

    /// CONFIRMED bookings of a room intersecting `[from, to)`
    async fn list_bookings_for_room(
        &self,
        room_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<RoomBooking>>;

    /// Insert a CONFIRMED booking unless it overlaps another CONFIRMED booking
    /// of the same room (None). Serialized per room.
    async fn create_booking(&self, booking: &NewRoomBooking) -> AppResult<Option<RoomBooking>>;

    /// CONFIRMED -> CANCELLED
    async fn cancel_booking(&self, id: i32) -> AppResult<Option<RoomBooking>>;
}

#[derive(Clone)]
pub struct PgRoomsRepository {
    pool: Pool<Postgres>,
}

impl PgRoomsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomsRepository for PgRoomsRepository {
    async fn list_rooms(&self) -> AppResult<Vec<Room>> {
        let rooms = sqlx::query_as::<_, Room>("SELECT * FROM rooms ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rooms)
    }

    async fn get_room(&self, id: i32) -> AppResult<Room> {
        sqlx::query_as::<_, Room>("SELECT * FROM rooms WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room with id {} not found", id)))
    }

    async fn create_room(&self, room: &CreateRoom) -> AppResult<Room> {
        sqlx::query_as::<_, Room>(
            "INSERT INTO rooms (name, capacity, location) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&room.name)
        .bind(room.capacity)
        .bind(&room.location)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, "A room with this name already exists"))
    }

    async fn get_booking(&self, id: i32) -> AppResult<RoomBooking> {
        sqlx::query_as::<_, RoomBooking>("SELECT * FROM room_bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room booking with id {} not found", id)))
    }

    async fn list_bookings_for_user(&self, user_id: i32) -> AppResult<Vec<RoomBooking>> {
        let bookings = sqlx::query_as::<_, RoomBooking>(
            "SELECT * FROM room_bookings WHERE user_id = $1 ORDER BY start_time DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn list_bookings_for_room(
        &self,
        room_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<RoomBooking>> {
        let bookings = sqlx::query_as::<_, RoomBooking>(
            r#"
            SELECT * FROM room_bookings
            WHERE room_id = $1 AND status = $2 AND start_time < $4 AND end_time > $3
            ORDER BY start_time, id
            "#,
        )
        .bind(room_id)
        .bind(RoomBookingStatus::Confirmed)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn create_booking(&self, booking: &NewRoomBooking) -> AppResult<Option<RoomBooking>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM rooms WHERE id = $1 FOR UPDATE")
            .bind(booking.room_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Room with id {} not found", booking.room_id)))?;

        let overlapping: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM room_bookings
                WHERE room_id = $1 AND status = $2 AND start_time < $4 AND end_time > $3
            )
            "#,
        )
        .bind(booking.room_id)
        .bind(RoomBookingStatus::Confirmed)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .fetch_one(&mut *tx)
        .await?;

        if overlapping {
            tx.rollback().await?;
            return Ok(None);
        }

        let created = sqlx::query_as::<_, RoomBooking>(
            r#"
            INSERT INTO room_bookings (room_id, user_id, start_time, end_time, purpose, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(booking.room_id)
        .bind(booking.user_id)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(&booking.purpose)
        .bind(RoomBookingStatus::Confirmed)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(created))
    }

    async fn cancel_booking(&self, id: i32) -> AppResult<Option<RoomBooking>> {
        let booking = sqlx::query_as::<_, RoomBooking>(
            "UPDATE room_bookings SET status = $1 WHERE id = $2 AND status = $3 RETURNING *",
        )
        .bind(RoomBookingStatus::Cancelled)
        .bind(id)
        .bind(RoomBookingStatus::Confirmed)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }
}
