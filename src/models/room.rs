//! Study room and room booking models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::RoomBookingStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Room {
    pub id: i32,
    pub name: String,
    pub capacity: i32,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateRoom {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(range(min = 1, message = "Capacity must be positive"))]
    pub capacity: i32,
    pub location: Option<String>,
}

/// Reservation of a room over `[start_time, end_time)`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RoomBooking {
    pub id: i32,
    pub room_id: i32,
    pub user_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub purpose: Option<String>,
    pub status: RoomBookingStatus,
    pub created_at: DateTime<Utc>,
}

impl RoomBooking {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.status == RoomBookingStatus::Confirmed && self.start_time < end && start < self.end_time
    }
}

#[derive(Debug, Clone)]
pub struct NewRoomBooking {
    pub room_id: i32,
    pub user_id: i32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub purpose: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateRoomBooking {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(length(max = 500))]
    pub purpose: Option<String>,
}

/// Time window for a room schedule
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct RoomScheduleQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}
