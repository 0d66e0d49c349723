//! Data models for the lending core

pub mod book;
pub mod book_request;
pub mod borrow;
pub mod eligibility;
pub mod enums;
pub mod extension;
pub mod fine;
pub mod hold;
pub mod room;
pub mod sweep;
pub mod user;

// Re-export commonly used types
pub use book::Book;
pub use book_request::BookRequest;
pub use borrow::BorrowRecord;
pub use eligibility::Eligibility;
pub use enums::{
    BookRequestStatus, BorrowStatus, ExtensionStatus, FineStatus, FineType, HoldStatus,
    RoomBookingStatus, UserRole, UserStatus,
};
pub use extension::ExtensionRequest;
pub use fine::Fine;
pub use hold::BookHold;
pub use room::{Room, RoomBooking};
pub use sweep::SweepReport;
pub use user::User;
