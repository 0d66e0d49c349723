//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    book_requests, books, borrows, extensions, fines, health, holds, rooms, sweeps, users,
    PaginatedResponse,
};
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "UniLib API",
        version = "0.1.0",
        description = "University library lending REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Users
        users::register,
        users::list_users,
        users::get_user,
        users::approve_user,
        users::reject_user,
        users::get_eligibility,
        users::apply_eligibility,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::set_total_copies,
        // Borrows
        borrows::borrow_book,
        borrows::my_borrows,
        borrows::list_borrows,
        borrows::change_status,
        // Fines
        fines::my_fines,
        fines::list_fines,
        fines::unpaid_summary,
        fines::pay_fine,
        fines::waive_fine,
        fines::assess_damage,
        // Holds
        holds::place_hold,
        holds::my_holds,
        holds::book_queue,
        holds::cancel_hold,
        holds::fulfill_hold,
        // Extensions
        extensions::create_extension,
        extensions::my_extensions,
        extensions::list_extensions,
        extensions::decide_extension,
        // Book requests
        book_requests::create_book_request,
        book_requests::my_book_requests,
        book_requests::list_book_requests,
        book_requests::decide_book_request,
        // Rooms
        rooms::list_rooms,
        rooms::create_room,
        rooms::room_schedule,
        rooms::book_room,
        rooms::my_bookings,
        rooms::cancel_booking,
        // Sweeps
        sweeps::sweep_overdue,
        sweeps::sweep_lost_books,
        sweeps::sweep_expired_holds,
    ),
    components(
        schemas(
            // Enums
            models::UserStatus,
            models::UserRole,
            models::BorrowStatus,
            models::FineType,
            models::FineStatus,
            models::HoldStatus,
            models::ExtensionStatus,
            models::BookRequestStatus,
            models::RoomBookingStatus,
            // Users
            models::user::User,
            models::user::CreateUser,
            models::eligibility::Eligibility,
            // Books
            models::book::Book,
            models::book::CreateBook,
            models::book::UpdateCopies,
            // Borrows
            models::borrow::BorrowRecord,
            models::borrow::CreateBorrow,
            models::borrow::ChangeBorrowStatus,
            // Fines
            models::fine::Fine,
            models::fine::UnpaidFines,
            models::fine::WaiveFine,
            models::fine::AssessDamage,
            // Holds
            models::hold::BookHold,
            models::hold::HoldWithPosition,
            models::hold::CreateHold,
            // Extensions
            models::extension::ExtensionRequest,
            models::extension::CreateExtension,
            models::extension::DecideExtension,
            models::extension::ExtensionDecision,
            // Book requests
            models::book_request::BookRequest,
            models::book_request::CreateBookRequest,
            models::book_request::DecideBookRequest,
            // Rooms
            models::room::Room,
            models::room::CreateRoom,
            models::room::RoomBooking,
            models::room::CreateRoomBooking,
            // Sweeps
            models::sweep::SweepReport,
            // Pages
            PaginatedResponse<models::book::Book>,
            PaginatedResponse<models::user::User>,
            PaginatedResponse<models::borrow::BorrowRecord>,
            PaginatedResponse<models::fine::Fine>,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "Registration, approval and eligibility"),
        (name = "books", description = "Catalog and copy counts"),
        (name = "borrows", description = "Checkouts and returns"),
        (name = "fines", description = "Overdue, lost and damage fines"),
        (name = "holds", description = "Waitlists for unavailable books"),
        (name = "extensions", description = "Due date extension requests"),
        (name = "book-requests", description = "Acquisition suggestions"),
        (name = "rooms", description = "Study room bookings"),
        (name = "sweeps", description = "Scheduled maintenance jobs")
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
