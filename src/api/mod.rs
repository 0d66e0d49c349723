//! API handlers for the library REST endpoints

pub mod book_requests;
pub mod books;
pub mod borrows;
pub mod extensions;
pub mod fines;
pub mod health;
pub mod holds;
pub mod openapi;
pub mod rooms;
pub mod sweeps;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::user::UserClaims,
    repository::page_window,
    AppState,
};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Items of the requested page
    pub items: Vec<T>,
    /// Total number of matching items
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

impl<T> PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(items: Vec<T>, total: i64, page: Option<i64>, per_page: Option<i64>) -> Self {
        let (limit, offset) = page_window(page, per_page);
        Self {
            items,
            total,
            page: offset / limit + 1,
            per_page: limit,
        }
    }
}

pub(crate) fn validate<T: Validate>(body: &T) -> AppResult<()> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))
}

/// Build the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Users
        .route("/users", get(users::list_users).post(users::register))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/approve", post(users::approve_user))
        .route("/users/:id/reject", post(users::reject_user))
        .route("/users/:id/eligibility", get(users::get_eligibility))
        .route("/users/:id/eligibility/apply", post(users::apply_eligibility))
        .route("/users/:id/fines/summary", get(fines::unpaid_summary))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/:id", get(books::get_book))
        .route("/books/:id/copies", put(books::set_total_copies))
        .route("/books/:id/holds", get(holds::book_queue))
        // Borrows
        .route("/borrows", get(borrows::list_borrows).post(borrows::borrow_book))
        .route("/borrows/mine", get(borrows::my_borrows))
        .route("/borrows/:id/status", put(borrows::change_status))
        // Fines
        .route("/fines", get(fines::list_fines))
        .route("/fines/mine", get(fines::my_fines))
        .route("/fines/damage", post(fines::assess_damage))
        .route("/fines/:id/pay", post(fines::pay_fine))
        .route("/fines/:id/waive", post(fines::waive_fine))
        // Holds
        .route("/holds", post(holds::place_hold))
        .route("/holds/mine", get(holds::my_holds))
        .route("/holds/:id/cancel", post(holds::cancel_hold))
        .route("/holds/:id/fulfill", post(holds::fulfill_hold))
        // Extension requests
        .route(
            "/extensions",
            get(extensions::list_extensions).post(extensions::create_extension),
        )
        .route("/extensions/mine", get(extensions::my_extensions))
        .route("/extensions/:id/decide", post(extensions::decide_extension))
        // Book requests
        .route(
            "/book-requests",
            get(book_requests::list_book_requests).post(book_requests::create_book_request),
        )
        .route("/book-requests/mine", get(book_requests::my_book_requests))
        .route("/book-requests/:id/decide", post(book_requests::decide_book_request))
        // Rooms
        .route("/rooms", get(rooms::list_rooms).post(rooms::create_room))
        .route(
            "/rooms/:id/bookings",
            get(rooms::room_schedule).post(rooms::book_room),
        )
        .route("/room-bookings/mine", get(rooms::my_bookings))
        .route("/room-bookings/:id/cancel", post(rooms::cancel_booking))
        // Sweeps
        .route("/admin/sweeps/overdue", post(sweeps::sweep_overdue))
        .route("/admin/sweeps/lost", post(sweeps::sweep_lost_books))
        .route("/admin/sweeps/holds", post(sweeps::sweep_expired_holds))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
