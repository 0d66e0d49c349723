//! UniLib lending server
//!
//! REST JSON API for a university library: member approval, borrowing and
//! returns, fines, hold queues, due date extensions, acquisition requests and
//! study room bookings, plus the periodic sweeps that keep them consistent.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
