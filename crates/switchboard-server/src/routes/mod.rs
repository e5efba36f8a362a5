//! API routes

use axum::Router;

use crate::AppState;

mod chat;
mod sessions;

/// Build the API router with all session endpoints
pub fn api_router() -> Router<AppState> {
    Router::new().nest("/sessions", sessions::router())
}
