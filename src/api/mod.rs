//! API layer
//!
//! HTTP handlers for:
//! - User info
//! - Calendar muxes
//! - Metrics (Prometheus)
//!
//! Everything here requires a bearer session token.

mod calendar_mux;
mod dto;
pub mod metrics;
mod users;

pub use dto::*;
pub use metrics::metrics_router;

use axum::{
    Router, middleware,
    routing::{delete, get},
};

use crate::AppState;
use crate::auth::require_auth;

/// Create the `/api` router
///
/// Routes:
/// - GET /userinfo
/// - POST, GET /calendar-mux
/// - DELETE /calendar-mux/:id
pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/userinfo", get(users::get_userinfo))
        .route(
            "/calendar-mux",
            get(calendar_mux::list_calendar_muxes).post(calendar_mux::create_calendar_mux),
        )
        .route("/calendar-mux/:id", delete(calendar_mux::delete_calendar_mux))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
