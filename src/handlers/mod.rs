pub mod admin;
pub mod bookings;
pub mod calendar;
pub mod health;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/availability", get(bookings::get_availability))
        .route("/api/bookings", post(bookings::create_booking))
        .route("/api/bookings/:id", get(bookings::get_booking))
        .route("/api/admin/bookings", get(admin::get_bookings))
        .route("/api/admin/bookings/:id", patch(admin::update_booking))
        .route("/api/admin/bookings/:id/status", post(admin::update_status))
        .route("/api/admin/bookings/:id/cancel", post(admin::cancel_booking))
        .route("/api/admin/bookings/:id/payment", post(admin::update_payment))
        .route("/api/admin/loyalty/reconcile", post(admin::reconcile_loyalty))
        .route("/api/admin/users/:id/loyalty", get(admin::get_loyalty))
        .route("/calendar/:booking_id", get(calendar::download_ics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
