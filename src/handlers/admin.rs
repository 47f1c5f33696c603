use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingFilter, BookingStatus, BookingUpdate, LoyaltySummary, PaymentStatus,
    ReconcileReport,
};
use crate::services::{lifecycle, loyalty};
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub barber_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let filter = BookingFilter {
        status: query
            .status
            .as_deref()
            .map(str::parse::<BookingStatus>)
            .transpose()?,
        barber_id: query.barber_id,
        date: query.date,
        limit: Some(query.limit.unwrap_or(50).clamp(1, 500)),
    };

    let bookings = {
        let db = state.conn()?;
        queries::list_bookings(&db, &filter)?
    };

    Ok(Json(bookings))
}

// POST /api/admin/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let next: BookingStatus = body.status.parse()?;

    let booking = {
        let db = state.conn()?;
        lifecycle::transition(&db, &id, next)?
    };

    Ok(Json(booking))
}

// POST /api/admin/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.conn()?;
        lifecycle::cancel(&db, &id)?
    };

    Ok(Json(booking))
}

// PATCH /api/admin/bookings/:id
pub async fn update_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(update): Json<BookingUpdate>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.conn()?;
        lifecycle::update_details(&db, &id, &update)?
    };

    Ok(Json(booking))
}

// POST /api/admin/bookings/:id/payment
#[derive(Deserialize)]
pub struct PaymentRequest {
    pub payment_status: String,
}

pub async fn update_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<PaymentRequest>,
) -> Result<Json<Booking>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let payment_status: PaymentStatus = body.payment_status.parse()?;

    let booking = {
        let db = state.conn()?;
        lifecycle::set_payment_status(&db, &id, payment_status)?
    };

    Ok(Json(booking))
}

// POST /api/admin/loyalty/reconcile
pub async fn reconcile_loyalty(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ReconcileReport>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let report = {
        let db = state.conn()?;
        loyalty::reconcile(&db)?
    };

    Ok(Json(report))
}

// GET /api/admin/users/:id/loyalty
pub async fn get_loyalty(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<LoyaltySummary>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let summary = {
        let db = state.conn()?;
        loyalty::loyalty_summary(&db, &user_id)?
    };

    Ok(Json(summary))
}
