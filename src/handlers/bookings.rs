use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{hhmm, BookingDetails, NewBooking};
use crate::services::{availability, scheduling};
use crate::state::AppState;

/// Bookings are only taken for today onwards, in the shop's local time.
fn ensure_not_past(date: &NaiveDate) -> Result<(), AppError> {
    let today = Local::now().date_naive();
    if *date < today {
        return Err(AppError::Validation(format!("{date} is in the past")));
    }
    Ok(())
}

// GET /api/availability?date=YYYY-MM-DD&barber_id=...
#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    pub barber_id: String,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    barber_id: String,
    date: NaiveDate,
    slots: Vec<String>,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    ensure_not_past(&query.date)?;

    let slots = {
        let db = state.conn()?;
        availability::available_slots(&db, &query.barber_id, &query.date)?
    };

    Ok(Json(AvailabilityResponse {
        barber_id: query.barber_id,
        date: query.date,
        slots: slots.iter().map(hhmm::format).collect(),
    }))
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewBooking>,
) -> Result<(StatusCode, Json<BookingDetails>), AppError> {
    ensure_not_past(&request.booking_date)?;

    let details = {
        let db = state.conn()?;
        scheduling::create_booking(&db, request)?
    };

    Ok((StatusCode::CREATED, Json(details)))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<BookingDetails>, AppError> {
    let details = {
        let db = state.conn()?;
        queries::get_booking_details(&db, &id)?
    };

    details.map(Json).ok_or(AppError::BookingNotFound(id))
}
