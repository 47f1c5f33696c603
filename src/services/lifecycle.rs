use rusqlite::Connection;

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{Booking, BookingStatus, BookingUpdate, PaymentStatus};

fn load(conn: &Connection, booking_id: &str) -> AppResult<Booking> {
    queries::get_booking_by_id(conn, booking_id)?
        .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))
}

/// Moves a booking along `pending -> confirmed -> completed`, or from either
/// active state to `cancelled`.
pub fn transition(conn: &Connection, booking_id: &str, next: BookingStatus) -> AppResult<Booking> {
    let booking = load(conn, booking_id)?;
    let from = booking.status;

    if !from.can_transition_to(next) {
        return Err(AppError::InvalidTransition { from, to: next });
    }

    if !queries::update_booking_status(conn, booking_id, from, next)? {
        // Lost a race with another status change; report against what is stored now.
        let current = load(conn, booking_id)?;
        return Err(AppError::InvalidTransition {
            from: current.status,
            to: next,
        });
    }

    tracing::info!(booking_id, %from, to = %next, "booking status changed");

    load(conn, booking_id)
}

pub fn cancel(conn: &Connection, booking_id: &str) -> AppResult<Booking> {
    transition(conn, booking_id, BookingStatus::Cancelled)
}

/// Updates contact details and notes. Slot, service and price never change.
pub fn update_details(
    conn: &Connection,
    booking_id: &str,
    update: &BookingUpdate,
) -> AppResult<Booking> {
    if update.is_empty() {
        return Err(AppError::Validation("no fields to update".to_string()));
    }
    let contact = [
        ("customer_name", &update.customer_name),
        ("customer_email", &update.customer_email),
        ("customer_phone", &update.customer_phone),
    ];
    for (field, value) in contact {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            return Err(AppError::Validation(format!("{field} must not be empty")));
        }
    }

    if !queries::update_booking_details(conn, booking_id, update)? {
        return Err(AppError::BookingNotFound(booking_id.to_string()));
    }
    tracing::info!(booking_id, "booking details updated");

    load(conn, booking_id)
}

pub fn set_payment_status(
    conn: &Connection,
    booking_id: &str,
    payment_status: PaymentStatus,
) -> AppResult<Booking> {
    if !queries::update_payment_status(conn, booking_id, payment_status)? {
        return Err(AppError::BookingNotFound(booking_id.to_string()));
    }
    tracing::info!(booking_id, payment_status = payment_status.as_str(), "payment status updated");

    load(conn, booking_id)
}
