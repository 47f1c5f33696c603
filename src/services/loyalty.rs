use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{Booking, LoyaltySummary, LoyaltyTransaction, ReconcileReport, TransactionType};

/// One point per this many minor currency units, remainder discarded.
pub const MINOR_UNITS_PER_POINT: i64 = 10_000;

pub const BOOKING_REFERENCE: &str = "booking";

pub fn points_for(total_price: i64) -> i64 {
    if total_price <= 0 {
        return 0;
    }
    total_price / MINOR_UNITS_PER_POINT
}

/// Records the `earn` entry for `booking` and credits the customer's balance
/// in one transaction. Keyed on the booking id, so repeating the call awards
/// nothing. Returns the points credited by this call.
pub fn award_for_booking(conn: &Connection, booking: &Booking) -> AppResult<i64> {
    let Some(user_id) = booking.user_id.as_deref() else {
        return Ok(0);
    };
    let points = points_for(booking.total_price);
    // Bookings under one point leave no ledger entry; the balance is unchanged either way.
    if points == 0 {
        return Ok(0);
    }

    let entry = LoyaltyTransaction {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        kind: TransactionType::Earn,
        points,
        description: format!("Earned for booking {}", booking.id),
        reference_id: Some(booking.id.clone()),
        reference_type: Some(BOOKING_REFERENCE.to_string()),
        created_at: queries::now(),
    };

    let tx = conn.unchecked_transaction()?;
    if !queries::insert_loyalty_transaction(&tx, &entry)? {
        tracing::debug!(booking_id = %booking.id, "loyalty points already awarded");
        return Ok(0);
    }
    if !queries::add_loyalty_points(&tx, user_id, points)? {
        return Err(AppError::UserNotFound(user_id.to_string()));
    }
    tx.commit()?;

    tracing::info!(booking_id = %booking.id, user_id, points, "loyalty points awarded");
    Ok(points)
}

/// Awards points for bookings whose award never landed.
pub fn reconcile(conn: &Connection) -> AppResult<ReconcileReport> {
    let missing = queries::find_unawarded_bookings(conn, MINOR_UNITS_PER_POINT)?;
    let mut report = ReconcileReport {
        scanned: missing.len(),
        ..Default::default()
    };

    for booking in &missing {
        match award_for_booking(conn, booking) {
            Ok(0) => {}
            Ok(points) => {
                report.repaired += 1;
                report.points_awarded += points;
            }
            Err(e) => {
                tracing::warn!(booking_id = %booking.id, error = %e, "loyalty repair failed");
            }
        }
    }

    if report.repaired > 0 {
        tracing::info!(
            repaired = report.repaired,
            points = report.points_awarded,
            "loyalty reconciliation repaired awards"
        );
    }
    Ok(report)
}

pub fn loyalty_summary(conn: &Connection, user_id: &str) -> AppResult<LoyaltySummary> {
    let user = queries::get_user(conn, user_id)?
        .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;
    let transactions = queries::get_loyalty_transactions(conn, user_id)?;

    Ok(LoyaltySummary {
        user_id: user.id,
        balance: user.loyalty_points,
        transactions,
    })
}
