use chrono::{Datelike, NaiveDate, NaiveTime};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::{Booking, BookingDetails, BookingStatus, NewBooking, PaymentStatus};
use crate::services::{availability, loyalty, slots};

/// Whether an active booking already holds this exact barber slot.
pub fn is_slot_taken(
    conn: &Connection,
    barber_id: &str,
    date: &NaiveDate,
    time: &NaiveTime,
) -> AppResult<bool> {
    Ok(queries::find_active_by_barber_date_time(conn, barber_id, date, time)?.is_some())
}

/// Admits a booking request and stores it as `pending`.
///
/// The lookup in [`is_slot_taken`] only gives early feedback; the partial
/// unique index on active bookings decides races between concurrent
/// submissions, and its violation is reported as the same `SlotUnavailable`.
/// Loyalty points are awarded afterwards on a best-effort basis: a ledger
/// failure is logged and left for [`loyalty::reconcile`].
pub fn create_booking(conn: &Connection, request: NewBooking) -> AppResult<BookingDetails> {
    request.validate()?;

    let service = match queries::get_service(conn, &request.service_id)? {
        Some(service) if service.is_active => service,
        _ => return Err(AppError::ServiceUnavailable(request.service_id)),
    };

    let barber = match queries::get_barber(conn, &request.barber_id)? {
        Some(barber) if barber.is_available => barber,
        _ => return Err(AppError::BarberUnavailable(request.barber_id)),
    };

    if let Some(user_id) = &request.user_id {
        if queries::get_user(conn, user_id)?.is_none() {
            return Err(AppError::UserNotFound(user_id.clone()));
        }
    }

    let date = request.booking_date;
    let time = request.booking_time;
    let catalog = slots::slots_for_barber(&barber, date.weekday())?;

    if !catalog.contains(&time) || is_slot_taken(conn, &barber.id, &date, &time)? {
        tracing::info!(barber_id = %barber.id, %date, %time, "requested slot not available");
        return Err(slot_unavailable(conn, &barber.id, date, time, catalog)?);
    }

    let now = queries::now();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        user_id: request.user_id,
        service_id: service.id,
        barber_id: barber.id,
        customer_name: request.customer_name.trim().to_string(),
        customer_email: request.customer_email.trim().to_string(),
        customer_phone: request.customer_phone.trim().to_string(),
        booking_date: date,
        booking_time: time,
        notes: request.notes,
        status: BookingStatus::Pending,
        total_price: service.price,
        payment_status: PaymentStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    insert_admitted(conn, &booking, catalog)?;

    tracing::info!(
        booking_id = %booking.id,
        barber_id = %booking.barber_id,
        %date,
        %time,
        total_price = booking.total_price,
        "booking created"
    );

    let awarded = match booking.user_id {
        Some(_) => match loyalty::award_for_booking(conn, &booking) {
            Ok(points) => Some(points),
            Err(e) => {
                tracing::warn!(booking_id = %booking.id, error = %e, "loyalty award failed, left for reconciliation");
                None
            }
        },
        None => None,
    };

    let mut details = queries::get_booking_details(conn, &booking.id)?
        .ok_or_else(|| AppError::BookingNotFound(booking.id.clone()))?;
    details.loyalty_points_awarded = awarded;
    Ok(details)
}

/// Stores a booking that passed the pre-check. The active-slot index has the
/// final say: losing the slot to a concurrent submission is `SlotUnavailable`.
fn insert_admitted(conn: &Connection, booking: &Booking, catalog: Vec<NaiveTime>) -> AppResult<()> {
    let Err(e) = queries::insert_booking(conn, booking) else {
        return Ok(());
    };
    if !queries::is_unique_violation(&e) {
        return Err(e.into());
    }

    let (date, time) = (booking.booking_date, booking.booking_time);
    tracing::info!(barber_id = %booking.barber_id, %date, %time, "slot taken by a concurrent booking");
    Err(slot_unavailable(conn, &booking.barber_id, date, time, catalog)?)
}

fn slot_unavailable(
    conn: &Connection,
    barber_id: &str,
    date: NaiveDate,
    time: NaiveTime,
    catalog: Vec<NaiveTime>,
) -> AppResult<AppError> {
    let occupied = queries::find_active_times_by_barber_and_date(conn, barber_id, &date)?;
    Ok(AppError::SlotUnavailable {
        barber_id: barber_id.to_string(),
        date,
        time,
        available: availability::remaining(catalog, &occupied),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::BookingFilter;
    use crate::services::lifecycle;
    use crate::services::test_support::{d, insert_booking_at, request, seed_catalog, setup_db, t};
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn booking_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_create_snapshots_price_and_starts_pending() {
        let conn = setup_db();
        let details = create_booking(&conn, request("B1", "2024-06-01", "14:00", "S1")).unwrap();

        assert_eq!(details.booking.status, BookingStatus::Pending);
        assert_eq!(details.booking.payment_status, PaymentStatus::Pending);
        assert_eq!(details.booking.total_price, 85_000);
        assert_eq!(details.service_name, "Classic Haircut");
        assert_eq!(details.barber_name, "Andre");
        assert!(details.user_name.is_none());
        assert!(details.loyalty_points_awarded.is_none());

        // later price changes do not touch the booking
        conn.execute("UPDATE services SET price = 99000 WHERE id = 'S1'", [])
            .unwrap();
        let stored = queries::get_booking_by_id(&conn, &details.booking.id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.total_price, 85_000);
    }

    #[test]
    fn test_conflict_is_rejected_without_writing() {
        let conn = setup_db();
        insert_booking_at(&conn, "bk-1", "B1", "2024-06-01", "14:00", BookingStatus::Confirmed);

        let err = create_booking(&conn, request("B1", "2024-06-01", "14:00", "S1")).unwrap_err();
        match err {
            AppError::SlotUnavailable { barber_id, time, available, .. } => {
                assert_eq!(barber_id, "B1");
                assert_eq!(time, t("14:00"));
                assert_eq!(available.len(), 23);
                assert!(!available.contains(&t("14:00")));
            }
            other => panic!("expected SlotUnavailable, got {other:?}"),
        }
        assert_eq!(booking_count(&conn), 1);
    }

    #[test]
    fn test_same_time_with_other_barber_is_fine() {
        let conn = setup_db();
        insert_booking_at(&conn, "bk-1", "B1", "2024-06-03", "13:00", BookingStatus::Pending);
        assert!(create_booking(&conn, request("B3", "2024-06-03", "13:00", "S1")).is_ok());
    }

    #[test]
    fn test_cancelled_slot_can_be_booked_again() {
        let conn = setup_db();
        let first = create_booking(&conn, request("B1", "2024-06-01", "14:00", "S1")).unwrap();
        lifecycle::cancel(&conn, &first.booking.id).unwrap();

        let second = create_booking(&conn, request("B1", "2024-06-01", "14:00", "S1")).unwrap();
        assert_ne!(first.booking.id, second.booking.id);

        let all = queries::list_bookings(&conn, &BookingFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_storage_rejects_second_active_booking() {
        let conn = setup_db();
        insert_booking_at(&conn, "bk-1", "B1", "2024-06-01", "14:00", BookingStatus::Pending);

        let mut duplicate = queries::get_booking_by_id(&conn, "bk-1").unwrap().unwrap();
        duplicate.id = "bk-2".to_string();
        let err = queries::insert_booking(&conn, &duplicate).unwrap_err();
        assert!(queries::is_unique_violation(&err));

        // a finished booking on the same slot is not constrained
        duplicate.status = BookingStatus::Cancelled;
        queries::insert_booking(&conn, &duplicate).unwrap();
    }

    #[test]
    fn test_index_violation_reoffers_open_slots() {
        let conn = setup_db();
        insert_booking_at(&conn, "bk-1", "B1", "2024-06-01", "14:00", BookingStatus::Confirmed);
        insert_booking_at(&conn, "bk-2", "B1", "2024-06-01", "15:00", BookingStatus::Pending);

        // same slot as bk-1, as if its pre-check ran before bk-1 was stored
        let mut late = queries::get_booking_by_id(&conn, "bk-1").unwrap().unwrap();
        late.id = "bk-late".to_string();
        late.status = BookingStatus::Pending;

        match insert_admitted(&conn, &late, slots::all_slots().to_vec()).unwrap_err() {
            AppError::SlotUnavailable {
                barber_id,
                date,
                time,
                available,
            } => {
                assert_eq!(barber_id, "B1");
                assert_eq!(date, d("2024-06-01"));
                assert_eq!(time, t("14:00"));
                assert_eq!(available.len(), 22);
                assert!(!available.contains(&t("14:00")));
                assert!(!available.contains(&t("15:00")));
            }
            other => panic!("expected SlotUnavailable, got {other:?}"),
        }
        assert!(queries::get_booking_by_id(&conn, "bk-late").unwrap().is_none());
    }

    #[test]
    fn test_other_insert_failures_are_storage_errors() {
        let conn = setup_db();
        insert_booking_at(&conn, "bk-1", "B1", "2024-06-01", "14:00", BookingStatus::Pending);

        let mut orphan = queries::get_booking_by_id(&conn, "bk-1").unwrap().unwrap();
        orphan.id = "bk-orphan".to_string();
        orphan.booking_time = t("16:00");
        orphan.service_id = "missing".to_string();

        let err = insert_admitted(&conn, &orphan, slots::all_slots().to_vec()).unwrap_err();
        assert!(matches!(err, AppError::Storage(_)), "{err:?}");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_concurrent_submissions_for_one_slot() {
        const SUBMITTERS: usize = 4;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.db").to_str().unwrap().to_string();
        seed_catalog(&db::init_db(&path).unwrap());

        for (round, &time) in slots::all_slots().iter().take(8).enumerate() {
            let barrier = Arc::new(Barrier::new(SUBMITTERS));
            let handles: Vec<_> = (0..SUBMITTERS)
                .map(|_| {
                    let path = path.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        let conn = db::init_db(&path).unwrap();
                        let mut req = request("B1", "2024-06-01", "09:00", "S1");
                        req.booking_time = time;
                        barrier.wait();
                        create_booking(&conn, req)
                    })
                })
                .collect();
            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "round {round}");
            for err in results.into_iter().filter_map(Result::err) {
                match err {
                    AppError::SlotUnavailable {
                        time: lost, available, ..
                    } => {
                        assert_eq!(lost, time);
                        assert!(!available.contains(&time));
                        // one slot taken per finished round, including this one
                        assert_eq!(available.len(), slots::all_slots().len() - round - 1);
                    }
                    other => panic!("round {round}: expected SlotUnavailable, got {other:?}"),
                }
            }
        }

        let conn = db::init_db(&path).unwrap();
        let active = queries::find_active_times_by_barber_and_date(&conn, "B1", &d("2024-06-01"))
            .unwrap();
        assert_eq!(active, slots::all_slots()[..8].to_vec());
    }

    #[test]
    fn test_slot_outside_catalog_is_unavailable() {
        let conn = setup_db();
        for time in ["08:30", "21:00", "14:15"] {
            let err = create_booking(&conn, request("B1", "2024-06-01", time, "S1")).unwrap_err();
            assert!(matches!(err, AppError::SlotUnavailable { .. }), "{time}");
        }
        // B3 only works Mondays 12:00-15:00
        let err = create_booking(&conn, request("B3", "2024-06-03", "10:00", "S1")).unwrap_err();
        match err {
            AppError::SlotUnavailable { available, .. } => assert_eq!(available.len(), 6),
            other => panic!("expected SlotUnavailable, got {other:?}"),
        }
        assert_eq!(booking_count(&conn), 0);
    }

    #[test]
    fn test_inactive_or_missing_service() {
        let conn = setup_db();
        for service_id in ["S2", "missing"] {
            let err = create_booking(&conn, request("B1", "2024-06-01", "10:00", service_id))
                .unwrap_err();
            assert!(matches!(err, AppError::ServiceUnavailable(ref id) if id == service_id));
        }
    }

    #[test]
    fn test_unavailable_or_missing_barber() {
        let conn = setup_db();
        for barber_id in ["B2", "missing"] {
            let err = create_booking(&conn, request(barber_id, "2024-06-01", "10:00", "S1"))
                .unwrap_err();
            assert!(matches!(err, AppError::BarberUnavailable(ref id) if id == barber_id));
        }
    }

    #[test]
    fn test_unknown_user_is_rejected() {
        let conn = setup_db();
        let mut req = request("B1", "2024-06-01", "10:00", "S1");
        req.user_id = Some("ghost".to_string());
        assert!(matches!(create_booking(&conn, req), Err(AppError::UserNotFound(_))));
        assert_eq!(booking_count(&conn), 0);
    }

    #[test]
    fn test_validation_errors_are_not_retryable() {
        let conn = setup_db();
        insert_booking_at(&conn, "bk-1", "B1", "2024-06-01", "14:00", BookingStatus::Pending);
        let err = create_booking(&conn, request("B1", "2024-06-01", "14:00", "S1")).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_is_slot_taken() {
        let conn = setup_db();
        insert_booking_at(&conn, "bk-1", "B1", "2024-06-01", "14:00", BookingStatus::Confirmed);
        assert!(is_slot_taken(&conn, "B1", &d("2024-06-01"), &t("14:00")).unwrap());
        assert!(!is_slot_taken(&conn, "B1", &d("2024-06-01"), &t("14:30")).unwrap());

        lifecycle::transition(&conn, "bk-1", BookingStatus::Completed).unwrap();
        assert!(!is_slot_taken(&conn, "B1", &d("2024-06-01"), &t("14:00")).unwrap());
    }
}
