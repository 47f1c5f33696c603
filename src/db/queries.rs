use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use rusqlite::{params, Connection, ErrorCode};

use crate::models::{
    hhmm, Barber, Booking, BookingDetails, BookingFilter, BookingStatus, BookingUpdate,
    LoyaltyTransaction, PaymentStatus, Service, TransactionType, User,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BOOKING_COLUMNS: &str = "b.id, b.user_id, b.service_id, b.barber_id, b.customer_name, \
     b.customer_email, b.customer_phone, b.booking_date, b.booking_time, b.notes, b.status, \
     b.total_price, b.payment_status, b.created_at, b.updated_at";

fn date_str(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn timestamp_str(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Current UTC time truncated to the stored precision.
pub fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

/// True when `err` is a uniqueness-constraint failure reported by SQLite.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _)) => {
            e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, user_id, service_id, barber_id, customer_name, customer_email,
                               customer_phone, booking_date, booking_time, notes, status,
                               total_price, payment_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            booking.id,
            booking.user_id,
            booking.service_id,
            booking.barber_id,
            booking.customer_name,
            booking.customer_email,
            booking.customer_phone,
            date_str(&booking.booking_date),
            hhmm::format(&booking.booking_time),
            booking.notes,
            booking.status.as_str(),
            booking.total_price,
            booking.payment_status.as_str(),
            timestamp_str(&booking.created_at),
            timestamp_str(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn find_active_by_barber_date_time(
    conn: &Connection,
    barber_id: &str,
    date: &NaiveDate,
    time: &NaiveTime,
) -> anyhow::Result<Option<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b
         WHERE b.barber_id = ?1 AND b.booking_date = ?2 AND b.booking_time = ?3
           AND b.status IN ('pending', 'confirmed')
         LIMIT 1"
    );
    let result = conn.query_row(
        &sql,
        params![barber_id, date_str(date), hhmm::format(time)],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Slot times held by active bookings for one barber on one date.
pub fn find_active_times_by_barber_and_date(
    conn: &Connection,
    barber_id: &str,
    date: &NaiveDate,
) -> anyhow::Result<Vec<NaiveTime>> {
    let mut stmt = conn.prepare(
        "SELECT booking_time FROM bookings
         WHERE barber_id = ?1 AND booking_date = ?2 AND status IN ('pending', 'confirmed')
         ORDER BY booking_time ASC",
    )?;

    let rows = stmt.query_map(params![barber_id, date_str(date)], |row| {
        row.get::<_, String>(0)
    })?;

    let mut times = vec![];
    for row in rows {
        let raw = row?;
        let time = hhmm::parse(&raw).with_context(|| format!("bad booking_time: {raw}"))?;
        times.push(time);
    }
    Ok(times)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_booking_row(row)));

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_booking_details(conn: &Connection, id: &str) -> anyhow::Result<Option<BookingDetails>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS}, s.name, s.duration_minutes, br.name, u.name
         FROM bookings b
         JOIN services s ON s.id = b.service_id
         JOIN barbers br ON br.id = b.barber_id
         LEFT JOIN users u ON u.id = b.user_id
         WHERE b.id = ?1"
    );
    let result = conn.query_row(&sql, params![id], |row| {
        let extras = (
            row.get::<_, String>(15)?,
            row.get::<_, i64>(16)?,
            row.get::<_, String>(17)?,
            row.get::<_, Option<String>>(18)?,
        );
        Ok((parse_booking_row(row), extras))
    });

    match result {
        Ok((booking, (service_name, service_duration_minutes, barber_name, user_name))) => {
            Ok(Some(BookingDetails {
                booking: booking?,
                service_name,
                service_duration_minutes,
                barber_name,
                user_name,
                loyalty_points_awarded: None,
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Moves `id` from `from` to `to`. Returns false when the row is missing or
/// its status has changed since it was read.
pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    from: BookingStatus,
    to: BookingStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), timestamp_str(&now()), id, from.as_str()],
    )?;
    Ok(count > 0)
}

pub fn update_booking_details(
    conn: &Connection,
    id: &str,
    update: &BookingUpdate,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET
           customer_name = COALESCE(?1, customer_name),
           customer_email = COALESCE(?2, customer_email),
           customer_phone = COALESCE(?3, customer_phone),
           notes = COALESCE(?4, notes),
           updated_at = ?5
         WHERE id = ?6",
        params![
            update.customer_name,
            update.customer_email,
            update.customer_phone,
            update.notes,
            timestamp_str(&now()),
            id,
        ],
    )?;
    Ok(count > 0)
}

pub fn update_payment_status(
    conn: &Connection,
    id: &str,
    payment_status: PaymentStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET payment_status = ?1, updated_at = ?2 WHERE id = ?3",
        params![payment_status.as_str(), timestamp_str(&now()), id],
    )?;
    Ok(count > 0)
}

pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>> {
    let mut clauses: Vec<String> = vec![];
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(status) = filter.status {
        values.push(Box::new(status.as_str()));
        clauses.push(format!("b.status = ?{}", values.len()));
    }
    if let Some(barber_id) = &filter.barber_id {
        values.push(Box::new(barber_id.clone()));
        clauses.push(format!("b.barber_id = ?{}", values.len()));
    }
    if let Some(date) = &filter.date {
        values.push(Box::new(date_str(date)));
        clauses.push(format!("b.booking_date = ?{}", values.len()));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    values.push(Box::new(filter.limit.unwrap_or(50)));
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b {where_clause}
         ORDER BY b.booking_date DESC, b.booking_time DESC LIMIT ?{}",
        values.len()
    );

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let booking_date_str: String = row.get(7)?;
    let booking_time_str: String = row.get(8)?;
    let status_str: String = row.get(10)?;
    let payment_status_str: String = row.get(12)?;
    let created_at_str: String = row.get(13)?;
    let updated_at_str: String = row.get(14)?;

    let booking_date = NaiveDate::parse_from_str(&booking_date_str, DATE_FORMAT)
        .with_context(|| format!("bad booking_date: {booking_date_str}"))?;
    let booking_time = hhmm::parse(&booking_time_str)
        .with_context(|| format!("bad booking_time: {booking_time_str}"))?;
    let status = BookingStatus::parse(&status_str)
        .with_context(|| format!("bad status: {status_str}"))?;
    let payment_status = PaymentStatus::parse(&payment_status_str)
        .with_context(|| format!("bad payment_status: {payment_status_str}"))?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TIMESTAMP_FORMAT)
        .with_context(|| format!("bad created_at: {created_at_str}"))?;
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, TIMESTAMP_FORMAT)
        .with_context(|| format!("bad updated_at: {updated_at_str}"))?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        service_id: row.get(2)?,
        barber_id: row.get(3)?,
        customer_name: row.get(4)?,
        customer_email: row.get(5)?,
        customer_phone: row.get(6)?,
        booking_date,
        booking_time,
        notes: row.get(9)?,
        status,
        total_price: row.get(11)?,
        payment_status,
        created_at,
        updated_at,
    })
}

// ── Catalog ──

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        "SELECT id, name, price, duration_minutes, is_active FROM services WHERE id = ?1",
        params![id],
        |row| {
            Ok(Service {
                id: row.get(0)?,
                name: row.get(1)?,
                price: row.get(2)?,
                duration_minutes: row.get(3)?,
                is_active: row.get::<_, i32>(4)? != 0,
            })
        },
    );

    match result {
        Ok(service) => Ok(Some(service)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_service(conn: &Connection, service: &Service) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO services (id, name, price, duration_minutes, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           price = excluded.price,
           duration_minutes = excluded.duration_minutes,
           is_active = excluded.is_active",
        params![
            service.id,
            service.name,
            service.price,
            service.duration_minutes,
            service.is_active as i32,
        ],
    )?;
    Ok(())
}

pub fn get_barber(conn: &Connection, id: &str) -> anyhow::Result<Option<Barber>> {
    let result = conn.query_row(
        "SELECT id, name, is_available, working_hours FROM barbers WHERE id = ?1",
        params![id],
        |row| {
            Ok(Barber {
                id: row.get(0)?,
                name: row.get(1)?,
                is_available: row.get::<_, i32>(2)? != 0,
                working_hours: row.get(3)?,
            })
        },
    );

    match result {
        Ok(barber) => Ok(Some(barber)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_barber(conn: &Connection, barber: &Barber) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO barbers (id, name, is_available, working_hours)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           is_available = excluded.is_available,
           working_hours = excluded.working_hours",
        params![
            barber.id,
            barber.name,
            barber.is_available as i32,
            barber.working_hours,
        ],
    )?;
    Ok(())
}

// ── Users ──

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let result = conn.query_row(
        "SELECT id, name, email, loyalty_points FROM users WHERE id = ?1",
        params![id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                loyalty_points: row.get(3)?,
            })
        },
    );

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, loyalty_points)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           email = excluded.email,
           updated_at = datetime('now')",
        params![user.id, user.name, user.email, user.loyalty_points],
    )?;
    Ok(())
}

pub fn add_loyalty_points(conn: &Connection, user_id: &str, points: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE users SET loyalty_points = loyalty_points + ?1, updated_at = datetime('now')
         WHERE id = ?2",
        params![points, user_id],
    )?;
    Ok(count > 0)
}

// ── Loyalty Ledger ──

/// Appends `tx` unless an entry with the same reference already exists.
/// Returns whether a row was written.
pub fn insert_loyalty_transaction(
    conn: &Connection,
    tx: &LoyaltyTransaction,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT INTO loyalty_transactions
           (id, user_id, type, points, description, reference_id, reference_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT DO NOTHING",
        params![
            tx.id,
            tx.user_id,
            tx.kind.as_str(),
            tx.points,
            tx.description,
            tx.reference_id,
            tx.reference_type,
            timestamp_str(&tx.created_at),
        ],
    )?;
    Ok(count > 0)
}

pub fn get_loyalty_transactions(
    conn: &Connection,
    user_id: &str,
) -> anyhow::Result<Vec<LoyaltyTransaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, type, points, description, reference_id, reference_type, created_at
         FROM loyalty_transactions WHERE user_id = ?1
         ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map(params![user_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut transactions = vec![];
    for row in rows {
        let (id, user_id, kind, points, description, reference_id, reference_type, created_at) =
            row?;
        transactions.push(LoyaltyTransaction {
            id,
            user_id,
            kind: TransactionType::parse(&kind)
                .with_context(|| format!("bad transaction type: {kind}"))?,
            points,
            description,
            reference_id,
            reference_type,
            created_at: NaiveDateTime::parse_from_str(&created_at, TIMESTAMP_FORMAT)
                .with_context(|| format!("bad created_at: {created_at}"))?,
        });
    }
    Ok(transactions)
}

/// Registered-customer bookings worth at least `min_price` that have no
/// ledger entry referencing them.
pub fn find_unawarded_bookings(conn: &Connection, min_price: i64) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b
         WHERE b.user_id IS NOT NULL AND b.total_price >= ?1
           AND NOT EXISTS (
             SELECT 1 FROM loyalty_transactions lt
             WHERE lt.reference_id = b.id AND lt.reference_type = 'booking'
           )
         ORDER BY b.created_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![min_price], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}
