use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, NaiveTime};
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::services::slots;

/// Slots still bookable for `barber_id` on `date`, in catalog order.
/// Rejecting past dates is left to the caller.
pub fn available_slots(
    conn: &Connection,
    barber_id: &str,
    date: &NaiveDate,
) -> AppResult<Vec<NaiveTime>> {
    let barber = queries::get_barber(conn, barber_id)?
        .ok_or_else(|| AppError::BarberUnavailable(barber_id.to_string()))?;
    let catalog = slots::slots_for_barber(&barber, date.weekday())?;
    let occupied = queries::find_active_times_by_barber_and_date(conn, &barber.id, date)?;

    Ok(remaining(catalog, &occupied))
}

pub(crate) fn remaining(catalog: Vec<NaiveTime>, occupied: &[NaiveTime]) -> Vec<NaiveTime> {
    let occupied: HashSet<&NaiveTime> = occupied.iter().collect();
    catalog
        .into_iter()
        .filter(|slot| !occupied.contains(slot))
        .collect()
}
