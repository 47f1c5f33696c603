use std::sync::OnceLock;

use chrono::{NaiveTime, Timelike, Weekday};

use crate::models::{Barber, WorkingHours};

pub const SLOT_MINUTES: u32 = 30;
pub const OPEN_HOUR: u32 = 9;
pub const CLOSE_HOUR: u32 = 21;

const SLOT_SECS: u32 = SLOT_MINUTES * 60;

/// The shop-wide slot list: every half hour from opening, the last one
/// ending at closing time. Built once and never mutated.
pub fn all_slots() -> &'static [NaiveTime] {
    static SLOTS: OnceLock<Vec<NaiveTime>> = OnceLock::new();
    SLOTS.get_or_init(|| grid(OPEN_HOUR * 3600, CLOSE_HOUR * 3600))
}

/// Slots offered on `weekday` under `hours`. Without declared hours the
/// shop-wide list applies; a weekday with no windows offers nothing.
/// Declared windows only select from the shop-wide list, so an off-grid
/// window such as 12:15-14:00 offers 12:30 and 13:00.
pub fn slots_for(hours: Option<&WorkingHours>, weekday: Weekday) -> Vec<NaiveTime> {
    let hours = match hours {
        Some(h) if !h.is_unrestricted() => h,
        _ => return all_slots().to_vec(),
    };

    let windows: Vec<(u32, u32)> = hours
        .windows_for(weekday)
        .into_iter()
        .map(|(start, end)| (start.num_seconds_from_midnight(), end.num_seconds_from_midnight()))
        .collect();

    all_slots()
        .iter()
        .copied()
        .filter(|slot| {
            let s = slot.num_seconds_from_midnight();
            windows
                .iter()
                .any(|&(start, end)| s >= start && s + SLOT_SECS <= end)
        })
        .collect()
}

pub fn slots_for_barber(barber: &Barber, weekday: Weekday) -> anyhow::Result<Vec<NaiveTime>> {
    let hours = barber
        .working_hours
        .as_deref()
        .map(WorkingHours::from_json)
        .transpose()
        .map_err(|e| anyhow::anyhow!("invalid working hours for barber {}: {e}", barber.id))?;
    Ok(slots_for(hours.as_ref(), weekday))
}

fn grid(start_secs: u32, end_secs: u32) -> Vec<NaiveTime> {
    (start_secs..)
        .step_by(SLOT_SECS as usize)
        .take_while(|s| s + SLOT_SECS <= end_secs)
        .filter_map(|s| NaiveTime::from_num_seconds_from_midnight_opt(s, 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn barber(hours: Option<&str>) -> Barber {
        Barber {
            id: "B1".to_string(),
            name: "Andre".to_string(),
            is_available: true,
            working_hours: hours.map(str::to_string),
        }
    }

    #[test]
    fn test_default_catalog() {
        let slots = all_slots();
        assert_eq!(slots.len(), 24);
        assert_eq!(slots[0], t("09:00"));
        assert_eq!(slots[23], t("20:30"));
        assert!(slots.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_catalog_is_the_same_every_call() {
        assert_eq!(all_slots().as_ptr(), all_slots().as_ptr());
        assert_eq!(slots_for(None, Weekday::Sun), all_slots().to_vec());
    }

    #[test]
    fn test_barber_hours_override_default() {
        let b = barber(Some(
            r#"{"slots":[{"day":"mon","start":"12:00","end":"14:00"},{"day":"mon","start":"16:00","end":"17:15"}]}"#,
        ));
        let slots = slots_for_barber(&b, Weekday::Mon).unwrap();
        assert_eq!(
            slots,
            vec![t("12:00"), t("12:30"), t("13:00"), t("13:30"), t("16:00"), t("16:30")]
        );
    }

    #[test]
    fn test_off_grid_windows_snap_to_shop_slots() {
        let b = barber(Some(
            r#"{"slots":[{"day":"fri","start":"12:15","end":"14:00"},{"day":"fri","start":"20:00","end":"23:00"},{"day":"fri","start":"07:00","end":"09:45"}]}"#,
        ));
        let slots = slots_for_barber(&b, Weekday::Fri).unwrap();
        assert_eq!(
            slots,
            vec![t("09:00"), t("12:30"), t("13:00"), t("13:30"), t("20:00"), t("20:30")]
        );
        assert!(slots.iter().all(|s| all_slots().contains(s)));
    }

    #[test]
    fn test_overlapping_windows_do_not_duplicate() {
        let b = barber(Some(
            r#"{"slots":[{"day":"sat","start":"10:00","end":"12:00"},{"day":"sat","start":"11:00","end":"13:00"}]}"#,
        ));
        let slots = slots_for_barber(&b, Weekday::Sat).unwrap();
        assert_eq!(
            slots,
            vec![t("10:00"), t("10:30"), t("11:00"), t("11:30"), t("12:00"), t("12:30")]
        );
    }

    #[test]
    fn test_day_without_windows_has_no_slots() {
        let b = barber(Some(r#"{"slots":[{"day":"mon","start":"09:00","end":"17:00"}]}"#));
        assert!(slots_for_barber(&b, Weekday::Tue).unwrap().is_empty());
    }

    #[test]
    fn test_empty_hours_fall_back_to_default() {
        let b = barber(Some(r#"{"slots":[]}"#));
        assert_eq!(slots_for_barber(&b, Weekday::Wed).unwrap(), all_slots().to_vec());
    }

    #[test]
    fn test_corrupt_hours_are_an_error() {
        let b = barber(Some("nope"));
        assert!(slots_for_barber(&b, Weekday::Wed).is_err());
    }
}
