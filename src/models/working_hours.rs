use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::hhmm;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoursWindow {
    pub day: String,
    pub start: String,
    pub end: String,
}

/// A barber's declared weekly hours, stored as JSON on the barber row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkingHours {
    pub slots: Vec<HoursWindow>,
}

impl WorkingHours {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let hours: WorkingHours = serde_json::from_str(s)?;
        for window in &hours.slots {
            parse_weekday(&window.day)?;
            let start = parse_time(&window.start)?;
            let end = parse_time(&window.end)?;
            if end < start {
                return Err(anyhow::anyhow!(
                    "window ends before it starts: {}-{}",
                    window.start,
                    window.end
                ));
            }
        }
        Ok(hours)
    }

    /// No declared windows means the shop's default hours apply.
    pub fn is_unrestricted(&self) -> bool {
        self.slots.is_empty()
    }

    /// `(start, end)` pairs declared for `weekday`, in declaration order.
    pub fn windows_for(&self, weekday: Weekday) -> Vec<(NaiveTime, NaiveTime)> {
        self.slots
            .iter()
            .filter(|w| parse_weekday(&w.day).ok() == Some(weekday))
            .filter_map(|w| Some((hhmm::parse(&w.start)?, hhmm::parse(&w.end)?)))
            .collect()
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<Weekday> {
    match s.to_lowercase().as_str() {
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        "sat" => Ok(Weekday::Sat),
        "sun" => Ok(Weekday::Sun),
        _ => Err(anyhow::anyhow!("invalid weekday: {s}")),
    }
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, hhmm::FORMAT).map_err(|_| anyhow::anyhow!("invalid time: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn test_parse_valid_json() {
        let json = r#"{"slots":[{"day":"mon","start":"09:00","end":"17:00"},{"day":"tue","start":"09:00","end":"17:00"}]}"#;
        let hours = WorkingHours::from_json(json).unwrap();
        assert_eq!(hours.slots.len(), 2);
        assert_eq!(hours.slots[0].day, "mon");
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(WorkingHours::from_json("not json").is_err());
    }

    #[test]
    fn test_parse_invalid_day() {
        let json = r#"{"slots":[{"day":"xyz","start":"09:00","end":"17:00"}]}"#;
        assert!(WorkingHours::from_json(json).is_err());
    }

    #[test]
    fn test_parse_invalid_time() {
        let json = r#"{"slots":[{"day":"mon","start":"25:00","end":"17:00"}]}"#;
        assert!(WorkingHours::from_json(json).is_err());
    }

    #[test]
    fn test_parse_reversed_window() {
        let json = r#"{"slots":[{"day":"mon","start":"17:00","end":"09:00"}]}"#;
        assert!(WorkingHours::from_json(json).is_err());
    }

    #[test]
    fn test_windows_for_split_shift() {
        let json = r#"{"slots":[{"day":"Sat","start":"09:00","end":"12:00"},{"day":"mon","start":"10:00","end":"18:00"},{"day":"sat","start":"13:00","end":"16:00"}]}"#;
        let hours = WorkingHours::from_json(json).unwrap();
        assert_eq!(
            hours.windows_for(Weekday::Sat),
            vec![(t("09:00"), t("12:00")), (t("13:00"), t("16:00"))]
        );
        assert!(hours.windows_for(Weekday::Sun).is_empty());
    }

    #[test]
    fn test_empty_is_unrestricted() {
        let hours = WorkingHours::from_json(r#"{"slots":[]}"#).unwrap();
        assert!(hours.is_unrestricted());
    }
}
