//! Date and time helpers used at the input boundary.
//!
//! Calendar dates are plain `NaiveDate`s (no timezone), times of day are
//! `NaiveTime`s written as `HH:MM`. Anything malformed is rejected here so the
//! engines can assume well-formed values.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};

use crate::error::{Error, Result};

pub const TIME_FORMAT: &str = "%H:%M";

/// Parse human-readable date input relative to `today`.
///
/// Supports:
/// - "today", "tomorrow", "yesterday"
/// - "monday".."sunday" (this week's occurrence), "next friday"
/// - "end of week", "end of month"
/// - "in 3d", "in 2w"
/// - "YYYY-MM-DD"
pub fn parse_date_input(s: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return today.succ_opt(),
        "yesterday" => return today.pred_opt(),
        "end of week" | "eow" => {
            let offset = 6 - today.weekday().num_days_from_monday() as i64;
            return add_days(today, offset);
        }
        "end of month" | "eom" => {
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            return NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt();
        }
        _ => {}
    }

    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return add_days(today, days);
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return today.checked_add_signed(Duration::try_weeks(weeks)?);
            }
        }
    }

    let weekdays = [
        ("monday", 0), ("tuesday", 1), ("wednesday", 2), ("thursday", 3),
        ("friday", 4), ("saturday", 5), ("sunday", 6),
        ("mon", 0), ("tue", 1), ("wed", 2), ("thu", 3),
        ("fri", 4), ("sat", 5), ("sun", 6),
    ];

    let current = today.weekday().num_days_from_monday() as i64;
    for (day_name, target) in weekdays {
        let ahead = (target + 7 - current) % 7;
        if s == day_name || s == format!("this {day_name}") {
            return add_days(today, ahead);
        }
        if s == format!("next {day_name}") {
            let days = if ahead == 0 { 7 } else { ahead + 7 };
            return add_days(today, days);
        }
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// `date + days`, or `None` when the result leaves the calendar range.
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::try_days(days)?)
}

/// The moment `hours` after `date` at `time`, split back into date and time.
/// Crosses midnight onto later dates as needed.
pub fn end_after(date: NaiveDate, time: NaiveTime, hours: f64) -> Result<(NaiveDate, NaiveTime)> {
    let out_of_range = || Error::InvalidInput(format!("{hours} hours after {date} {} is out of range", format_time(time)));
    if !hours.is_finite() || hours < 0.0 {
        return Err(out_of_range());
    }
    let span = Duration::try_minutes((hours * 60.0).round() as i64).ok_or_else(out_of_range)?;
    let end = date.and_time(time).checked_add_signed(span).ok_or_else(out_of_range)?;
    Ok((end.date(), end.time()))
}

/// Like [`parse_date_input`] but reports what could not be parsed.
pub fn require_date(s: &str, today: NaiveDate) -> Result<NaiveDate> {
    parse_date_input(s, today).ok_or_else(|| Error::InvalidInput(format!("unrecognised date '{s}'")))
}

/// Parse `HH:MM` (seconds are accepted and kept).
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| Error::InvalidInput(format!("unrecognised time '{s}', expected HH:MM")))
}

pub fn format_time(t: NaiveTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Format a date relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_relative(date: NaiveDate, today: NaiveDate) -> String {
    let delta = (date - today).num_days();
    match delta {
        0 => "today".into(),
        1 => "tomorrow".into(),
        d if d > 1 => format!("in {d}d"),
        d => format!("{}d late", -d),
    }
}

/// Serde adapter writing `NaiveTime` as `HH:MM`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_time(*t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_keywords() {
        // 2024-05-15 is a Wednesday.
        let today = d(2024, 5, 15);
        assert_eq!(parse_date_input("today", today), Some(today));
        assert_eq!(parse_date_input("Tomorrow", today), Some(d(2024, 5, 16)));
        assert_eq!(parse_date_input("in 2w", today), Some(d(2024, 5, 29)));
        assert_eq!(parse_date_input("eow", today), Some(d(2024, 5, 19)));
        assert_eq!(parse_date_input("eom", today), Some(d(2024, 5, 31)));
        assert_eq!(parse_date_input("friday", today), Some(d(2024, 5, 17)));
        assert_eq!(parse_date_input("next wed", today), Some(d(2024, 5, 22)));
        assert_eq!(parse_date_input("2024-12-01", today), Some(d(2024, 12, 1)));
        assert_eq!(parse_date_input("someday", today), None);
    }

    #[test]
    fn test_parse_date_out_of_range_is_none() {
        let today = d(2024, 5, 15);
        assert_eq!(parse_date_input("in 1000000000d", today), None);
        assert_eq!(parse_date_input("in 99999999999999999d", today), None);
        assert_eq!(parse_date_input("in -99999999999w", today), None);
        assert!(require_date("in 1000000000d", today).is_err());
        assert_eq!(parse_date_input("tomorrow", NaiveDate::MAX), None);
        assert_eq!(parse_date_input("in -3d", today), Some(d(2024, 5, 12)));
    }

    #[test]
    fn test_end_after_crosses_midnight() {
        let nine_pm = NaiveTime::from_hms_opt(20, 0, 0).unwrap();
        let (end_date, end_time) = end_after(d(2024, 5, 15), nine_pm, 6.0).unwrap();
        assert_eq!(end_date, d(2024, 5, 16));
        assert_eq!(end_time, NaiveTime::from_hms_opt(2, 0, 0).unwrap());

        let (same_day, half_past) = end_after(d(2024, 5, 15), nine_pm, 0.5).unwrap();
        assert_eq!(same_day, d(2024, 5, 15));
        assert_eq!(half_past, NaiveTime::from_hms_opt(20, 30, 0).unwrap());
    }

    #[test]
    fn test_end_after_rejects_unusable_hours() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert!(matches!(end_after(d(2024, 5, 15), nine, 1e300), Err(Error::InvalidInput(_))));
        assert!(end_after(d(2024, 5, 15), nine, f64::INFINITY).is_err());
        assert!(end_after(d(2024, 5, 15), nine, f64::NAN).is_err());
        assert!(end_after(d(2024, 5, 15), nine, -1.0).is_err());
        assert!(end_after(NaiveDate::MAX, nine, 24.0).is_err());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("09:30").unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert!(parse_time("9h").is_err());
        assert!(parse_time("25:00").is_err());
    }

    #[test]
    fn test_format_relative() {
        let today = d(2024, 5, 15);
        assert_eq!(format_relative(today, today), "today");
        assert_eq!(format_relative(d(2024, 5, 18), today), "in 3d");
        assert_eq!(format_relative(d(2024, 5, 13), today), "2d late");
    }
}
