//! Date helpers: the chat speaks `dd/mm/yyyy`, the backend speaks ISO.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Parse a birthdate typed in chat into ISO `yyyy-mm-dd`.
///
/// Accepts `dd/mm/yyyy`, `dd-mm-yyyy` and already-ISO input; rejects
/// impossible dates.
pub fn to_iso_date(text: &str) -> Option<String> {
    let t = text.trim();
    for fmt in ["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
            return Some(d.format("%Y-%m-%d").to_string());
        }
    }
    None
}

/// ISO `yyyy-mm-dd` back to the Brazilian `dd/mm/yyyy` shown in chat.
pub fn iso_to_br(iso: &str) -> String {
    match NaiveDate::parse_from_str(iso.trim(), "%Y-%m-%d") {
        Ok(d) => d.format("%d/%m/%Y").to_string(),
        Err(_) => iso.to_string(),
    }
}

/// Purchase timestamp as the backend reports it: `dd/mm/yyyy` + `HH:MM`
/// (seconds optional). A missing or malformed time falls back to midnight.
pub fn parse_br_datetime(date: &str, time: &str) -> Option<NaiveDateTime> {
    let d = NaiveDate::parse_from_str(date.trim(), "%d/%m/%Y").ok()?;
    let t = time.trim();
    let t = NaiveTime::parse_from_str(t, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(t, "%H:%M"))
        .unwrap_or(NaiveTime::MIN);
    Some(d.and_time(t))
}

/// Fractional days elapsed from `then` to `now`.
pub fn days_between(then: NaiveDateTime, now: NaiveDateTime) -> f64 {
    (now - then).num_seconds() as f64 / 86_400.0
}

// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn br_dates_round_trip_through_iso() {
        assert_eq!(to_iso_date("23/03/1965"), Some("1965-03-23".into()));
        assert_eq!(to_iso_date("1965-03-23"), Some("1965-03-23".into()));
        assert_eq!(iso_to_br("1965-03-23"), "23/03/1965");
    }

    #[test]
    fn impossible_dates_are_rejected() {
        assert_eq!(to_iso_date("31/02/2020"), None);
        assert_eq!(to_iso_date("amanhã"), None);
    }

    #[test]
    fn purchase_timestamps_parse_with_and_without_seconds() {
        let a = parse_br_datetime("10/08/2026", "14:30").unwrap();
        let b = parse_br_datetime("10/08/2026", "14:30:00").unwrap();
        assert_eq!(a, b);

        let midnight = parse_br_datetime("10/08/2026", "").unwrap();
        assert_eq!(midnight.format("%H:%M").to_string(), "00:00");

        assert!(parse_br_datetime("2026-08-10", "14:30").is_none());
    }

    #[test]
    fn day_arithmetic() {
        let then = parse_br_datetime("01/08/2026", "12:00").unwrap();
        let now = parse_br_datetime("08/08/2026", "12:00").unwrap();
        assert!((days_between(then, now) - 7.0).abs() < 1e-9);
        assert!(days_between(then, now) <= 7.0);

        let later = parse_br_datetime("08/08/2026", "12:00:01").unwrap();
        assert!(days_between(then, later) > 7.0);
    }
}
