//! Date, time and address rules shared by the server-side validator and the
//! pre-submit check. Everything here is pure; callers pass the clock in.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

pub const DEFAULT_TIME: &str = "09:00";

/// Accepts `YYYY-MM-DD`, RFC 3339 timestamps and `YYYY-MM-DDTHH:MM[:SS]`.
pub fn normalize_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
}

#[derive(Debug, PartialEq)]
pub struct InvalidTime;

/// Blank means the default start time. Otherwise `H:MM`, `HH:MM` or `HH:MM:SS`.
pub fn normalize_time(raw: Option<&str>) -> Result<NaiveTime, InvalidTime> {
    let raw = raw.map(str::trim).unwrap_or("");
    if raw.is_empty() {
        return NaiveTime::parse_from_str(DEFAULT_TIME, "%H:%M").map_err(|_| InvalidTime);
    }
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| InvalidTime)
}

pub fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn is_past_date(date: NaiveDate, today: NaiveDate) -> bool {
    date < today
}

#[derive(Debug, PartialEq)]
pub enum SameDayViolation {
    /// Submitted at or after the cutoff for a booking today.
    PastCutoff { cutoff: NaiveTime },
    /// Asked for a start time that is not later than now.
    TimeAlreadyPassed,
}

/// Wall-clock time at the business for a UTC instant.
pub fn business_clock(now_utc: NaiveDateTime, offset: FixedOffset) -> NaiveDateTime {
    now_utc + Duration::seconds(i64::from(offset.local_minus_utc()))
}

/// Rules that only apply when the booking is for the current business day.
/// `now` must be on the business clock. `selected` is the time the customer
/// picked; a defaulted start time is not held against them. A `None` cutoff
/// disables the rule set entirely.
pub fn check_same_day(
    date: NaiveDate,
    selected: Option<NaiveTime>,
    now: NaiveDateTime,
    cutoff: Option<NaiveTime>,
) -> Result<(), SameDayViolation> {
    let Some(cutoff) = cutoff else {
        return Ok(());
    };
    if date != now.date() {
        return Ok(());
    }
    if now.time() >= cutoff {
        return Err(SameDayViolation::PastCutoff { cutoff });
    }
    match selected {
        Some(time) if time <= now.time() => Err(SameDayViolation::TimeAlreadyPassed),
        _ => Ok(()),
    }
}

/// Trimmed value, or `None` when absent or blank.
pub fn trim_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub struct AddressParts<'a> {
    pub street: Option<&'a str>,
    pub city: Option<&'a str>,
    pub state: Option<&'a str>,
    pub postal_code: Option<&'a str>,
}

impl AddressParts<'_> {
    /// Names of the parts that are absent or blank, in form order.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("Address_Street", self.street),
            ("Address_City", self.city),
            ("Address_State", self.state),
            ("Address_Postal_Code", self.postal_code),
        ]
        .into_iter()
        .filter(|(_, v)| trim_optional(*v).is_none())
        .map(|(name, _)| name)
        .collect()
    }

    /// `"street, city, state postal"`, or `None` when any part is missing.
    pub fn compose(&self) -> Option<String> {
        let street = trim_optional(self.street)?;
        let city = trim_optional(self.city)?;
        let state = trim_optional(self.state)?;
        let postal = trim_optional(self.postal_code)?;
        Some(format!("{street}, {city}, {state} {postal}"))
    }
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && tld.len() >= 2,
        None => false,
    }
}

/// 3 to 10 characters of letters, digits, spaces or hyphens, with at least one digit.
pub fn is_valid_postal_code(code: &str) -> bool {
    let code = code.trim();
    (3..=10).contains(&code.len())
        && code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
        && code.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn time(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn test_normalize_date_formats() {
        assert_eq!(normalize_date("2099-01-01"), Some(date("2099-01-01")));
        assert_eq!(normalize_date(" 2099-01-01 "), Some(date("2099-01-01")));
        assert_eq!(normalize_date("2099-01-01T10:30"), Some(date("2099-01-01")));
        assert_eq!(
            normalize_date("2099-01-01T23:30:00+00:00"),
            Some(date("2099-01-01"))
        );
        assert_eq!(normalize_date("2099-02-30"), None);
        assert_eq!(normalize_date("next tuesday"), None);
        assert_eq!(normalize_date(""), None);
    }

    #[test]
    fn test_normalize_time() {
        assert_eq!(normalize_time(None), Ok(time("09:00")));
        assert_eq!(normalize_time(Some("  ")), Ok(time("09:00")));
        assert_eq!(normalize_time(Some("7:05")), Ok(time("07:05")));
        assert_eq!(normalize_time(Some("14:30:00")), Ok(time("14:30")));
        assert_eq!(normalize_time(Some("25:00")), Err(InvalidTime));
        assert_eq!(normalize_time(Some("noon")), Err(InvalidTime));
        assert_eq!(format_time(time("07:05")), "07:05");
    }

    #[test]
    fn test_past_date_is_strict() {
        assert!(is_past_date(date("2026-10-18"), date("2026-10-19")));
        assert!(!is_past_date(date("2026-10-19"), date("2026-10-19")));
        assert!(!is_past_date(date("2026-10-20"), date("2026-10-19")));
    }

    #[test]
    fn test_same_day_before_cutoff() {
        let now = dt("2026-10-19 08:00");
        let cutoff = Some(time("12:00"));
        assert_eq!(
            check_same_day(date("2026-10-19"), Some(time("10:00")), now, cutoff),
            Ok(())
        );
        assert_eq!(
            check_same_day(date("2026-10-19"), Some(time("07:30")), now, cutoff),
            Err(SameDayViolation::TimeAlreadyPassed)
        );
    }

    #[test]
    fn test_same_day_without_selected_time() {
        let cutoff = Some(time("12:00"));
        // the 09:00 default start must not count as a time in the past
        assert_eq!(
            check_same_day(date("2026-10-19"), None, dt("2026-10-19 10:00"), cutoff),
            Ok(())
        );
        assert_eq!(
            check_same_day(date("2026-10-19"), None, dt("2026-10-19 12:30"), cutoff),
            Err(SameDayViolation::PastCutoff {
                cutoff: time("12:00")
            })
        );
    }

    #[test]
    fn test_business_clock_applies_offset() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(business_clock(dt("2026-10-19 08:00"), plus_two), dt("2026-10-19 10:00"));
        assert_eq!(business_clock(dt("2026-10-19 02:00"), minus_five), dt("2026-10-18 21:00"));
    }

    #[test]
    fn test_same_day_after_cutoff() {
        let now = dt("2026-10-19 12:00");
        assert_eq!(
            check_same_day(date("2026-10-19"), Some(time("15:00")), now, Some(time("12:00"))),
            Err(SameDayViolation::PastCutoff {
                cutoff: time("12:00")
            })
        );
    }

    #[test]
    fn test_same_day_rules_ignore_other_days_and_disabled_cutoff() {
        let now = dt("2026-10-19 18:00");
        assert_eq!(
            check_same_day(date("2026-10-20"), Some(time("06:00")), now, Some(time("12:00"))),
            Ok(())
        );
        assert_eq!(
            check_same_day(date("2026-10-19"), Some(time("06:00")), now, None),
            Ok(())
        );
    }

    #[test]
    fn test_address_compose_and_missing() {
        let parts = AddressParts {
            street: Some(" 1 Main "),
            city: Some("X"),
            state: Some("Y"),
            postal_code: Some("0001"),
        };
        assert!(parts.missing().is_empty());
        assert_eq!(parts.compose().as_deref(), Some("1 Main, X, Y 0001"));

        let parts = AddressParts {
            street: Some("1 Main"),
            city: None,
            state: Some("   "),
            postal_code: Some("0001"),
        };
        assert_eq!(parts.missing(), vec!["Address_City", "Address_State"]);
        assert_eq!(parts.compose(), None);
    }

    #[test]
    fn test_trim_optional() {
        assert_eq!(trim_optional(Some("  pets inside ")), Some("pets inside".to_string()));
        assert_eq!(trim_optional(Some("   ")), None);
        assert_eq!(trim_optional(None), None);
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("jo@example.com"));
        assert!(is_valid_email(" jo.smith+home@mail.example.org "));
        assert!(!is_valid_email("jo@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("jo@@example.com"));
        assert!(!is_valid_email("jo smith@example.com"));
    }

    #[test]
    fn test_postal_code_pattern() {
        assert!(is_valid_postal_code("0001"));
        assert!(is_valid_postal_code("SW1A 1AA"));
        assert!(is_valid_postal_code("12345-6789"));
        assert!(!is_valid_postal_code("AB"));
        assert!(!is_valid_postal_code("ABCDE"));
        assert!(!is_valid_postal_code("12#45"));
    }
}
