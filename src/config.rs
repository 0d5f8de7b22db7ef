use std::env;

use chrono::{FixedOffset, NaiveTime, Offset, Utc};

#[derive(Clone, Debug, PartialEq)]
pub enum OtpBackend {
    Database,
    Memory,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub credential_secret: String,
    /// Latest wall-clock time a same-day booking may be submitted. `None` disables the rule.
    pub same_day_cutoff: Option<NaiveTime>,
    /// Offset of the business's local clock, used for the same-day rules.
    pub business_utc_offset: FixedOffset,
    pub otp_ttl_minutes: i64,
    /// bcrypt work factor for admin passwords.
    pub password_cost: u32,
    pub otp_backend: OtpBackend,
    pub mail_webhook_url: String,
    pub mail_from: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "cleaning.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            credential_secret: env::var("CREDENTIAL_SECRET")
                .unwrap_or_else(|_| "dev-credential-secret".to_string()),
            same_day_cutoff: parse_cutoff(
                &env::var("SAME_DAY_CUTOFF").unwrap_or_else(|_| "12:00".to_string()),
            ),
            business_utc_offset: parse_utc_offset(
                &env::var("BUSINESS_UTC_OFFSET").unwrap_or_default(),
            ),
            otp_ttl_minutes: env::var("OTP_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|m: &i64| *m > 0)
                .unwrap_or(10),
            password_cost: env::var("BCRYPT_COST")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|c: &u32| (4..=31).contains(c))
                .unwrap_or(bcrypt::DEFAULT_COST),
            otp_backend: match env::var("OTP_STORE").as_deref() {
                Ok("memory") => OtpBackend::Memory,
                _ => OtpBackend::Database,
            },
            mail_webhook_url: env::var("MAIL_WEBHOOK_URL").unwrap_or_default(),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@sparkle-cleaning.local".to_string()),
        }
    }
}

pub fn parse_cutoff(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("off") || raw.eq_ignore_ascii_case("none") {
        return None;
    }
    match NaiveTime::parse_from_str(raw, "%H:%M") {
        Ok(t) => Some(t),
        Err(_) => {
            tracing::warn!(value = %raw, "unparseable SAME_DAY_CUTOFF, same-day cutoff disabled");
            None
        }
    }
}

/// `+HH:MM`, `-HH:MM`, `+HH` or `Z`/`UTC`/blank for UTC. Anything else falls back to UTC.
pub fn parse_utc_offset(raw: &str) -> FixedOffset {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Utc.fix();
    }

    let parsed = raw
        .strip_prefix('+')
        .map(|rest| (1, rest))
        .or_else(|| raw.strip_prefix('-').map(|rest| (-1, rest)))
        .and_then(|(sign, rest)| {
            let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
            let hours: i32 = hours.parse().ok()?;
            let minutes: i32 = minutes.parse().ok()?;
            if !(0..60).contains(&minutes) {
                return None;
            }
            FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        });

    parsed.unwrap_or_else(|| {
        tracing::warn!(value = %raw, "unparseable BUSINESS_UTC_OFFSET, using UTC");
        Utc.fix()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("+02:00").local_minus_utc(), 7200);
        assert_eq!(parse_utc_offset("-05:30").local_minus_utc(), -(5 * 3600 + 1800));
        assert_eq!(parse_utc_offset("+10").local_minus_utc(), 36000);
        assert_eq!(parse_utc_offset("").local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("UTC").local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("Europe/Paris").local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("+25:00").local_minus_utc(), 0);
    }

    #[test]
    fn test_parse_cutoff() {
        assert_eq!(parse_cutoff("12:00"), NaiveTime::from_hms_opt(12, 0, 0));
        assert_eq!(parse_cutoff(" 17:30 "), NaiveTime::from_hms_opt(17, 30, 0));
        assert_eq!(parse_cutoff("off"), None);
        assert_eq!(parse_cutoff(""), None);
        assert_eq!(parse_cutoff("noon"), None);
    }
}
