use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use rusqlite::{Connection, TransactionBehavior};

use crate::db::queries;
use crate::errors::{BookingError, StorageViolation};
use crate::models::{BookingDetails, BookingPayload, BookingStatus, NewBooking};
use crate::services::policy::{self, AddressParts, SameDayViolation};

pub const NEXT_STEPS: [&str; 3] = [
    "Our team will review your request and prepare a quotation.",
    "You will receive the quoted price and confirmation by email.",
    "You can track the status of your request from your account.",
];

#[derive(Debug, Clone)]
pub struct BookingPolicy {
    pub same_day_cutoff: Option<NaiveTime>,
    /// Offset of the business's wall clock; same-day rules are judged on it.
    pub utc_offset: FixedOffset,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            same_day_cutoff: None,
            utc_offset: Utc.fix(),
        }
    }
}

/// Output of the storage-free checks; everything the transaction needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub customer_id: i64,
    pub service_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: Option<i64>,
    pub address: String,
    pub special_instructions: Option<String>,
    pub property_type: Option<String>,
    pub property_size: Option<String>,
    pub cleaning_frequency: Option<String>,
}

/// Field, address and date checks, in the order callers see failures. `now`
/// is UTC; only the same-day rules move it onto the business clock.
pub fn validate_request(
    payload: &BookingPayload,
    policy: &BookingPolicy,
    now: NaiveDateTime,
) -> Result<ValidatedRequest, BookingError> {
    let customer_id = payload.customer_id.ok_or(BookingError::Unauthenticated)?;

    let raw_date = payload.date.as_deref().map(str::trim).unwrap_or("");
    let mut missing = vec![];
    if payload.service_id.is_none() {
        missing.push("Service_ID");
    }
    if raw_date.is_empty() {
        missing.push("Date");
    }
    let (Some(service_id), false) = (payload.service_id, raw_date.is_empty()) else {
        return Err(BookingError::MissingField { fields: missing });
    };

    let address_parts = AddressParts {
        street: payload.address_street.as_deref(),
        city: payload.address_city.as_deref(),
        state: payload.address_state.as_deref(),
        postal_code: payload.address_postal_code.as_deref(),
    };
    let Some(address) = address_parts.compose() else {
        return Err(BookingError::IncompleteAddress {
            fields: address_parts.missing(),
        });
    };

    let date = policy::normalize_date(raw_date).ok_or(BookingError::InvalidDate)?;
    if policy::is_past_date(date, now.date()) {
        return Err(BookingError::PastDate);
    }

    let time = policy::normalize_time(payload.time.as_deref())
        .map_err(|_| BookingError::InvalidTime)?;
    if matches!(payload.duration, Some(d) if d <= 0) {
        return Err(BookingError::InvalidDuration);
    }

    let selected = policy::trim_optional(payload.time.as_deref()).map(|_| time);
    let business_now = policy::business_clock(now, policy.utc_offset);
    policy::check_same_day(date, selected, business_now, policy.same_day_cutoff).map_err(
        |v| match v {
            SameDayViolation::PastCutoff { cutoff } => BookingError::SameDayCutoff {
                cutoff: policy::format_time(cutoff),
            },
            SameDayViolation::TimeAlreadyPassed => BookingError::TimeAlreadyPassed,
        },
    )?;

    Ok(ValidatedRequest {
        customer_id,
        service_id,
        date,
        time,
        duration_minutes: payload.duration,
        address,
        special_instructions: policy::trim_optional(payload.special_instructions.as_deref()),
        property_type: policy::trim_optional(payload.property_type.as_deref()),
        property_size: policy::trim_optional(payload.property_size.as_deref()),
        cleaning_frequency: policy::trim_optional(payload.cleaning_frequency.as_deref()),
    })
}

/// Validates and persists a quotation request. On any failure nothing is
/// written: the lookups, duplicate check and insert share one IMMEDIATE
/// transaction, and the live-slot unique index backs up the duplicate check.
pub fn create_booking(
    conn: &mut Connection,
    payload: &BookingPayload,
    policy: &BookingPolicy,
    now: NaiveDateTime,
) -> Result<BookingDetails, BookingError> {
    let request = validate_request(payload, policy, now)?;

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| BookingError::Unexpected(e.into()))?;

    queries::get_customer(&tx, request.customer_id)?.ok_or(BookingError::CustomerNotFound)?;

    let service =
        queries::get_service(&tx, request.service_id)?.ok_or(BookingError::ServiceNotFound)?;
    if !service.is_available {
        return Err(BookingError::ServiceUnavailable);
    }

    let live = queries::find_bookings_matching(
        &tx,
        request.customer_id,
        request.service_id,
        request.date,
        &BookingStatus::TERMINAL_EXCLUDED,
    )?;
    if !live.is_empty() {
        tracing::info!(
            customer_id = request.customer_id,
            service_id = request.service_id,
            date = %request.date,
            "duplicate booking request rejected"
        );
        return Err(BookingError::DuplicateBooking);
    }

    let record = NewBooking {
        customer_id: request.customer_id,
        service_id: request.service_id,
        date: request.date,
        time: policy::format_time(request.time),
        duration_minutes: request.duration_minutes.unwrap_or(service.duration_minutes),
        address: request.address,
        special_instructions: request.special_instructions,
        property_type: request.property_type,
        property_size: request.property_size,
        cleaning_frequency: request.cleaning_frequency,
        status: BookingStatus::Requested,
    };

    let booking_id = queries::insert_booking(&tx, &record).map_err(|e| {
        match StorageViolation::classify(&e) {
            Some(StorageViolation::Unique) => BookingError::DuplicateBooking,
            Some(violation) => BookingError::Storage(violation),
            None => BookingError::Unexpected(e),
        }
    })?;

    let details = queries::get_booking_details(&tx, booking_id)?.ok_or_else(|| {
        BookingError::Unexpected(anyhow::anyhow!("booking {booking_id} vanished after insert"))
    })?;

    tx.commit().map_err(|e| BookingError::Unexpected(e.into()))?;

    tracing::info!(
        booking_id,
        customer_id = record.customer_id,
        service_id = record.service_id,
        date = %record.date,
        "booking request created"
    );

    Ok(details)
}
