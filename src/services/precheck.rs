//! Pre-submit check run by the client before posting a quotation request. It
//! mirrors the server validator over the same policy functions but reports
//! every problem at once and never touches storage. The server stays the
//! authority.

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::models::BookingPayload;
use crate::services::policy::{self, AddressParts, SameDayViolation};

#[derive(Debug, Clone, Default)]
pub struct QuotationForm {
    pub payload: BookingPayload,
    /// Contact address typed into the form; not part of the booking body.
    pub contact_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn precheck(
    form: &QuotationForm,
    now_local: NaiveDateTime,
    cutoff: Option<NaiveTime>,
) -> Vec<FieldError> {
    let p = &form.payload;
    let mut errors = vec![];

    if p.customer_id.is_none() {
        errors.push(FieldError::new(
            "Customer_ID",
            "Please log in to request a quotation.",
        ));
    }
    if p.service_id.is_none() {
        errors.push(FieldError::new("Service_ID", "Please select a service."));
    }

    let address = AddressParts {
        street: p.address_street.as_deref(),
        city: p.address_city.as_deref(),
        state: p.address_state.as_deref(),
        postal_code: p.address_postal_code.as_deref(),
    };
    for field in address.missing() {
        errors.push(FieldError::new(field, "This part of the address is required."));
    }
    if let Some(code) = policy::trim_optional(p.address_postal_code.as_deref()) {
        if !policy::is_valid_postal_code(&code) {
            errors.push(FieldError::new(
                "Address_Postal_Code",
                "Please enter a valid postal code.",
            ));
        }
    }

    if let Some(email) = policy::trim_optional(form.contact_email.as_deref()) {
        if !policy::is_valid_email(&email) {
            errors.push(FieldError::new("Email", "Please enter a valid email address."));
        }
    }

    // Outer `None`: unreadable time. Inner `None`: left blank, the default start applies.
    let selected = match policy::trim_optional(p.time.as_deref()) {
        None => Some(None),
        Some(raw) => match policy::normalize_time(Some(&raw)) {
            Ok(t) => Some(Some(t)),
            Err(_) => {
                errors.push(FieldError::new("Time", "Please choose a valid time."));
                None
            }
        },
    };

    match policy::trim_optional(p.date.as_deref()) {
        None => errors.push(FieldError::new("Date", "Please choose a date.")),
        Some(raw) => match policy::normalize_date(&raw) {
            None => errors.push(FieldError::new("Date", "Please choose a valid date.")),
            Some(date) if policy::is_past_date(date, now_local.date()) => {
                errors.push(FieldError::new("Date", "Please choose today or a future date."))
            }
            Some(date) => {
                if let Some(selected) = selected {
                    match policy::check_same_day(date, selected, now_local, cutoff) {
                        Ok(()) => {}
                        Err(SameDayViolation::PastCutoff { cutoff }) => {
                            errors.push(FieldError::new(
                                "Date",
                                format!(
                                    "Same-day bookings are only accepted before {}.",
                                    policy::format_time(cutoff)
                                ),
                            ))
                        }
                        Err(SameDayViolation::TimeAlreadyPassed) => errors.push(FieldError::new(
                            "Time",
                            "Please choose a time later than now.",
                        )),
                    }
                }
            }
        },
    }

    errors
}
