use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rusqlite::ErrorCode;

use crate::models::BookingStatus;
use crate::services::otp::OtpError;

const GENERIC_FAILURE: &str = "Something went wrong on our side. Please try again later.";

/// `{ success: false, message, errors? }`, the envelope every failure uses.
pub fn failure_response(status: StatusCode, message: &str, errors: &[String]) -> Response {
    let body = if errors.is_empty() {
        serde_json::json!({ "success": false, "message": message })
    } else {
        serde_json::json!({ "success": false, "message": message, "errors": errors })
    };
    (status, axum::Json(body)).into_response()
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] anyhow::Error),

    #[error("mail delivery error: {0}")]
    Mail(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(e) => {
                if let Some(violation) = StorageViolation::classify(e) {
                    return BookingError::Storage(violation).into_response();
                }
                tracing::error!(error = %e, "request failed on storage");
                failure_response(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE, &[])
            }
            AppError::Mail(e) => {
                tracing::error!(error = %e, "mail delivery failed");
                failure_response(
                    StatusCode::BAD_GATEWAY,
                    "We could not send the email. Please try again later.",
                    &[],
                )
            }
            AppError::BadRequest(msg) => failure_response(StatusCode::BAD_REQUEST, msg, &[]),
            AppError::Conflict(msg) => failure_response(StatusCode::CONFLICT, msg, &[]),
            AppError::NotFound(msg) => failure_response(StatusCode::NOT_FOUND, msg, &[]),
            AppError::Unauthorized => {
                failure_response(StatusCode::UNAUTHORIZED, "unauthorized", &[])
            }
        }
    }
}

impl From<OtpError> for AppError {
    fn from(e: OtpError) -> Self {
        match e {
            OtpError::Store(inner) => AppError::Database(inner),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<StatusTransitionError> for AppError {
    fn from(e: StatusTransitionError) -> Self {
        AppError::Conflict(e.to_string())
    }
}

/// A status change the booking workflow does not allow.
#[derive(Debug, thiserror::Error)]
#[error("Cannot move a {} booking to {}.", .from.as_str(), .to.as_str())]
pub struct StatusTransitionError {
    pub from: BookingStatus,
    pub to: BookingStatus,
}

impl StatusTransitionError {
    pub fn check(from: BookingStatus, to: BookingStatus) -> Result<(), Self> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(Self { from, to })
        }
    }
}

impl IntoResponse for StatusTransitionError {
    fn into_response(self) -> Response {
        failure_response(StatusCode::CONFLICT, &self.to_string(), &[])
    }
}

/// Constraint failures surfaced by the storage layer.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageViolation {
    Unique,
    ForeignKey,
    /// NOT NULL / CHECK failures, one message per offending column.
    Validation(Vec<String>),
}

impl StorageViolation {
    pub fn classify(err: &anyhow::Error) -> Option<Self> {
        let sqlite_err = err.downcast_ref::<rusqlite::Error>()?;
        let rusqlite::Error::SqliteFailure(failure, message) = sqlite_err else {
            return None;
        };
        if failure.code != ErrorCode::ConstraintViolation {
            return None;
        }

        let message = message.as_deref().unwrap_or("");
        match failure.extended_code {
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                Some(StorageViolation::Unique)
            }
            rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Some(StorageViolation::ForeignKey),
            rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL => Some(StorageViolation::Validation(
                field_messages(message, "is required"),
            )),
            _ => Some(StorageViolation::Validation(field_messages(
                message,
                "has an invalid value",
            ))),
        }
    }
}

// SQLite reports e.g. "NOT NULL constraint failed: bookings.address".
fn field_messages(message: &str, suffix: &str) -> Vec<String> {
    let fields: Vec<String> = message
        .rsplit_once(": ")
        .map(|(_, cols)| {
            cols.split(',')
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(|c| c.rsplit('.').next().unwrap_or(c).to_string())
                .filter(|c| c.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_'))
                .map(|c| format!("{c} {suffix}"))
                .collect()
        })
        .unwrap_or_default();

    if fields.is_empty() {
        vec![format!("a field {suffix}")]
    } else {
        fields
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Please log in to request a quotation.")]
    Unauthenticated,

    #[error("Service and date are required.")]
    MissingField { fields: Vec<&'static str> },

    #[error("A complete address (street, city, state and postal code) is required.")]
    IncompleteAddress { fields: Vec<&'static str> },

    #[error("Please provide a valid date.")]
    InvalidDate,

    #[error("Bookings cannot be made for past dates.")]
    PastDate,

    #[error("Please provide a valid time in HH:MM format.")]
    InvalidTime,

    #[error("Duration must be a positive number of minutes.")]
    InvalidDuration,

    #[error("Same-day bookings must be submitted before {cutoff}. Please choose a later date.")]
    SameDayCutoff { cutoff: String },

    #[error("The selected time has already passed today. Please choose a later time.")]
    TimeAlreadyPassed,

    #[error("Customer not found.")]
    CustomerNotFound,

    #[error("Service not found.")]
    ServiceNotFound,

    #[error("This service is currently unavailable.")]
    ServiceUnavailable,

    #[error("You already have a booking request for this service on this date.")]
    DuplicateBooking,

    #[error("storage constraint violated: {0:?}")]
    Storage(StorageViolation),

    #[error("unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),
}

impl BookingError {
    pub fn status(&self) -> StatusCode {
        match self {
            BookingError::Unauthenticated => StatusCode::UNAUTHORIZED,
            BookingError::MissingField { .. }
            | BookingError::IncompleteAddress { .. }
            | BookingError::InvalidDate
            | BookingError::PastDate
            | BookingError::InvalidTime
            | BookingError::InvalidDuration
            | BookingError::SameDayCutoff { .. }
            | BookingError::TimeAlreadyPassed
            | BookingError::ServiceUnavailable => StatusCode::BAD_REQUEST,
            BookingError::CustomerNotFound | BookingError::ServiceNotFound => StatusCode::NOT_FOUND,
            BookingError::DuplicateBooking => StatusCode::CONFLICT,
            BookingError::Storage(StorageViolation::Unique) => StatusCode::CONFLICT,
            BookingError::Storage(_) => StatusCode::BAD_REQUEST,
            BookingError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing text. Storage and unexpected failures never echo internals.
    pub fn message(&self) -> String {
        match self {
            BookingError::Storage(StorageViolation::Unique) => {
                "A record with these details already exists.".to_string()
            }
            BookingError::Storage(StorageViolation::ForeignKey) => {
                "Invalid reference to a related record.".to_string()
            }
            BookingError::Storage(StorageViolation::Validation(_)) => {
                "Validation failed.".to_string()
            }
            BookingError::Unexpected(_) => GENERIC_FAILURE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn field_errors(&self) -> Vec<String> {
        match self {
            BookingError::MissingField { fields } | BookingError::IncompleteAddress { fields } => {
                fields.iter().map(|f| format!("{f} is required")).collect()
            }
            BookingError::Storage(StorageViolation::Validation(errors)) => errors.clone(),
            _ => vec![],
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        if let BookingError::Unexpected(e) = &self {
            tracing::error!(error = %e, "booking request failed unexpectedly");
        }
        failure_response(self.status(), &self.message(), &self.field_errors())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraint_error(extended_code: i32, message: &str) -> anyhow::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: ErrorCode::ConstraintViolation,
                extended_code,
            },
            Some(message.to_string()),
        )
        .into()
    }

    #[test]
    fn test_classify_unique() {
        let err = constraint_error(
            rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            "UNIQUE constraint failed: bookings.customer_id, bookings.service_id, bookings.date",
        );
        assert_eq!(StorageViolation::classify(&err), Some(StorageViolation::Unique));
    }

    #[test]
    fn test_classify_foreign_key() {
        let err = constraint_error(
            rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
            "FOREIGN KEY constraint failed",
        );
        assert_eq!(
            StorageViolation::classify(&err),
            Some(StorageViolation::ForeignKey)
        );
    }

    #[test]
    fn test_classify_not_null_lists_fields() {
        let err = constraint_error(
            rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL,
            "NOT NULL constraint failed: bookings.address",
        );
        assert_eq!(
            StorageViolation::classify(&err),
            Some(StorageViolation::Validation(vec![
                "address is required".to_string()
            ]))
        );
    }

    #[test]
    fn test_classify_ignores_other_errors() {
        let err = anyhow::anyhow!("disk on fire");
        assert_eq!(StorageViolation::classify(&err), None);
        let err: anyhow::Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(StorageViolation::classify(&err), None);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(BookingError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(BookingError::PastDate.status(), StatusCode::BAD_REQUEST);
        assert_eq!(BookingError::ServiceUnavailable.status(), StatusCode::BAD_REQUEST);
        assert_eq!(BookingError::CustomerNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(BookingError::DuplicateBooking.status(), StatusCode::CONFLICT);
        assert_eq!(
            BookingError::Storage(StorageViolation::ForeignKey).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            BookingError::Unexpected(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_status_transition_check() {
        assert!(StatusTransitionError::check(BookingStatus::Requested, BookingStatus::Confirmed).is_ok());
        let err = StatusTransitionError::check(BookingStatus::Cancelled, BookingStatus::Confirmed)
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot move a cancelled booking to confirmed.");
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_unexpected_message_is_generic() {
        let err = BookingError::Unexpected(anyhow::anyhow!("no such table: bookings"));
        assert!(!err.message().contains("bookings"));
    }
}
