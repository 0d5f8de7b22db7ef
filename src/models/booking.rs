use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use super::customer::CustomerSummary;
use super::service::ServiceSummary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    #[serde(rename = "Booking_ID")]
    pub id: i64,
    #[serde(rename = "Customer_ID")]
    pub customer_id: i64,
    #[serde(rename = "Service_ID")]
    pub service_id: i64,
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Duration")]
    pub duration_minutes: i64,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Special_Instructions")]
    pub special_instructions: Option<String>,
    #[serde(rename = "Property_Type")]
    pub property_type: Option<String>,
    #[serde(rename = "Property_Size")]
    pub property_size: Option<String>,
    #[serde(rename = "Cleaning_Frequency")]
    pub cleaning_frequency: Option<String>,
    #[serde(rename = "Status")]
    pub status: BookingStatus,
    #[serde(rename = "Quoted_Amount")]
    pub quoted_amount: Option<f64>,
    #[serde(rename = "Created_At")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "Updated_At")]
    pub updated_at: NaiveDateTime,
}

/// A booking joined with the customer and service it references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    #[serde(rename = "Customer")]
    pub customer: CustomerSummary,
    #[serde(rename = "Service")]
    pub service: ServiceSummary,
}

/// Normalized, persist-ready booking produced by the validator.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub customer_id: i64,
    pub service_id: i64,
    pub date: NaiveDate,
    pub time: String,
    pub duration_minutes: i64,
    pub address: String,
    pub special_instructions: Option<String>,
    pub property_type: Option<String>,
    pub property_size: Option<String>,
    pub cleaning_frequency: Option<String>,
    pub status: BookingStatus,
}

/// Raw `POST /api/bookings` body. Everything is optional here; presence is
/// enforced by the validator so each omission gets its own message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingPayload {
    #[serde(rename = "Customer_ID", default, deserialize_with = "lenient_i64")]
    pub customer_id: Option<i64>,
    #[serde(rename = "Service_ID", default, deserialize_with = "lenient_i64")]
    pub service_id: Option<i64>,
    #[serde(rename = "Date", default)]
    pub date: Option<String>,
    #[serde(rename = "Time", default)]
    pub time: Option<String>,
    #[serde(rename = "Special_Instructions", default)]
    pub special_instructions: Option<String>,
    #[serde(rename = "Duration", default, deserialize_with = "lenient_i64")]
    pub duration: Option<i64>,
    #[serde(rename = "Address_Street", default)]
    pub address_street: Option<String>,
    #[serde(rename = "Address_City", default)]
    pub address_city: Option<String>,
    #[serde(rename = "Address_State", default)]
    pub address_state: Option<String>,
    #[serde(rename = "Address_Postal_Code", default)]
    pub address_postal_code: Option<String>,
    #[serde(rename = "Property_Type", default)]
    pub property_type: Option<String>,
    #[serde(rename = "Property_Size", default)]
    pub property_size: Option<String>,
    #[serde(rename = "Cleaning_Frequency", default)]
    pub cleaning_frequency: Option<String>,
}

// Form fields arrive as numbers or numeric strings; blanks count as absent.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected an integer")),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected an integer, got {s:?}"))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected an integer, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStatus {
    Requested,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    /// Statuses ignored by the duplicate-booking check.
    pub const TERMINAL_EXCLUDED: [BookingStatus; 2] =
        [BookingStatus::Cancelled, BookingStatus::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Requested => "requested",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in-progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "requested" => Some(BookingStatus::Requested),
            "confirmed" => Some(BookingStatus::Confirmed),
            "in-progress" | "in_progress" => Some(BookingStatus::InProgress),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "rejected" => Some(BookingStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Rejected
        )
    }

    /// Whether this booking still occupies its (customer, service, date) slot.
    pub fn is_live(&self) -> bool {
        !Self::TERMINAL_EXCLUDED.contains(self)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Requested, Confirmed)
                | (Requested, Cancelled)
                | (Requested, Rejected)
                | (Confirmed, InProgress)
                | (Confirmed, Cancelled)
                | (Confirmed, Rejected)
                | (InProgress, Completed)
        )
    }
}
