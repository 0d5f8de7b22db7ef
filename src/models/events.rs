use serde::Serialize;

use super::booking::BookingStatus;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    Created,
    StatusChanged,
}

/// Pushed to admin SSE subscribers whenever a booking is created or moves state.
#[derive(Clone, Debug, Serialize)]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    pub booking_id: i64,
    pub customer_id: i64,
    pub service_id: i64,
    pub date: String,
    pub status: BookingStatus,
    pub at: String,
}
