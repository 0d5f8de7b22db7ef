use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::errors::failure_response;
use crate::models::{BookingEventKind, BookingPayload};
use crate::services::booking::{self, NEXT_STEPS};
use crate::services::events;
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BookingPayload>, JsonRejection>,
) -> Response {
    let payload = match payload {
        Ok(Json(p)) => p,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "malformed booking body");
            return failure_response(
                StatusCode::BAD_REQUEST,
                "Invalid request body.",
                &[rejection.body_text()],
            );
        }
    };

    let now = chrono::Utc::now().naive_utc();
    let policy = state.booking_policy();

    let result = {
        let mut db = match state.db() {
            Ok(db) => db,
            Err(e) => return e.into_response(),
        };
        booking::create_booking(&mut db, &payload, &policy, now)
    };

    match result {
        Ok(details) => {
            events::publish(&state, BookingEventKind::Created, &details.booking);
            (
                StatusCode::CREATED,
                Json(serde_json::json!({
                    "success": true,
                    "message": "Your quotation request has been submitted.",
                    "booking": details,
                    "nextSteps": NEXT_STEPS,
                })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::info!(
                customer_id = ?payload.customer_id,
                service_id = ?payload.service_id,
                status = e.status().as_u16(),
                reason = %e.message(),
                "booking request rejected"
            );
            e.into_response()
        }
    }
}
