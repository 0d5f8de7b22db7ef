use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use serde::Deserialize;
use tokio_stream::StreamExt;

use crate::db::queries;
use crate::errors::{AppError, StatusTransitionError};
use crate::models::{BookingEventKind, BookingStatus, NewService, ServiceUpdate};
use crate::services::events;
use crate::state::AppState;

pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status_filter = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(
            BookingStatus::parse(s)
                .ok_or_else(|| AppError::BadRequest(format!("unknown booking status: {s}")))?,
        ),
    };
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let bookings = {
        let db = state.db()?;
        queries::list_bookings(&db, status_filter, limit)?
    };

    Ok(Json(serde_json::json!({"success": true, "bookings": bookings})))
}

// GET /api/admin/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.db()?;
        queries::get_booking_details(&db, id)?
    }
    .ok_or_else(|| AppError::NotFound("Booking not found.".to_string()))?;

    Ok(Json(serde_json::json!({"success": true, "booking": booking})))
}

// POST /api/admin/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
    pub quoted_amount: Option<f64>,
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<StatusUpdateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let next = BookingStatus::parse(&body.status)
        .ok_or_else(|| AppError::BadRequest(format!("unknown booking status: {}", body.status)))?;
    if matches!(body.quoted_amount, Some(amount) if !amount.is_finite() || amount < 0.0) {
        return Err(AppError::BadRequest(
            "quoted_amount must be a non-negative number".to_string(),
        ));
    }

    let details = {
        let db = state.db()?;
        let current = queries::get_booking(&db, id)?
            .ok_or_else(|| AppError::NotFound("Booking not found.".to_string()))?;

        StatusTransitionError::check(current.status, next)?;

        queries::update_booking_status(&db, id, next, body.quoted_amount)?;
        queries::get_booking_details(&db, id)?
    }
    .ok_or_else(|| AppError::NotFound("Booking not found.".to_string()))?;

    tracing::info!(booking_id = id, status = next.as_str(), "booking status updated");
    events::publish(&state, BookingEventKind::StatusChanged, &details.booking);

    Ok(Json(serde_json::json!({"success": true, "booking": details})))
}

// POST /api/admin/services
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewService>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name is required.".to_string()));
    }

    let service = {
        let db = state.db()?;
        let id = queries::create_service(&db, &body)?;
        queries::get_service(&db, id)?
    }
    .ok_or_else(|| AppError::Database(anyhow::anyhow!("service vanished after insert")))?;

    tracing::info!(service_id = service.id, name = %service.name, "service created");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"success": true, "service": service})),
    ))
}

// PUT /api/admin/services/:id
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<ServiceUpdate>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let service = {
        let db = state.db()?;
        if !queries::update_service(&db, id, &body)? {
            return Err(AppError::NotFound("Service not found.".to_string()));
        }
        queries::get_service(&db, id)?
    }
    .ok_or_else(|| AppError::NotFound("Service not found.".to_string()))?;

    tracing::info!(service_id = id, available = service.is_available, "service updated");

    Ok(Json(serde_json::json!({"success": true, "service": service})))
}

// GET /api/admin/bookings/events (SSE)
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
    pub last_id: Option<i64>,
}

pub async fn booking_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource can't set headers, so the token rides in the query string
    let token = query.token.as_deref().unwrap_or("");
    if token.is_empty() || token != state.config.admin_token {
        return Err(AppError::Unauthorized);
    }

    // Subscribe first so nothing created while the backlog loads is missed
    let rx = state.booking_tx.subscribe();
    let backlog = match query.last_id {
        Some(last_id) => {
            let db = state.db()?;
            queries::list_bookings_since(&db, last_id)?
        }
        None => vec![],
    };
    tracing::debug!(replayed = backlog.len(), "admin subscribed to booking events");

    let stream = events::replay_then_follow(backlog, rx)
        .map(|event| Ok::<_, Infallible>(events::sse_event(&event)));

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keepalive"),
    ))
}
