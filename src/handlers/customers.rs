use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::NewCustomer;
use crate::services::policy;
use crate::state::AppState;

// POST /api/customers
pub async fn register_customer(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewCustomer>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name is required.".to_string()));
    }
    if !policy::is_valid_email(&body.email) {
        return Err(AppError::BadRequest(
            "Please provide a valid email address.".to_string(),
        ));
    }

    let customer = {
        let db = state.db()?;
        let id = queries::create_customer(&db, &body)?;
        queries::get_customer(&db, id)?
    }
    .ok_or_else(|| AppError::Database(anyhow::anyhow!("customer vanished after insert")))?;

    tracing::info!(customer_id = customer.id, "customer registered");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"success": true, "customer": customer})),
    ))
}

// GET /api/customers/:id
pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let customer = {
        let db = state.db()?;
        queries::get_customer(&db, id)?
    }
    .ok_or_else(|| AppError::NotFound("Customer not found.".to_string()))?;

    Ok(Json(serde_json::json!({"success": true, "customer": customer})))
}

// GET /api/customers/:id/bookings
pub async fn list_customer_bookings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let bookings = {
        let db = state.db()?;
        if queries::get_customer(&db, id)?.is_none() {
            return Err(AppError::NotFound("Customer not found.".to_string()));
        }
        queries::list_customer_bookings(&db, id)?
    };

    Ok(Json(serde_json::json!({"success": true, "bookings": bookings})))
}
