use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::db::queries;
use crate::errors::AppError;
use crate::state::AppState;

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let services = {
        let db = state.db()?;
        queries::list_services(&db, true)?
    };

    Ok(Json(serde_json::json!({"success": true, "services": services})))
}

// GET /api/services/:id
pub async fn get_service(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let service = {
        let db = state.db()?;
        queries::get_service(&db, id)?
    }
    .ok_or_else(|| AppError::NotFound("Service not found.".to_string()))?;

    Ok(Json(serde_json::json!({"success": true, "service": service})))
}
