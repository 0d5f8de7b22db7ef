use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::{failure_response, AppError};
use crate::models::{Admin, AdminSummary};
use crate::services::otp;
use crate::services::{credentials, policy};
use crate::state::AppState;

use super::admin::check_auth;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn find_admin(state: &AppState, email: &str) -> Result<Admin, AppError> {
    let db = state.db()?;
    queries::get_admin_by_email(&db, &normalize_email(email))?
        .ok_or_else(|| AppError::NotFound("Admin account not found.".to_string()))
}

async fn send_code(state: &AppState, admin: &Admin) -> Result<(), AppError> {
    let now = chrono::Utc::now().naive_utc();
    let ttl = state.config.otp_ttl_minutes;
    let code = otp::issue(
        state.otp_store.as_ref(),
        &state.config.credential_secret,
        admin.id,
        ttl,
        now,
    )?;

    let body = format!(
        "Hello {},\n\nYour verification code is {code}. It expires in {ttl} minutes.\n\
         Use it to set the password for your admin account.",
        admin.name
    );
    state
        .mailer
        .send(&admin.email, "Your admin verification code", &body)
        .await
        .map_err(|e| AppError::Mail(e.to_string()))
}

fn discard_unverified(state: &AppState, admin_id: i64) {
    if let Err(e) = state.otp_store.remove(admin_id) {
        tracing::warn!(admin_id, error = %e, "failed to drop verification code");
    }
    let removed = state
        .db()
        .map_err(|e| anyhow::anyhow!(e.to_string()))
        .and_then(|db| queries::delete_inactive_admin(&db, admin_id));
    match removed {
        Ok(_) => tracing::info!(admin_id, "rolled back admin account after failed delivery"),
        Err(e) => tracing::error!(admin_id, error = %e, "failed to roll back admin account"),
    }
}

// POST /api/admin/admins
#[derive(Deserialize)]
pub struct ProvisionRequest {
    pub email: String,
    pub name: String,
}

pub async fn provision_admin(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ProvisionRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let email = normalize_email(&body.email);
    let name = body.name.trim();
    if !policy::is_valid_email(&email) {
        return Err(AppError::BadRequest(
            "Please provide a valid email address.".to_string(),
        ));
    }
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required.".to_string()));
    }

    let admin = {
        let db = state.db()?;
        if queries::get_admin_by_email(&db, &email)?.is_some() {
            return Err(AppError::Conflict(
                "An admin with this email already exists.".to_string(),
            ));
        }
        let id = queries::create_admin(&db, &email, name)?;
        queries::get_admin(&db, id)?
    }
    .ok_or_else(|| AppError::Database(anyhow::anyhow!("admin vanished after insert")))?;

    tracing::info!(admin_id = admin.id, "admin account provisioned");
    if let Err(e) = send_code(&state, &admin).await {
        // Without a delivered code the account can never be activated, so undo it
        // and let the caller provision again.
        discard_unverified(&state, admin.id);
        return Err(e);
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "Admin created. A verification code has been sent by email.",
            "admin": AdminSummary::from(&admin),
        })),
    ))
}

// POST /api/admin/otp/resend
#[derive(Deserialize)]
pub struct ResendRequest {
    pub email: String,
}

pub async fn resend_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResendRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let admin = find_admin(&state, &body.email)?;
    if admin.is_active {
        return Err(AppError::Conflict(
            "This account is already set up. Please log in.".to_string(),
        ));
    }

    send_code(&state, &admin).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "A new verification code has been sent.",
    })))
}

// POST /api/admin/otp/verify
#[derive(Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    Json(body): Json<VerifyRequest>,
) -> Result<Response, AppError> {
    let admin = find_admin(&state, &body.email)?;
    if admin.is_active {
        return Err(AppError::Conflict(
            "This account is already set up. Please log in.".to_string(),
        ));
    }

    let problems = credentials::password_problems(&body.new_password);
    if !problems.is_empty() {
        return Ok(failure_response(
            StatusCode::BAD_REQUEST,
            "Password does not meet the requirements.",
            &problems,
        ));
    }

    otp::verify(
        state.otp_store.as_ref(),
        &state.config.credential_secret,
        admin.id,
        &body.otp,
        chrono::Utc::now().naive_utc(),
    )?;

    let cost = state.config.password_cost;
    let password = body.new_password;
    let hash = tokio::task::spawn_blocking(move || credentials::hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Database(e.into()))??;
    let admin = {
        let db = state.db()?;
        queries::set_admin_password(&db, admin.id, &hash)?;
        queries::get_admin(&db, admin.id)?
    }
    .ok_or_else(|| AppError::NotFound("Admin account not found.".to_string()))?;

    tracing::info!(admin_id = admin.id, "admin account activated");

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Password set. You can now log in.",
        "admin": AdminSummary::from(&admin),
    }))
    .into_response())
}

// POST /api/admin/login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let admin = {
        let db = state.db()?;
        queries::get_admin_by_email(&db, &normalize_email(&body.email))?
    };

    let stored_hash = admin
        .as_ref()
        .filter(|a| a.is_active)
        .and_then(|a| a.password_hash.clone());
    let verified = match stored_hash {
        Some(hash) => {
            let password = body.password;
            tokio::task::spawn_blocking(move || credentials::verify_password(&password, &hash))
                .await
                .map_err(|e| AppError::Database(e.into()))?
        }
        None => false,
    };

    match admin {
        Some(admin) if verified => {
            tracing::info!(admin_id = admin.id, "admin logged in");
            Ok(Json(serde_json::json!({
                "success": true,
                "admin": AdminSummary::from(&admin),
            })))
        }
        _ => {
            tracing::warn!("failed admin login");
            Err(AppError::Unauthorized)
        }
    }
}
