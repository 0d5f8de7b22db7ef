use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        // storefront
        .route("/api/services", get(handlers::catalog::list_services))
        .route("/api/services/:id", get(handlers::catalog::get_service))
        .route("/api/customers", post(handlers::customers::register_customer))
        .route("/api/customers/:id", get(handlers::customers::get_customer))
        .route(
            "/api/customers/:id/bookings",
            get(handlers::customers::list_customer_bookings),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        // back office
        .route("/api/admin/bookings", get(handlers::admin::list_bookings))
        .route(
            "/api/admin/bookings/events",
            get(handlers::admin::booking_events),
        )
        .route("/api/admin/bookings/:id", get(handlers::admin::get_booking))
        .route(
            "/api/admin/bookings/:id/status",
            post(handlers::admin::update_booking_status),
        )
        .route("/api/admin/services", post(handlers::admin::create_service))
        .route(
            "/api/admin/services/:id",
            axum::routing::put(handlers::admin::update_service),
        )
        .route(
            "/api/admin/admins",
            post(handlers::admin_accounts::provision_admin),
        )
        .route(
            "/api/admin/otp/resend",
            post(handlers::admin_accounts::resend_otp),
        )
        .route(
            "/api/admin/otp/verify",
            post(handlers::admin_accounts::verify_otp),
        )
        .route("/api/admin/login", post(handlers::admin_accounts::login))
        .with_state(state)
}
