use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use cleanbook::config::{AppConfig, OtpBackend};
use cleanbook::db;
use cleanbook::routes;
use cleanbook::services::mail::webhook::WebhookMailer;
use cleanbook::services::mail::{LogMailer, MailProvider};
use cleanbook::services::otp::{MemoryOtpStore, OtpStore, SqliteOtpStore};
use cleanbook::state::AppState;

const OTP_PURGE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.admin_token == "changeme" {
        tracing::warn!("ADMIN_TOKEN is not set, using the insecure default");
    }

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));

    let mailer: Box<dyn MailProvider> = if config.mail_webhook_url.is_empty() {
        tracing::info!("MAIL_WEBHOOK_URL not set, emails will only be logged");
        Box::new(LogMailer)
    } else {
        tracing::info!("using mail relay at {}", config.mail_webhook_url);
        Box::new(WebhookMailer::new(
            config.mail_webhook_url.clone(),
            config.mail_from.clone(),
        ))
    };

    let otp_store: Box<dyn OtpStore> = match config.otp_backend {
        OtpBackend::Database => Box::new(SqliteOtpStore::new(Arc::clone(&db))),
        OtpBackend::Memory => {
            tracing::warn!("using in-memory OTP store; codes are lost on restart");
            Box::new(MemoryOtpStore::default())
        }
    };

    match config.same_day_cutoff {
        Some(cutoff) => tracing::info!(
            "same-day bookings close at {} (UTC{})",
            cutoff.format("%H:%M"),
            config.business_utc_offset
        ),
        None => tracing::info!("same-day booking cutoff disabled"),
    }

    let (booking_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        mailer,
        otp_store,
        booking_tx,
    });

    let purge_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(OTP_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match purge_state
                .otp_store
                .purge_expired(chrono::Utc::now().naive_utc())
            {
                Ok(0) => {}
                Ok(n) => tracing::info!("purged {n} expired verification codes"),
                Err(e) => tracing::error!(error = %e, "failed to purge verification codes"),
            }
        }
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
