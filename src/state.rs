use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::models::BookingEvent;
use crate::services::booking::BookingPolicy;
use crate::services::mail::MailProvider;
use crate::services::otp::OtpStore;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub mailer: Box<dyn MailProvider>,
    pub otp_store: Box<dyn OtpStore>,
    pub booking_tx: broadcast::Sender<BookingEvent>,
}

impl AppState {
    pub fn db(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.db
            .lock()
            .map_err(|_| AppError::Database(anyhow::anyhow!("database lock poisoned")))
    }

    pub fn booking_policy(&self) -> BookingPolicy {
        BookingPolicy {
            same_day_cutoff: self.config.same_day_cutoff,
            utc_offset: self.config.business_utc_offset,
        }
    }
}
