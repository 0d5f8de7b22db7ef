//! Thin client for the booking API, used by front ends and scripts.
//!
//! Outbound calls share a semaphore so a burst of submissions cannot flood the
//! server. Rate limiting and server errors are retried with exponential
//! backoff; any other 4xx is a final answer and surfaces as-is. Transport
//! failures are retried only for reads: a booking POST that dropped mid-flight
//! may already have been stored, and posting it again would double-book.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::models::{BookingDetails, Service};
use crate::services::precheck::{self, FieldError, QuotationForm};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("the form has {} problem(s)", .0.len())]
    Invalid(Vec<FieldError>),

    #[error("request rejected ({status}): {message}")]
    Api {
        status: StatusCode,
        message: String,
        errors: Vec<String>,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request queue closed")]
    QueueClosed,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub message: String,
    pub booking: BookingDetails,
    #[serde(rename = "nextSteps", default)]
    pub next_steps: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ServicesResponse {
    services: Vec<Service>,
}

#[derive(Debug, Default, Deserialize)]
struct FailureBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<String>,
}

pub fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Delay before retry number `attempt` (1-based): base, 2x base, 4x base...
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.saturating_sub(1).min(16))
}

pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
    permits: Arc<Semaphore>,
    max_attempts: u32,
    base_delay: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_IN_FLIGHT)),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    pub fn with_max_in_flight(mut self, permits: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(permits.max(1)));
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_delay = base_delay;
        self
    }

    /// Runs the local pre-submit check and, if it passes, posts the request.
    /// The server still validates everything; local problems just save a trip.
    pub async fn submit_booking(
        &self,
        form: &QuotationForm,
        now_local: NaiveDateTime,
        same_day_cutoff: Option<NaiveTime>,
    ) -> Result<SubmitResponse, ClientError> {
        let problems = precheck::precheck(form, now_local, same_day_cutoff);
        if !problems.is_empty() {
            return Err(ClientError::Invalid(problems));
        }

        let url = format!("{}/api/bookings", self.base_url);
        let response = self
            .send_with_retry(false, || self.http.post(&url).json(&form.payload))
            .await?;
        Ok(response.json::<SubmitResponse>().await?)
    }

    pub async fn list_services(&self) -> Result<Vec<Service>, ClientError> {
        let url = format!("{}/api/services", self.base_url);
        let response = self.send_with_retry(true, || self.http.get(&url)).await?;
        Ok(response.json::<ServicesResponse>().await?.services)
    }

    /// `idempotent` requests are also retried after transport errors.
    async fn send_with_retry<F>(
        &self,
        idempotent: bool,
        build: F,
    ) -> Result<reqwest::Response, ClientError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ClientError::QueueClosed)?;

        let mut attempt = 1;
        loop {
            let last_attempt = attempt >= self.max_attempts;
            match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if should_retry(response.status()) && !last_attempt => {
                    tracing::warn!(
                        status = %response.status(),
                        attempt,
                        "booking api busy, retrying"
                    );
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.json::<FailureBody>().await.unwrap_or_default();
                    return Err(ClientError::Api {
                        status,
                        message: body.message,
                        errors: body.errors,
                    });
                }
                Err(e) if idempotent && !last_attempt => {
                    tracing::warn!(error = %e, attempt, "booking api unreachable, retrying");
                }
                Err(e) => return Err(ClientError::Transport(e)),
            }

            tokio::time::sleep(backoff_delay(self.base_delay, attempt)).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_retry() {
        assert!(should_retry(StatusCode::TOO_MANY_REQUESTS));
        assert!(should_retry(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(should_retry(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!should_retry(StatusCode::BAD_REQUEST));
        assert!(!should_retry(StatusCode::UNAUTHORIZED));
        assert!(!should_retry(StatusCode::CONFLICT));
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_precheck_failure_skips_network() {
        // nothing listens here; an attempted request would be a transport error
        let client = ApiClient::new("http://127.0.0.1:9");
        let now = NaiveDateTime::parse_from_str("2026-10-19 09:00", "%Y-%m-%d %H:%M").unwrap();
        let err = client
            .submit_booking(&QuotationForm::default(), now, None)
            .await
            .unwrap_err();
        match err {
            ClientError::Invalid(problems) => {
                assert!(problems.iter().any(|p| p.field == "Customer_ID"));
                assert!(problems.iter().any(|p| p.field == "Date"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
