pub mod webhook;

use async_trait::async_trait;

#[async_trait]
pub trait MailProvider: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Dev mailer: writes the message to the log instead of delivering it.
pub struct LogMailer;

#[async_trait]
impl MailProvider for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        tracing::info!(to = %to, subject = %subject, body = %body, "mail (log only)");
        Ok(())
    }
}
