use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;

use super::MailProvider;

/// Hands messages to an HTTP mail relay as JSON.
pub struct WebhookMailer {
    url: String,
    from: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl WebhookMailer {
    pub fn new(url: String, from: String) -> Self {
        Self {
            url,
            from,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl MailProvider for WebhookMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(&OutgoingMail {
                from: &self.from,
                to,
                subject,
                text: body,
            })
            .send()
            .await
            .context("failed to reach mail relay")?
            .error_for_status()
            .context("mail relay returned error")?;

        Ok(())
    }
}
