//! Outbound email transports.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::EmailMessage;
use reqwest::Client;
use tokio::sync::Mutex;

use crate::{NotifyError, Result};

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Sends one rendered email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

#[async_trait]
impl<M: Mailer + ?Sized> Mailer for Arc<M> {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        (**self).send(message).await
    }
}

/// Sends through the SendGrid v3 HTTP API.
pub struct SendGridMailer {
    client: Client,
    api_key: String,
    from: String,
    endpoint: String,
}

impl SendGridMailer {
    /// Creates a mailer for `api_key`, sending as `from`.
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            from: from.into(),
            endpoint: SENDGRID_ENDPOINT.to_string(),
        })
    }

    /// Overrides the API endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn payload(&self, message: &EmailMessage) -> serde_json::Value {
        serde_json::json!({
            "personalizations": [{ "to": [{ "email": message.to }] }],
            "from": { "email": self.from },
            "subject": message.subject,
            "content": [{ "type": "text/html", "value": message.html }],
        })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.payload(message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(to = %message.to, status = %status, "email accepted by SendGrid");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }
}

/// Logs emails instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            bytes = message.html.len(),
            "email not sent, no mail provider configured"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryMailerState {
    sent: Vec<EmailMessage>,
    attempts: usize,
    failures_left: usize,
    fail_always: bool,
}

/// Records emails in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMailer {
    state: Arc<Mutex<InMemoryMailerState>>,
}

impl InMemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` sends fail.
    pub async fn fail_next(&self, count: usize) {
        self.state.lock().await.failures_left = count;
    }

    /// Makes every send fail until switched off.
    pub async fn set_fail_always(&self, fail: bool) {
        self.state.lock().await.fail_always = fail;
    }

    /// Emails delivered so far.
    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.state.lock().await.sent.clone()
    }

    /// Send attempts so far, failed ones included.
    pub async fn attempts(&self) -> usize {
        self.state.lock().await.attempts
    }
}

#[async_trait]
impl Mailer for InMemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let mut state = self.state.lock().await;
        state.attempts += 1;

        if state.fail_always {
            return Err(NotifyError::Unavailable("mailer is down".to_string()));
        }
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(NotifyError::Unavailable("transient failure".to_string()));
        }

        state.sent.push(message.clone());
        Ok(())
    }
}
