//! Notification provider client.
//!
//! The provider is an external templated email/SMS gateway. Delivery errors
//! carry an HTTP-like status; 5xx-class statuses (and timeouts, which are
//! indistinguishable from an unresponsive provider) are retryable once.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;
use service_core::async_trait::async_trait;
use thiserror::Error;

use crate::config::NotifyConfig;

/// Typed delivery failure with the provider's HTTP-like status.
#[derive(Debug, Clone, Error)]
#[error("delivery failed with status {status}: {message}")]
pub struct DeliveryError {
    pub status: u16,
    pub message: String,
}

impl DeliveryError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 5xx-class statuses are worth one synchronous retry.
    pub fn is_retryable(&self) -> bool {
        self.status >= 500
    }
}

pub type Personalisation = HashMap<String, String>;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(
        &self,
        template_id: &str,
        address: &str,
        personalisation: &Personalisation,
    ) -> Result<(), DeliveryError>;

    async fn send_sms(
        &self,
        template_id: &str,
        number: &str,
        personalisation: &Personalisation,
    ) -> Result<(), DeliveryError>;
}

/// HTTP client for the notification provider.
#[derive(Clone)]
pub struct NotifyClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl NotifyClient {
    pub fn new(config: &NotifyConfig) -> Result<Self, service_core::error::AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| service_core::error::AppError::ConfigError(anyhow::anyhow!(e)))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<(), DeliveryError> {
        let url = format!("{}{}", self.endpoint, path);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                // A timeout or connection error reads the same as an
                // unavailable provider.
                DeliveryError::new(503, format!("provider unreachable: {}", e))
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(DeliveryError::new(status.as_u16(), message))
    }
}

#[async_trait]
impl Notifier for NotifyClient {
    async fn send_email(
        &self,
        template_id: &str,
        address: &str,
        personalisation: &Personalisation,
    ) -> Result<(), DeliveryError> {
        self.post(
            "/v2/notifications/email",
            json!({
                "template_id": template_id,
                "email_address": address,
                "personalisation": personalisation,
            }),
        )
        .await?;

        tracing::info!(template_id = %template_id, "Email notification accepted");
        Ok(())
    }

    async fn send_sms(
        &self,
        template_id: &str,
        number: &str,
        personalisation: &Personalisation,
    ) -> Result<(), DeliveryError> {
        self.post(
            "/v2/notifications/sms",
            json!({
                "template_id": template_id,
                "phone_number": number,
                "personalisation": personalisation,
            }),
        )
        .await?;

        tracing::info!(template_id = %template_id, "SMS notification accepted");
        Ok(())
    }
}

/// Recording notifier for tests. Failures can be queued up front; each
/// queued failure consumes one send attempt.
#[derive(Default)]
pub struct MockNotifier {
    sent: std::sync::Mutex<Vec<SentNotification>>,
    failures: std::sync::Mutex<std::collections::VecDeque<u16>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub channel: Channel,
    pub template_id: String,
    pub to: String,
    pub personalisation: Personalisation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Sms,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure status for the next send attempt.
    pub fn queue_failure(&self, status: u16) {
        self.failures.lock().unwrap().push_back(status);
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn record(
        &self,
        channel: Channel,
        template_id: &str,
        to: &str,
        personalisation: &Personalisation,
    ) -> Result<(), DeliveryError> {
        if let Some(status) = self.failures.lock().unwrap().pop_front() {
            return Err(DeliveryError::new(status, "queued failure"));
        }
        self.sent.lock().unwrap().push(SentNotification {
            channel,
            template_id: template_id.to_string(),
            to: to.to_string(),
            personalisation: personalisation.clone(),
        });
        Ok(())
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_email(
        &self,
        template_id: &str,
        address: &str,
        personalisation: &Personalisation,
    ) -> Result<(), DeliveryError> {
        self.record(Channel::Email, template_id, address, personalisation)
    }

    async fn send_sms(
        &self,
        template_id: &str,
        number: &str,
        personalisation: &Personalisation,
    ) -> Result<(), DeliveryError> {
        self.record(Channel::Sms, template_id, number, personalisation)
    }
}
