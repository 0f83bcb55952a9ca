//! Webhook notifications
//!
//! Posts alerts as Feishu/Lark-style text messages
//! (`{"msg_type": "text", "content": {"text": ...}}`).

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::NotifyConfig;
use crate::error::{MonitorError, Result};
use crate::supervisor::{FanoutNotifier, LogNotifier, Notifier};

/// Webhook notification client
#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

#[derive(Serialize)]
struct WebhookMessage {
    msg_type: String,
    content: WebhookContent,
}

#[derive(Serialize)]
struct WebhookContent {
    text: String,
}

impl WebhookNotifier {
    /// Create a notifier from `SCOREWATCH_WEBHOOK_URL`, if set
    pub fn from_env() -> Option<Arc<Self>> {
        std::env::var("SCOREWATCH_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .and_then(|url| Self::new(url, Duration::from_secs(10)).ok())
            .map(|notifier| {
                info!("Webhook notifications enabled");
                Arc::new(notifier)
            })
    }

    /// Create a notifier with an explicit URL
    pub fn new(webhook_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("scorewatch/0.1")
            .build()
            .map_err(|e| {
                MonitorError::Notification(format!("failed to build webhook client: {}", e))
            })?;

        Ok(Self {
            client,
            webhook_url,
        })
    }

    /// Send a text message to the webhook
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let message = WebhookMessage {
            msg_type: "text".to_string(),
            content: WebhookContent {
                text: text.to_string(),
            },
        };

        match self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await
        {
            Ok(resp) => {
                if resp.status().is_success() {
                    debug!("Webhook notification sent successfully");
                    Ok(())
                } else {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    error!("Webhook notification failed: {} - {}", status, body);
                    Err(MonitorError::Notification(format!(
                        "HTTP {}: {}",
                        status, body
                    )))
                }
            }
            Err(e) => {
                error!("Webhook request failed: {}", e);
                Err(MonitorError::Notification(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        self.send_message(&format!("\u{26a0}\u{fe0f} {}\n{}", title, message))
            .await
    }
}

/// Notification chain for the monitor: the log stream alone, or the log
/// stream plus the webhook (from config, else `SCOREWATCH_WEBHOOK_URL`).
/// A webhook failure surfaces as an error even though the log line was written.
pub fn build_notifier(notify: &NotifyConfig, timeout: Duration) -> Result<Arc<dyn Notifier>> {
    let webhook: Option<Arc<dyn Notifier>> = match notify.webhook() {
        Some(url) => {
            info!("Webhook notifications enabled");
            Some(Arc::new(WebhookNotifier::new(url.to_string(), timeout)?))
        }
        None => WebhookNotifier::from_env().map(|w| w as Arc<dyn Notifier>),
    };

    Ok(match webhook {
        Some(webhook) => Arc::new(FanoutNotifier::new(vec![Arc::new(LogNotifier), webhook])),
        None => Arc::new(LogNotifier),
    })
}
