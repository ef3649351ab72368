use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Push notifications through a webhook. Urgent ones are awaited, the rest
/// are sent in the background and only logged on failure.
pub struct Notifier {
    client: Client,
    webhook_url: Option<String>,
}

impl Notifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    pub async fn send_urgent(&self, notification: &Notification) -> Result<()> {
        let url = self
            .webhook_url
            .as_deref()
            .ok_or_else(|| anyhow!("push_webhook_url is not configured"))?;
        let res = self.client.post(url).json(notification).send().await?;
        if !res.status().is_success() {
            return Err(anyhow!("Push webhook returned {}", res.status()));
        }
        info!("Notification delivered: {}", notification.title);
        Ok(())
    }

    pub fn queue(self: &Arc<Self>, notification: Notification) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send_urgent(&notification).await {
                warn!("Queued notification '{}' failed: {}", notification.title, e);
            }
        });
    }
}
