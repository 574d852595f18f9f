//! Fire-and-forget Discord webhook for finished ghost alerts.

use serde_json::json;
use std::time::Duration;

use crate::error::{Error, Result};

/// Client for the webhook that mirrors finished ghost alerts into Discord
pub struct DiscordClient {
    client: reqwest::Client,
    webhook_url: String,
}

impl DiscordClient {
    pub fn new(webhook_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to create HTTP client");
        Self {
            client,
            webhook_url,
        }
    }

    /// Posts a finished ghost alert to the webhook. Callers treat failures
    /// as log-and-move-on; the alert itself has already fired.
    pub async fn post_ghost_alert(
        &self,
        username: &str,
        description: &str,
        image_url: &str,
    ) -> Result<()> {
        let body = json!({
            "embeds": [{
                "title": format!("{username} has generated a ghost"),
                "description": description,
                "image": { "url": image_url },
            }],
        });
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "discord webhook error ({status}): {body}"
            )));
        }
        Ok(())
    }
}
