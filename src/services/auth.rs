//! Client for the auth service that mints short-lived service tokens.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::kafka::events::Viewer;

#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Mints a token authorizing this service to act on the viewer's behalf.
    async fn request_service_token(&self, service: &str, viewer: &Viewer) -> Result<String>;
}

pub struct AuthServiceClient {
    client: reqwest::Client,
    base_url: String,
    shared_secret: String,
}

impl AuthServiceClient {
    pub fn new(base_url: String, shared_secret: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to create HTTP client");
        Self {
            client,
            base_url,
            shared_secret,
        }
    }
}

#[derive(Debug, Serialize)]
struct ServiceTokenRequest<'a> {
    service: &'a str,
    user: UserDetails<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDetails<'a> {
    id: &'a str,
    login: String,
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct ServiceTokenResponse {
    token: String,
}

#[async_trait]
impl AuthClient for AuthServiceClient {
    async fn request_service_token(&self, service: &str, viewer: &Viewer) -> Result<String> {
        let request = ServiceTokenRequest {
            service,
            user: UserDetails {
                id: &viewer.twitch_user_id,
                login: viewer.twitch_display_name.to_lowercase(),
                display_name: &viewer.twitch_display_name,
            },
        };
        let response = self
            .client
            .post(format!("{}/service-token", self.base_url))
            .bearer_auth(&self.shared_secret)
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "auth service error ({status}): {body}"
            )));
        }
        let body: ServiceTokenResponse = response.json().await?;
        Ok(body.token)
    }
}
