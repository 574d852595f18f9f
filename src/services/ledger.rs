//! Client for the ledger service's two-phase alert redemption.
//!
//! A redemption starts as a pending debit against the viewer's balance.
//! `accept` commits it; `finalize` refunds it unless it was accepted, and is
//! safe to call on every exit path.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Creates a pending debit of `cost` points against the user identified
    /// by `token`.
    async fn request_alert_redemption(
        &self,
        token: &str,
        cost: i32,
        alert_type: &str,
        metadata: serde_json::Value,
    ) -> Result<Box<dyn AlertTransaction>>;
}

#[async_trait]
pub trait AlertTransaction: Send {
    /// Commits the pending debit.
    async fn accept(&mut self) -> Result<()>;

    /// Rejects the pending debit unless it was accepted. Idempotent.
    async fn finalize(&mut self);
}

#[derive(Clone)]
pub struct LedgerServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl LedgerServiceClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to create HTTP client");
        Self { client, base_url }
    }

    async fn resolve(&self, token: &str, flow_id: Uuid, action: &str) -> Result<()> {
        let url = format!("{}/transactions/{}/{}", self.base_url, flow_id, action);
        let response = self.client.post(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "ledger service error ({status}): {body}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedemptionResponse {
    flow_id: Uuid,
}

#[async_trait]
impl LedgerClient for LedgerServiceClient {
    async fn request_alert_redemption(
        &self,
        token: &str,
        cost: i32,
        alert_type: &str,
        metadata: serde_json::Value,
    ) -> Result<Box<dyn AlertTransaction>> {
        let body = json!({
            "type": alert_type,
            "numPoints": cost,
            "alertMetadata": metadata,
        });
        let response = self
            .client
            .post(format!("{}/alert-redemption", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "ledger service error ({status}): {body}"
            )));
        }
        let redemption: RedemptionResponse = response.json().await?;

        Ok(Box::new(LedgerTransaction {
            client: self.clone(),
            token: token.to_string(),
            flow_id: redemption.flow_id,
            state: TransactionState::Pending,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    Pending,
    Accepted,
    Finalized,
}

pub struct LedgerTransaction {
    client: LedgerServiceClient,
    token: String,
    flow_id: Uuid,
    state: TransactionState,
}

#[async_trait]
impl AlertTransaction for LedgerTransaction {
    async fn accept(&mut self) -> Result<()> {
        self.client.resolve(&self.token, self.flow_id, "accept").await?;
        self.state = TransactionState::Accepted;
        Ok(())
    }

    async fn finalize(&mut self) {
        if self.state == TransactionState::Pending {
            if let Err(err) = self.client.resolve(&self.token, self.flow_id, "reject").await {
                warn!(
                    flow_id = %self.flow_id,
                    error = %err,
                    "failed to reject pending alert redemption"
                );
            }
        }
        self.state = TransactionState::Finalized;
    }
}

impl Drop for LedgerTransaction {
    fn drop(&mut self) {
        // A pipeline cancelled mid-await never reaches its explicit
        // finalize; the refund must still be issued.
        if self.state == TransactionState::Pending {
            let client = self.client.clone();
            let token = std::mem::take(&mut self.token);
            let flow_id = self.flow_id;
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(err) = client.resolve(&token, flow_id, "reject").await {
                        warn!(
                            flow_id = %flow_id,
                            error = %err,
                            "failed to reject alert redemption during cleanup"
                        );
                    }
                });
            }
        }
    }
}
