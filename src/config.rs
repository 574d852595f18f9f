//! Configuration for the generation worker
use serde::Deserialize;

/// Main configuration struct, loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Postgres connection URL for the `dynamo` schema
    pub database_url: String,

    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    /// Kafka broker addresses
    #[serde(default = "default_kafka_brokers")]
    pub kafka_brokers: String,

    /// Topic carrying inbound generation requests
    #[serde(default = "default_generation_requests_topic")]
    pub generation_requests_topic: String,

    /// Topic carrying outbound onscreen alert events
    #[serde(default = "default_onscreen_events_topic")]
    pub onscreen_events_topic: String,

    /// Consumer group ID
    #[serde(default = "default_kafka_group_id")]
    pub kafka_group_id: String,

    /// Credential for the image/text generation API
    pub openai_api_key: String,

    /// Base URL of the auth service that mints service tokens
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Shared secret authorizing service-token requests
    pub auth_shared_secret: String,

    /// Base URL of the ledger service that debits viewer points
    #[serde(default = "default_ledger_url")]
    pub ledger_url: String,

    /// Webhook for posting finished ghost alerts; disabled when unset
    #[serde(default)]
    pub discord_ghosts_webhook_url: Option<String>,

    pub spaces_bucket_name: String,
    pub spaces_region_name: String,
    /// Endpoint origin of the S3-compatible store, e.g. `nyc3.digitaloceanspaces.com`
    pub spaces_endpoint_url: String,
    pub spaces_access_key_id: String,
    pub spaces_secret_key: String,

    /// Explicit path to the `imf` binary; resolved from the PATH or from an
    /// `external/bin` sibling directory when unset
    #[serde(default)]
    pub imf_binary_path: Option<String>,
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_kafka_brokers() -> String {
    "localhost:9092".to_string()
}

fn default_generation_requests_topic() -> String {
    "generation-requests".to_string()
}

fn default_onscreen_events_topic() -> String {
    "onscreen-events".to_string()
}

fn default_kafka_group_id() -> String {
    "imagegen-service".to_string()
}

fn default_auth_url() -> String {
    "http://localhost:5002".to_string()
}

fn default_ledger_url() -> String {
    "http://localhost:5003".to_string()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}
