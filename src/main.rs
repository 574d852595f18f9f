//! Consumer entry point: wires configuration, the database, the external
//! service clients, and the Kafka worker pool together.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imagegen_service::config::Config;
use imagegen_service::db::image_repo::ImageRequestRepo;
use imagegen_service::kafka::consumer::{ConsumerConfig, GenerationConsumer};
use imagegen_service::kafka::producer::AlertProducer;
use imagegen_service::services::auth::AuthServiceClient;
use imagegen_service::services::discord::DiscordClient;
use imagegen_service::services::filters::ImfRunner;
use imagegen_service::services::generation::OpenAiClient;
use imagegen_service::services::handler::RequestHandler;
use imagegen_service::services::ledger::LedgerServiceClient;
use imagegen_service::services::storage::SpacesClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imagegen_service=info,rdkafka=warn,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting image generation consumer");

    dotenvy::dotenv().ok();
    let config = Config::from_env().context("failed to load configuration")?;

    // The post-processor is an external binary; refusing to start without it
    // beats failing on the first friend request.
    let imf_binary_path = match &config.imf_binary_path {
        Some(path) => std::path::PathBuf::from(path),
        None => ImfRunner::resolve_binary().context(
            "imf is not in the PATH and was not found relative to cwd in external/bin",
        )?,
    };
    info!(binary = %imf_binary_path.display(), "resolved imf binary");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    info!("database connection pool initialized");

    let storage = SpacesClient::new(
        &config.spaces_access_key_id,
        &config.spaces_secret_key,
        &config.spaces_endpoint_url,
        &config.spaces_region_name,
        &config.spaces_bucket_name,
    )
    .await;
    info!(bucket = %config.spaces_bucket_name, "storage client initialized");

    let producer = AlertProducer::new(&config.kafka_brokers, config.onscreen_events_topic.clone())
        .context("failed to initialize alert producer")?;

    let discord = config
        .discord_ghosts_webhook_url
        .clone()
        .map(|webhook_url| Arc::new(DiscordClient::new(webhook_url)));

    let handler = Arc::new(RequestHandler::new(
        Arc::new(ImageRequestRepo::new(pool)),
        Arc::new(OpenAiClient::new(config.openai_api_key.clone())),
        Arc::new(ImfRunner::new(imf_binary_path)),
        Arc::new(storage),
        Arc::new(AuthServiceClient::new(
            config.auth_url.clone(),
            config.auth_shared_secret.clone(),
        )),
        Arc::new(LedgerServiceClient::new(config.ledger_url.clone())),
        Arc::new(producer),
        discord,
    ));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for shutdown signal");
            return;
        }
        info!("shutdown signal received");
        signal_token.cancel();
    });

    let consumer_config = ConsumerConfig {
        brokers: config.kafka_brokers.clone(),
        topic: config.generation_requests_topic.clone(),
        group_id: config.kafka_group_id.clone(),
    };
    let consumer = GenerationConsumer::new(&consumer_config, handler, shutdown)?;
    consumer
        .run()
        .await
        .context("encountered an error during message handling")?;

    info!("image generation consumer stopped");
    Ok(())
}
