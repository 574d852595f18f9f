//! Kafka consumer that feeds generation requests to the handler pool.
//!
//! Each parsed message runs on its own task so one slow generation never
//! blocks the next. The loop stops when the stream closes or shutdown
//! fires, then waits for every in-flight handler.

use futures_util::StreamExt;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::ClientConfig;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{Error, Result};
use crate::kafka::events::GenerationRequest;
use crate::services::handler::RequestHandler;

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
}

pub struct GenerationConsumer {
    consumer: StreamConsumer,
    handler: Arc<RequestHandler>,
    shutdown: CancellationToken,
}

impl GenerationConsumer {
    pub fn new(
        config: &ConsumerConfig,
        handler: Arc<RequestHandler>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .create()
            .map_err(|e| Error::Transport(format!("failed to create Kafka consumer: {e}")))?;

        consumer.subscribe(&[&config.topic]).map_err(|e| {
            Error::Transport(format!("failed to subscribe to {}: {e}", config.topic))
        })?;

        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            "generation consumer initialized"
        );

        Ok(Self {
            consumer,
            handler,
            shutdown,
        })
    }

    /// Runs the consume loop until the stream closes or shutdown fires,
    /// then drains in-flight handler tasks and reports the first failure.
    pub async fn run(&self) -> Result<()> {
        let mut stream = self.consumer.stream();
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();
        let mut first_error: Option<Error> = None;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("shutdown signal received; no longer accepting messages");
                    break;
                }
                message = stream.next() => {
                    match message {
                        Some(Ok(message)) => self.dispatch(&message, &mut tasks),
                        Some(Err(err)) => {
                            // Transient; keep consuming.
                            error!(error = %err, "Kafka consumer error");
                        }
                        None => {
                            warn!("message stream ended; exiting consume loop");
                            break;
                        }
                    }
                }
                Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                    record_outcome(finished, &mut first_error);
                }
            }
        }

        while let Some(finished) = tasks.join_next().await {
            record_outcome(finished, &mut first_error);
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn dispatch(&self, message: &BorrowedMessage<'_>, tasks: &mut JoinSet<Result<()>>) {
        let Some(payload) = message.payload() else {
            warn!("empty message payload, skipping");
            return;
        };
        let request: GenerationRequest = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "failed to parse generation request, skipping");
                return;
            }
        };
        info!(
            request_type = ?request.request_type,
            viewer = %request.viewer.twitch_user_id,
            "consumed generation request"
        );

        let handler = Arc::clone(&self.handler);
        let token = self.shutdown.child_token();
        tasks.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => Err(Error::Cancelled),
                result = handler.handle(&request) => {
                    if let Err(err) = &result {
                        warn!(error = %err, "failed to handle generation request");
                    }
                    result
                }
            }
        });
    }
}

fn record_outcome(
    finished: std::result::Result<Result<()>, tokio::task::JoinError>,
    first_error: &mut Option<Error>,
) {
    match finished {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            if first_error.is_none() {
                *first_error = Some(err);
            }
        }
        Err(join_err) => {
            error!(error = %join_err, "handler task panicked");
            if first_error.is_none() {
                *first_error = Some(Error::Transport(format!(
                    "handler task failed: {join_err}"
                )));
            }
        }
    }
}
