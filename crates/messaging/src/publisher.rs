//! Event publisher.
//!
//! Publishes JSON envelopes to a durable topic exchange with the event name
//! as routing key. Delivery is best-effort and at-most-once per call: there
//! is no application-level retry around a publish, and callers are expected
//! to log-and-swallow failures because their primary mutation has already
//! committed by the time they publish.

use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Errors surfaced by a publish attempt.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

struct BrokerLink {
    connection: Connection,
    channel: Channel,
}

/// Publisher bound to a single topic exchange.
///
/// The broker link is established lazily on first publish and re-established
/// after an error, so a broker outage at construction time costs nothing.
pub struct EventPublisher {
    url: String,
    exchange: String,
    link: Mutex<Option<BrokerLink>>,
}

impl EventPublisher {
    pub fn new(url: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            exchange: exchange.into(),
            link: Mutex::new(None),
        }
    }

    /// Name of the exchange this publisher declares and publishes to.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Eagerly establish the broker link. Optional; `publish` connects on
    /// demand. Useful at startup to surface a misconfigured URL early.
    pub async fn start(&self) -> Result<(), PublishError> {
        let mut link = self.link.lock().await;
        if link.is_none() {
            *link = Some(self.connect().await?);
        }
        Ok(())
    }

    /// Publish one serialized event. The routing key must equal the
    /// envelope's `event` field.
    pub async fn publish<T: Serialize>(
        &self,
        routing_key: &str,
        payload: &T,
    ) -> Result<(), PublishError> {
        let body = serde_json::to_vec(payload)?;

        let mut link = self.link.lock().await;
        if link.is_none() {
            *link = Some(self.connect().await?);
        }

        let channel = &link.as_ref().expect("link populated above").channel;
        let result = channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await;

        match result {
            Ok(confirm) => {
                confirm.await.map_err(|e| {
                    // The channel is suspect after a failed confirm; drop it
                    // so the next publish reconnects.
                    *link = None;
                    PublishError::Broker(e)
                })?;
                debug!(
                    exchange = %self.exchange,
                    routing_key = routing_key,
                    bytes = body.len(),
                    "Event published"
                );
                Ok(())
            }
            Err(e) => {
                *link = None;
                Err(PublishError::Broker(e))
            }
        }
    }

    /// Close the broker link. Safe to call when never connected.
    pub async fn close(&self) {
        let mut link = self.link.lock().await;
        if let Some(link) = link.take() {
            if let Err(e) = link.connection.close(200, "shutdown").await {
                warn!(error = %e, "Error closing publisher connection");
            } else {
                info!(exchange = %self.exchange, "Publisher connection closed");
            }
        }
    }

    async fn connect(&self) -> Result<BrokerLink, PublishError> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        info!(exchange = %self.exchange, "Publisher connected");
        Ok(BrokerLink {
            connection,
            channel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_constructs_disconnected() {
        let publisher = EventPublisher::new("amqp://localhost:5672", "cave.events");
        assert_eq!(publisher.exchange(), "cave.events");
    }

    #[tokio::test]
    async fn test_close_without_connection_is_noop() {
        let publisher = EventPublisher::new("amqp://localhost:5672", "cave.events");
        publisher.close().await;
    }

    #[tokio::test]
    async fn test_publish_against_unreachable_broker_errors() {
        // Reserved port 1 refuses immediately; the error must surface as a
        // broker error rather than a panic, so callers can swallow it.
        let publisher = EventPublisher::new("amqp://127.0.0.1:1", "cave.events");
        let result = publisher
            .publish("cave.deleted", &serde_json::json!({"event": "cave.deleted"}))
            .await;
        assert!(matches!(result, Err(PublishError::Broker(_))));
    }
}
