//! Event consumer.
//!
//! A durable topic subscriber that binds an exclusive queue per process,
//! decodes JSON envelopes and dispatches on the `event` field to registered
//! handlers. Messages are always acknowledged: an unknown event name or a
//! failing handler is logged and dropped rather than requeued, trading a
//! lost cascade for a queue that never stalls.
//!
//! Reconnection is the transport loop's job: on connection loss the
//! supervision task backs off and redials until `stop` is called.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties, ExchangeKind};
use shared::retry::RetryPolicy;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Handler for one event type, keyed by exact event-name match.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    /// The `event` field value (and routing key) this handler consumes.
    fn event_name(&self) -> &'static str;

    /// React to one decoded envelope. Returns Ok(()) on success, Err with
    /// message on failure; either way the message is acknowledged.
    async fn handle(&self, payload: serde_json::Value) -> Result<(), String>;
}

/// Exchange binding for one registered handler.
struct Binding {
    exchange: String,
    routing_key: &'static str,
}

/// Outcome of dispatching one raw message body. Surfaced for tests; the
/// consumer loop acks regardless of the variant.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    Handled,
    HandlerFailed,
    UnknownEvent,
    Malformed,
}

/// Lifecycle state of the consume loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Disconnected,
    Connecting,
    Consuming,
}

/// Consumer for a single service process.
pub struct EventConsumer {
    name: &'static str,
    url: String,
    bindings: Vec<Binding>,
    handlers: HashMap<&'static str, Arc<dyn EventHandler>>,
    state: Arc<std::sync::Mutex<ConsumerState>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EventConsumer {
    /// Create a consumer named after the owning service (used for consumer
    /// tags and log context).
    pub fn new(name: &'static str, url: impl Into<String>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            name,
            url: url.into(),
            bindings: Vec::new(),
            handlers: HashMap::new(),
            state: Arc::new(std::sync::Mutex::new(ConsumerState::Disconnected)),
            shutdown_tx,
            shutdown_rx,
            task: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConsumerState {
        *self.state.lock().expect("consumer state lock")
    }

    /// Register a handler and bind its event name on the given exchange.
    pub fn register(&mut self, exchange: &str, handler: Arc<dyn EventHandler>) {
        let event_name = handler.event_name();
        info!(
            consumer = self.name,
            exchange = exchange,
            event = event_name,
            "Registered event handler"
        );
        self.bindings.push(Binding {
            exchange: exchange.to_string(),
            routing_key: event_name,
        });
        self.handlers.insert(event_name, handler);
    }

    /// Start the consume loop in a background task. Idempotent: a second
    /// call while running is a no-op. A broker that is down at start time
    /// does not fail the call; the loop keeps redialing with backoff.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            warn!(consumer = self.name, "Consumer already started");
            return;
        }

        let name = self.name;
        let url = self.url.clone();
        let bindings: Vec<(String, &'static str)> = self
            .bindings
            .iter()
            .map(|b| (b.exchange.clone(), b.routing_key))
            .collect();
        let handlers = self.handlers.clone();
        let state = Arc::clone(&self.state);
        let mut shutdown_rx = self.shutdown_rx.clone();

        *task = Some(tokio::spawn(async move {
            // Backoff attempts cap at the policy's plateau; the loop itself
            // is unbounded until shutdown.
            let backoff = RetryPolicy::new(u32::MAX, Duration::from_secs(1), Duration::from_secs(30));
            let mut attempt: u32 = 1;

            loop {
                if *shutdown_rx.borrow() {
                    break;
                }

                info!(consumer = name, "Connecting to broker");
                *state.lock().expect("consumer state lock") = ConsumerState::Connecting;
                let result =
                    consume_until_closed(name, &url, &bindings, &handlers, &state, &mut shutdown_rx)
                        .await;
                *state.lock().expect("consumer state lock") = ConsumerState::Disconnected;
                match result {
                    Ok(()) => {
                        info!(consumer = name, "Consumer stopped");
                        break;
                    }
                    Err(e) => {
                        let delay = backoff.delay_for(attempt.min(6));
                        error!(
                            consumer = name,
                            error = %e,
                            delay_ms = delay.as_millis() as u64,
                            "Broker connection lost, reconnecting"
                        );
                        attempt = attempt.saturating_add(1);
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = shutdown_rx.changed() => {}
                        }
                    }
                }
            }
        }));
    }

    /// Signal shutdown and wait for the consume loop to exit. Idempotent.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(consumer = self.name, "Consumer task panicked: {}", e);
            }
        }
    }
}

/// Connect, bind, and consume until the connection drops (Err) or shutdown
/// is signalled (Ok).
async fn consume_until_closed(
    name: &'static str,
    url: &str,
    bindings: &[(String, &'static str)],
    handlers: &HashMap<&'static str, Arc<dyn EventHandler>>,
    state: &Arc<std::sync::Mutex<ConsumerState>>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<(), lapin::Error> {
    let connection = Connection::connect(url, ConnectionProperties::default()).await?;
    let channel = connection.create_channel().await?;

    // Exclusive server-named queue: each process gets its own copy of the
    // fan-out and the queue dies with the connection.
    let queue = channel
        .queue_declare(
            "",
            QueueDeclareOptions {
                exclusive: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    for (exchange, routing_key) in bindings {
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        channel
            .queue_bind(
                queue.name().as_str(),
                exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
    }

    let mut deliveries = channel
        .basic_consume(
            queue.name().as_str(),
            name,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    *state.lock().expect("consumer state lock") = ConsumerState::Consuming;
    info!(
        consumer = name,
        queue = queue.name().as_str(),
        bindings = bindings.len(),
        "Consumer bound, consuming"
    );

    loop {
        tokio::select! {
            delivery = deliveries.next() => {
                match delivery {
                    Some(Ok(delivery)) => {
                        dispatch(name, handlers, &delivery.data).await;
                        // Acked even when the handler failed: at-most-once
                        // effect, the queue must not stall on one bad message.
                        delivery.ack(BasicAckOptions::default()).await?;
                    }
                    Some(Err(e)) => return Err(e),
                    None => return Err(lapin::Error::InvalidChannelState(
                        lapin::ChannelState::Closed,
                    )),
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    let _ = connection.close(200, "shutdown").await;
                    return Ok(());
                }
            }
        }
    }
}

/// Decode one message body and route it to its handler.
async fn dispatch(
    name: &'static str,
    handlers: &HashMap<&'static str, Arc<dyn EventHandler>>,
    body: &[u8],
) -> DispatchOutcome {
    let payload: serde_json::Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            error!(consumer = name, error = %e, "Failed to parse message body");
            return DispatchOutcome::Malformed;
        }
    };

    let event_type = match payload.get("event").and_then(|v| v.as_str()) {
        Some(event) => event.to_string(),
        None => {
            error!(consumer = name, "Message missing 'event' field");
            return DispatchOutcome::Malformed;
        }
    };

    let handler = match handlers.get(event_type.as_str()) {
        Some(handler) => handler,
        None => {
            warn!(
                consumer = name,
                event = %event_type,
                "No handler registered for event type"
            );
            return DispatchOutcome::UnknownEvent;
        }
    };

    match handler.handle(payload).await {
        Ok(()) => {
            info!(consumer = name, event = %event_type, "Processed event");
            DispatchOutcome::Handled
        }
        Err(e) => {
            error!(
                consumer = name,
                event = %event_type,
                error = %e,
                "Event handler failed"
            );
            DispatchOutcome::HandlerFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        event: &'static str,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl EventHandler for CountingHandler {
        fn event_name(&self) -> &'static str {
            self.event
        }

        async fn handle(&self, _payload: serde_json::Value) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err("boom".to_string())
            } else {
                Ok(())
            }
        }
    }

    fn registry(
        fail: bool,
    ) -> (
        HashMap<&'static str, Arc<dyn EventHandler>>,
        Arc<AtomicUsize>,
    ) {
        let calls = Arc::new(AtomicUsize::new(0));
        let handler: Arc<dyn EventHandler> = Arc::new(CountingHandler {
            event: "cave.deleted",
            calls: Arc::clone(&calls),
            fail,
        });
        let mut handlers: HashMap<&'static str, Arc<dyn EventHandler>> = HashMap::new();
        handlers.insert("cave.deleted", handler);
        (handlers, calls)
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_registered_handler() {
        let (handlers, calls) = registry(false);
        let body = br#"{"event":"cave.deleted","caveId":1}"#;
        assert_eq!(
            dispatch("test", &handlers, body).await,
            DispatchOutcome::Handled
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_event_is_dropped() {
        let (handlers, calls) = registry(false);
        let body = br#"{"event":"user.promoted","email":"x@y.com"}"#;
        assert_eq!(
            dispatch("test", &handlers, body).await,
            DispatchOutcome::UnknownEvent
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispatch_malformed_body_is_dropped() {
        let (handlers, _) = registry(false);
        assert_eq!(
            dispatch("test", &handlers, b"not json").await,
            DispatchOutcome::Malformed
        );
        assert_eq!(
            dispatch("test", &handlers, br#"{"no_event_field":true}"#).await,
            DispatchOutcome::Malformed
        );
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stall_subsequent_dispatch() {
        let (handlers, calls) = registry(true);
        let body = br#"{"event":"cave.deleted","caveId":1}"#;

        assert_eq!(
            dispatch("test", &handlers, body).await,
            DispatchOutcome::HandlerFailed
        );
        // A later message still reaches the handler; the failure was isolated.
        assert_eq!(
            dispatch("test", &handlers, body).await,
            DispatchOutcome::HandlerFailed
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_safe() {
        let consumer = EventConsumer::new("test", "amqp://127.0.0.1:1");
        assert_eq!(consumer.state(), ConsumerState::Disconnected);
        consumer.stop().await;
        assert_eq!(consumer.state(), ConsumerState::Disconnected);
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_terminates_loop() {
        let mut consumer = EventConsumer::new("test", "amqp://127.0.0.1:1");
        let calls = Arc::new(AtomicUsize::new(0));
        consumer.register(
            "cave.events",
            Arc::new(CountingHandler {
                event: "cave.deleted",
                calls,
                fail: false,
            }),
        );

        consumer.start().await;
        consumer.start().await; // second call must not spawn a second loop
        consumer.stop().await;
        assert_eq!(consumer.state(), ConsumerState::Disconnected);
    }
}
