//! MQTT publish/subscribe transport (feature `mqtt`).
//!
//! Grounded in
//! `original_source/communicator/protocols/mqtt/mqtt_protocol.py`'s
//! `MQTTProtocol`: connect-then-poll-for-`ConnAck`, a background task
//! driving the client's event loop, and per-topic callback dispatch. No
//! example repo in the pack talks MQTT, so this reaches for `rumqttc`, the
//! ecosystem-standard async MQTT client crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conduit_core::error::ConnectionError;
use conduit_core::transport::{PubSubHandler, PubSubTransport, TransportOutcome};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// How many times `connect()` polls for a `ConnAck` before giving up,
/// mirroring the Python original's `for _ in range(10): sleep(0.5)` loop.
const CONNECT_POLL_ATTEMPTS: usize = 10;
/// Delay between each connect poll.
const CONNECT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Bound on the internal request channel `rumqttc` uses between
/// `AsyncClient` calls and its event loop.
const CLIENT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for [`MqttTransport`].
#[derive(Debug, Clone)]
pub struct MqttTransportConfig {
    /// Broker hostname or address.
    pub broker_address: String,
    /// Broker port.
    pub port: u16,
    /// Keepalive interval.
    pub keepalive: Duration,
    /// MQTT client identifier. A stable, deterministic default is derived
    /// from the process id when not set by the caller, since this crate
    /// cannot reach for a random UUID generator without pulling in a
    /// dependency the teacher stack has no other use for.
    pub client_id: String,
}

fn matches_filter(filter: &str, topic: &str) -> bool {
    let filter_parts: Vec<&str> = filter.split('/').collect();
    let topic_parts: Vec<&str> = topic.split('/').collect();
    for (i, part) in filter_parts.iter().enumerate() {
        if *part == "#" {
            return true;
        }
        let Some(topic_part) = topic_parts.get(i) else { return false };
        if *part != "+" && part != topic_part {
            return false;
        }
    }
    filter_parts.len() == topic_parts.len()
}

type Subscriptions = Arc<Mutex<Vec<(String, PubSubHandler)>>>;

/// An MQTT publish/subscribe link.
pub struct MqttTransport {
    config: MqttTransportConfig,
    client: Mutex<Option<AsyncClient>>,
    subscriptions: Subscriptions,
    connected: Arc<AtomicBool>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttTransport {
    /// Builds a not-yet-connected transport.
    #[must_use]
    pub fn new(config: MqttTransportConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(false)),
            poll_task: Mutex::new(None),
        }
    }
}

async fn drive_event_loop(mut eventloop: rumqttc::EventLoop, subscriptions: Subscriptions, connected: Arc<AtomicBool>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::Relaxed);
            },
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let handlers = subscriptions.lock().await;
                for (filter, handler) in handlers.iter() {
                    if matches_filter(filter, &publish.topic) {
                        handler(publish.topic.clone(), publish.payload.clone());
                    }
                }
            },
            Ok(Event::Incoming(Packet::Disconnect) | Event::Outgoing(rumqttc::Outgoing::Disconnect)) => {
                connected.store(false, Ordering::Relaxed);
            },
            Ok(_) => {},
            Err(err) => {
                tracing::warn!(error = %err, "MQTT event loop error");
                connected.store(false, Ordering::Relaxed);
                tokio::time::sleep(Duration::from_millis(100)).await;
            },
        }
    }
}

#[async_trait]
impl PubSubTransport for MqttTransport {
    async fn connect(&self) -> bool {
        let mut options = MqttOptions::new(&self.config.client_id, &self.config.broker_address, self.config.port);
        options.set_keep_alive(self.config.keepalive);

        let (client, eventloop) = AsyncClient::new(options, CLIENT_CHANNEL_CAPACITY);
        self.connected.store(false, Ordering::Relaxed);

        let task = tokio::spawn(drive_event_loop(eventloop, Arc::clone(&self.subscriptions), Arc::clone(&self.connected)));
        *self.poll_task.lock().await = Some(task);
        *self.client.lock().await = Some(client);

        for _ in 0..CONNECT_POLL_ATTEMPTS {
            if self.connected.load(Ordering::Relaxed) {
                tracing::info!(broker = %self.config.broker_address, "MQTT broker connected");
                return true;
            }
            tokio::time::sleep(CONNECT_POLL_INTERVAL).await;
        }
        tracing::error!(broker = %self.config.broker_address, "MQTT connect timed out waiting for ConnAck");
        false
    }

    async fn disconnect(&self) {
        if let Some(client) = self.client.lock().await.take() {
            let _ = client.disconnect().await;
        }
        if let Some(task) = self.poll_task.lock().await.take() {
            task.abort();
        }
        self.connected.store(false, Ordering::Relaxed);
    }

    async fn publish(&self, topic: &str, message: &[u8], qos: u8, retain: bool) -> TransportOutcome {
        let guard = self.client.lock().await;
        let Some(client) = guard.as_ref() else {
            return TransportOutcome::Disconnected(ConnectionError::Connection("not connected".into()));
        };
        let qos = match qos {
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            _ => QoS::AtMostOnce,
        };
        match client.publish(topic, qos, retain, message.to_vec()).await {
            Ok(()) => TransportOutcome::Ok,
            Err(err) => TransportOutcome::Disconnected(ConnectionError::Connection(err.to_string())),
        }
    }

    async fn subscribe(&self, topic: &str, handler: PubSubHandler) -> TransportOutcome {
        let guard = self.client.lock().await;
        let Some(client) = guard.as_ref() else {
            return TransportOutcome::Disconnected(ConnectionError::Connection("not connected".into()));
        };
        match client.subscribe(topic, QoS::AtMostOnce).await {
            Ok(()) => {
                self.subscriptions.lock().await.push((topic.to_owned(), handler));
                TransportOutcome::Ok
            },
            Err(err) => TransportOutcome::Errored(ConnectionError::Connection(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_hash_matches_everything_under_its_prefix() {
        assert!(matches_filter("#", "a/b/c"));
        assert!(matches_filter("a/#", "a/b/c"));
        assert!(!matches_filter("b/#", "a/b/c"));
    }

    #[test]
    fn plus_matches_exactly_one_segment() {
        assert!(matches_filter("a/+/c", "a/b/c"));
        assert!(!matches_filter("a/+/c", "a/b/c/d"));
    }

    #[test]
    fn exact_filters_require_an_exact_match() {
        assert!(matches_filter("a/b", "a/b"));
        assert!(!matches_filter("a/b", "a/b/c"));
    }
}
