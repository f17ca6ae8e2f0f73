//! The requester worker.
//!
//! Drains the outbound queue, frames each value, and hands it to the
//! transport, classifying the transport's outcome into one of the
//! application's send-related callbacks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use conduit_proto::{PacketCodec, APPLICATION};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::SharedEventSink;
use crate::queue::OutboundReceiver;
use crate::retransmission::Retransmission;
use crate::transport::{PubSubTransport, TransportOutcome};
use crate::value::{PubSubSendValue, ReceiveValue, SendValue};

/// Default wait on the outbound queue before re-checking the stop flag.
pub const DEFAULT_QUEUE_WAIT_TIME: Duration = Duration::from_millis(100);

/// Receiving half of the control-frame channel the listener uses to push
/// pre-built `RETX_REQUEST` frames through the requester's send path,
/// bypassing the application's typed outbound queue since these frames
/// carry no `SendValue`.
pub type ControlReceiver = mpsc::Receiver<Bytes>;
/// Sending half, held by the listener / retransmission coordinator.
pub type ControlSender = mpsc::Sender<Bytes>;

/// Builds a bounded control-frame channel.
#[must_use]
pub fn control_channel(capacity: usize) -> (ControlSender, ControlReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Configuration for one [`Requester`] task.
pub struct RequesterConfig<S, R>
where
    S: SendValue,
    R: ReceiveValue,
{
    /// The codec used to frame outgoing payloads.
    pub codec: Arc<dyn PacketCodec>,
    /// The outbound queue's consumer half.
    pub queue: OutboundReceiver<S>,
    /// The control-frame channel's consumer half.
    pub control: ControlReceiver,
    /// The shared event sink for this link.
    pub sink: SharedEventSink<S, R>,
    /// The retransmission coordinator bound to this link, if any.
    pub retransmission: Arc<Retransmission>,
    /// Cooperative shutdown flag, shared with the listener and supervisor.
    pub stop_flag: Arc<AtomicBool>,
    /// How long to wait on the outbound queue before re-checking
    /// `stop_flag` (default 0.1s).
    pub queue_wait_time: Duration,
}

/// The outbound worker: owns no state beyond its configuration and runs to
/// completion as a single `tokio` task.
pub struct Requester;

impl Requester {
    /// Spawns a requester task over a request/response transport.
    ///
    /// The returned handle resolves to the outbound queue's consumer half
    /// once the task stops, so a supervisor can hand the same queue to the
    /// next connection's requester rather than losing whatever was still
    /// enqueued.
    pub fn spawn_reqres<S, R>(
        transport: Arc<dyn crate::transport::ReqResTransport>,
        config: RequesterConfig<S, R>,
    ) -> JoinHandle<OutboundReceiver<S>>
    where
        S: SendValue,
        R: ReceiveValue,
    {
        tokio::spawn(run_reqres(transport, config))
    }

    /// Spawns a requester task over a publish/subscribe transport. `S`
    /// must additionally expose a topic.
    pub fn spawn_pubsub<S, R>(
        transport: Arc<dyn PubSubTransport>,
        config: RequesterConfig<S, R>,
    ) -> JoinHandle<OutboundReceiver<S>>
    where
        S: PubSubSendValue,
        R: ReceiveValue,
    {
        tokio::spawn(run_pubsub(transport, config))
    }
}

async fn run_reqres<S, R>(
    transport: Arc<dyn crate::transport::ReqResTransport>,
    mut config: RequesterConfig<S, R>,
) -> OutboundReceiver<S>
where
    S: SendValue,
    R: ReceiveValue,
{
    while !config.stop_flag.load(Ordering::Relaxed) {
        if let Ok(frame) = config.control.try_recv() {
            if let TransportOutcome::Disconnected(err) = transport.send(&frame).await {
                tracing::warn!(error = %err, "transport lost while sending a control frame");
            }
            continue;
        }

        let Some(value) = config.queue.recv_timeout(config.queue_wait_time).await else {
            continue;
        };

        match encode_reqres(&config.codec, &config.retransmission, &value) {
            Ok(frame) => match transport.send(&frame).await {
                TransportOutcome::Ok => config.sink.on_sent(value),
                TransportOutcome::Rejected => config.sink.on_failed_send(value),
                TransportOutcome::Disconnected(err) => {
                    config.sink.on_disconnected(err);
                },
                TransportOutcome::Errored(_) => config.sink.on_failed_send(value),
            },
            Err(()) => config.sink.on_failed_send(value),
        }
    }

    transport.disconnect().await;
    config.queue
}

async fn run_pubsub<S, R>(transport: Arc<dyn PubSubTransport>, mut config: RequesterConfig<S, R>) -> OutboundReceiver<S>
where
    S: PubSubSendValue,
    R: ReceiveValue,
{
    while !config.stop_flag.load(Ordering::Relaxed) {
        // Pub/sub links carry no sync numbers and no retransmission
        // coordinator (broker QoS/retained-message semantics are out of
        // scope), so there is no control channel traffic to prioritize
        // here.
        let Some(value) = config.queue.recv_timeout(config.queue_wait_time).await else {
            continue;
        };

        if value.topic().is_empty() {
            config.sink.on_failed_send(value);
            continue;
        }

        let payload = match value.encode() {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(error = %err, "send-value failed to encode");
                config.sink.on_failed_send(value);
                continue;
            },
        };
        let frame = match config.codec.encode(APPLICATION, None, &payload) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::debug!(error = %err, "send-value failed to frame");
                config.sink.on_failed_send(value);
                continue;
            },
        };

        let topic = value.topic().to_owned();
        match transport.publish(&topic, &frame, 0, false).await {
            TransportOutcome::Ok => config.sink.on_sent(value),
            TransportOutcome::Rejected => config.sink.on_failed_send(value),
            TransportOutcome::Disconnected(err) => config.sink.on_disconnected(err),
            TransportOutcome::Errored(_) => config.sink.on_failed_send(value),
        }
    }

    transport.disconnect().await;
    config.queue
}

/// Encodes and, for a server-role retransmission coordinator, buffers one
/// outbound value. Returns `Err(())` once the failure has already been
/// logged — callers only need to know whether to raise `on_failed_send`.
fn encode_reqres<S: SendValue>(
    codec: &Arc<dyn PacketCodec>,
    retransmission: &Retransmission,
    value: &S,
) -> Result<Bytes, ()> {
    let payload = value.encode().map_err(|err| {
        tracing::debug!(error = %err, "send-value failed to encode");
    })?;

    if let (Some(server), Some(binary)) = (retransmission.as_server(), codec.as_binary()) {
        return server.prepare_outbound(binary, APPLICATION, &payload).map_err(|err| {
            tracing::debug!(error = %err, "failed to frame an outbound sequenced packet");
        });
    }

    codec.encode(APPLICATION, None, &payload).map_err(|err| {
        tracing::debug!(error = %err, "failed to frame an outbound packet");
    })
}
