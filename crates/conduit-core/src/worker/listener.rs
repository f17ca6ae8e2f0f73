//! The listener worker.
//!
//! Drains a transport, reassembles frames across read boundaries, decodes
//! them, and dispatches to the application's [`EventSink`]. Two transport
//! shapes are supported: a polling request/response loop, and a
//! subscription-driven publish/subscribe callback with no polling loop at
//! all — it merely sleeps for cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use conduit_proto::{is_reserved_frame_type, DecodedFrame, PacketCodec};
use tokio::task::JoinHandle;

use super::requester::ControlSender;
use crate::events::SharedEventSink;
use crate::retransmission::Retransmission;
use crate::transport::{PubSubTransport, ReadOutcome, ReqResTransport};
use crate::value::{ReceiveValue, SendValue};

/// Backoff applied when a request/response `read()` reports "no data yet".
pub const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(10);

/// Backoff applied after an observed disconnect, before the next `read()`
/// attempt. The listener does not exit its task on a transient disconnect
/// (only the connection-local stop flag the supervisor raises once it
/// decides to reconnect does that) so without this a dead transport would
/// otherwise be polled in a tight loop.
pub const DISCONNECTED_READ_BACKOFF: Duration = Duration::from_millis(10);

/// Poll interval for the publish/subscribe listener's cancellation-only
/// loop.
pub const PUBSUB_IDLE_INTERVAL: Duration = Duration::from_millis(10);

/// Configuration for one [`Listener`] task.
pub struct ListenerConfig<S, R>
where
    S: SendValue,
    R: ReceiveValue,
{
    /// The codec used to deframe and decode incoming bytes.
    pub codec: Arc<dyn PacketCodec>,
    /// The shared event sink for this link.
    pub sink: SharedEventSink<S, R>,
    /// The retransmission coordinator bound to this link, if any.
    pub retransmission: Arc<Retransmission>,
    /// Where a client-role retransmission request is pushed, to be sent by
    /// the requester task through the normal outbound path rather than
    /// directly from the listener.
    pub control: ControlSender,
    /// Cooperative shutdown flag, shared with the requester and
    /// supervisor.
    pub stop_flag: Arc<AtomicBool>,
}

/// The inbound worker: owns no state beyond its configuration and runs to
/// completion as a single `tokio` task.
pub struct Listener;

impl Listener {
    /// Spawns a listener task over a request/response transport.
    pub fn spawn_reqres<S, R>(transport: Arc<dyn ReqResTransport>, config: ListenerConfig<S, R>) -> JoinHandle<()>
    where
        S: SendValue,
        R: ReceiveValue,
    {
        tokio::spawn(run_reqres(transport, config))
    }

    /// Spawns a listener over a publish/subscribe transport. Subscribes to
    /// the wildcard topic immediately; the returned task does nothing but
    /// wait for cancellation.
    pub async fn spawn_pubsub<S, R>(transport: Arc<dyn PubSubTransport>, config: ListenerConfig<S, R>) -> JoinHandle<()>
    where
        S: SendValue,
        R: ReceiveValue,
    {
        let codec = Arc::clone(&config.codec);
        let sink = Arc::clone(&config.sink);
        let outcome = transport
            .subscribe(
                "#",
                Arc::new(move |_topic: String, message: Bytes| {
                    dispatch_stream(&codec, &sink, None, &message);
                }),
            )
            .await;
        if let crate::transport::TransportOutcome::Disconnected(err) = outcome {
            tracing::warn!(error = %err, "pub/sub subscribe failed at listener startup");
            config.sink.on_disconnected(err);
        }

        tokio::spawn(run_pubsub_idle(transport, config.stop_flag))
    }
}

async fn run_pubsub_idle(transport: Arc<dyn PubSubTransport>, stop_flag: Arc<AtomicBool>) {
    while !stop_flag.load(Ordering::Relaxed) {
        tokio::time::sleep(PUBSUB_IDLE_INTERVAL).await;
    }
    transport.disconnect().await;
}

async fn run_reqres<S, R>(transport: Arc<dyn ReqResTransport>, config: ListenerConfig<S, R>)
where
    S: SendValue,
    R: ReceiveValue,
{
    let ListenerConfig { codec, sink, retransmission, control, stop_flag } = config;

    while !stop_flag.load(Ordering::Relaxed) {
        match transport.read().await {
            ReadOutcome::Empty => {
                tokio::time::sleep(EMPTY_READ_BACKOFF).await;
            },
            ReadOutcome::Disconnected(err) => {
                sink.on_failed_recv(Bytes::new());
                sink.on_disconnected(err);
                tokio::time::sleep(DISCONNECTED_READ_BACKOFF).await;
            },
            ReadOutcome::Data(bytes) => {
                dispatch_stream_with_retransmission(&codec, &sink, Some(&retransmission), &transport, &control, &bytes).await;
            },
        }
    }
}

/// Splits (or accepts as a single frame) `bytes`, decodes each frame, and
/// dispatches it — running the client-role retransmission hook between
/// decode and dispatch when one is bound to this link.
async fn dispatch_stream_with_retransmission<S, R>(
    codec: &Arc<dyn PacketCodec>,
    sink: &SharedEventSink<S, R>,
    retransmission: Option<&Arc<Retransmission>>,
    transport: &Arc<dyn ReqResTransport>,
    control: &ControlSender,
    bytes: &Bytes,
) where
    S: SendValue,
    R: ReceiveValue,
{
    for frame in framed_segments(codec, bytes) {
        let decoded = match codec.decode(&frame) {
            Ok(decoded) => decoded,
            Err(err) => {
                tracing::debug!(error = %err, "dropping frame that failed to decode");
                sink.on_failed_recv(frame);
                continue;
            },
        };

        if is_reserved_frame_type(decoded.frame_type) {
            handle_reserved_frame(retransmission, transport, &decoded).await;
            continue;
        }

        if let (Some(retransmission), Some(sync)) = (retransmission, decoded.sync) {
            if let Some(client) = retransmission.as_client() {
                let missing = client.observe(sync);
                if !missing.is_empty() {
                    send_retx_requests(codec, client, control, &missing).await;
                }
            }
        }

        deliver::<S, R>(sink, decoded, frame);
    }
}

async fn handle_reserved_frame(
    retransmission: Option<&Arc<Retransmission>>,
    transport: &Arc<dyn ReqResTransport>,
    decoded: &DecodedFrame,
) {
    if decoded.frame_type != conduit_proto::RETX_REQUEST {
        return;
    }
    let Some(retransmission) = retransmission else { return };
    let Some(server) = retransmission.as_server() else { return };
    let resent = server.resend_for(&decoded.payload);
    for frame in resent {
        if let crate::transport::TransportOutcome::Disconnected(err) = transport.send(&frame).await {
            tracing::warn!(error = %err, "transport lost while resending a buffered frame");
            break;
        }
    }
}

async fn send_retx_requests(
    codec: &Arc<dyn PacketCodec>,
    client: &crate::retransmission::ClientRetransmission,
    control: &ControlSender,
    missing: &[u8],
) {
    let Some(binary) = codec.as_binary() else {
        tracing::warn!("retransmission client configured over a codec without sync numbers; dropping request");
        return;
    };
    match client.build_retx_requests(binary, missing) {
        Ok(frames) => {
            for frame in frames {
                if control.send(frame).await.is_err() {
                    tracing::warn!("requester shut down; dropping a retransmission request");
                    break;
                }
            }
        },
        Err(err) => tracing::warn!(error = %err, "failed to encode a retransmission request"),
    }
}

/// Synchronous split-and-dispatch pipeline shared by the pub/sub callback
/// path, which cannot `.await`.
fn dispatch_stream<S, R>(codec: &Arc<dyn PacketCodec>, sink: &SharedEventSink<S, R>, _topic: Option<&str>, bytes: &Bytes)
where
    S: SendValue,
    R: ReceiveValue,
{
    for frame in framed_segments(codec, bytes) {
        match codec.decode(&frame) {
            Ok(decoded) if is_reserved_frame_type(decoded.frame_type) => {},
            Ok(decoded) => deliver::<S, R>(sink, decoded, frame),
            Err(err) => {
                tracing::debug!(error = %err, "dropping pub/sub frame that failed to decode");
                sink.on_failed_recv(frame);
            },
        }
    }
}

fn framed_segments(codec: &Arc<dyn PacketCodec>, bytes: &Bytes) -> Vec<Bytes> {
    if codec.is_framed(bytes) {
        vec![bytes.clone()]
    } else {
        codec.split(bytes)
    }
}

fn deliver<S, R>(sink: &SharedEventSink<S, R>, decoded: DecodedFrame, frame: Bytes)
where
    S: SendValue,
    R: ReceiveValue,
{
    match R::decode(&decoded.payload) {
        Ok(value) => sink.on_received(value),
        Err(err) => {
            tracing::warn!(error = %err, "dropping frame whose payload failed to deserialize");
            sink.on_failed_recv(frame);
        },
    }
}

