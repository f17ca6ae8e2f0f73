//! The per-link connection supervisor.
//!
//! Owns the transport factory, the outbound queue, and the worker pair for
//! one link, and drives the connect/run/reconnect lifecycle as a single
//! background task. Applications interact with it through four methods:
//! [`Supervisor::start`], [`Supervisor::send`], [`Supervisor::stop`], and
//! [`Supervisor::is_connected`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as SyncMutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::data_package::DataPackage;
use crate::error::ConnectionError;
use crate::events::{EventSink, SharedEventSink};
use crate::queue::{outbound_queue, OutboundReceiver, OutboundSender};
use crate::retransmission::RetransmissionRole;
use crate::transport::{PubSubTransport, ReqResTransport};
use crate::value::{PubSubSendValue, ReceiveValue, SendValue};
use crate::worker::requester::control_channel;
use crate::worker::{Listener, ListenerConfig, Requester, RequesterConfig};

/// Default capacity of the outbound application queue.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 1000;

/// Default pause between failed `connect()` attempts.
pub const DEFAULT_CONNECT_RETRY_DELAY: Duration = Duration::from_millis(1);

/// Default wait on the outbound queue before a requester re-checks its
/// stop flag.
pub const DEFAULT_QUEUE_WAIT_TIME: Duration = Duration::from_millis(100);

/// Capacity of the control-frame channel used to route a client-role
/// `RETX_REQUEST` from the listener through the requester's send path.
const CONTROL_CHANNEL_CAPACITY: usize = 16;

/// How often the lifecycle task polls the retry flag between connections,
/// while a connection is otherwise healthy.
const RECONNECT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A concrete transport instance, in whichever shape the application's
/// link requires.
pub enum TransportKind {
    /// A request/response transport (TCP, serial).
    ReqRes(Arc<dyn ReqResTransport>),
    /// A publish/subscribe transport (MQTT).
    PubSub(Arc<dyn PubSubTransport>),
}

/// Builds a fresh transport instance for each connection attempt.
///
/// A supervisor calls this once per connect; the returned instance is not
/// yet connected. Kept separate from [`crate::data_package::DataPackage`]
/// since concrete transports live in a downstream crate that depends on
/// this one, not the reverse.
pub trait TransportFactory: Send + Sync + 'static {
    /// Builds one transport instance.
    fn create(&self) -> TransportKind;
}

impl<F> TransportFactory for F
where
    F: Fn() -> TransportKind + Send + Sync + 'static,
{
    fn create(&self) -> TransportKind {
        self()
    }
}

/// Configuration for one [`Supervisor`].
pub struct SupervisorConfig<S, R>
where
    S: PubSubSendValue,
    R: ReceiveValue,
{
    /// An identifier for this link, used only in log output.
    pub link_id: String,
    /// The codec, bound to `S`/`R`, this link encodes and decodes with.
    pub data_package: DataPackage<S, R>,
    /// Builds a fresh transport instance on every connect.
    pub transport_factory: Arc<dyn TransportFactory>,
    /// The application's event sink.
    pub sink: SharedEventSink<S, R>,
    /// Which retransmission role, if any, this link runs.
    pub retransmission_role: RetransmissionRole,
    /// Outbound application queue capacity.
    pub outbound_queue_capacity: usize,
    /// How long a requester waits on the outbound queue before re-checking
    /// its stop flag.
    pub queue_wait_time: Duration,
    /// Pause between failed `connect()` attempts.
    pub connect_retry_delay: Duration,
}

impl<S, R> SupervisorConfig<S, R>
where
    S: PubSubSendValue,
    R: ReceiveValue,
{
    /// Builds a configuration with every tunable at its documented default.
    pub fn new(
        link_id: impl Into<String>,
        data_package: DataPackage<S, R>,
        transport_factory: Arc<dyn TransportFactory>,
        sink: SharedEventSink<S, R>,
    ) -> Self {
        Self {
            link_id: link_id.into(),
            data_package,
            transport_factory,
            sink,
            retransmission_role: RetransmissionRole::Disabled,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            queue_wait_time: DEFAULT_QUEUE_WAIT_TIME,
            connect_retry_delay: DEFAULT_CONNECT_RETRY_DELAY,
        }
    }

    /// Binds a retransmission role to this link.
    #[must_use]
    pub fn with_retransmission_role(mut self, role: RetransmissionRole) -> Self {
        self.retransmission_role = role;
        self
    }

    /// Overrides the outbound queue capacity.
    #[must_use]
    pub fn with_outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity;
        self
    }
}

/// Forwards every callback to the application's sink, additionally raising
/// the supervisor's retry flag on disconnect so `is_connected()` reflects
/// link loss the instant a worker observes it.
struct ForwardingSink<S, R>
where
    S: SendValue,
    R: ReceiveValue,
{
    inner: SharedEventSink<S, R>,
    retry_flag: Arc<AtomicBool>,
}

impl<S, R> EventSink<S, R> for ForwardingSink<S, R>
where
    S: SendValue,
    R: ReceiveValue,
{
    fn on_sent(&self, value: S) {
        self.inner.on_sent(value);
    }

    fn on_failed_send(&self, value: S) {
        self.inner.on_failed_send(value);
    }

    fn on_received(&self, value: R) {
        self.inner.on_received(value);
    }

    fn on_failed_recv(&self, frame: Bytes) {
        self.inner.on_failed_recv(frame);
    }

    fn on_disconnected(&self, error: ConnectionError) {
        self.retry_flag.store(true, Ordering::Relaxed);
        self.inner.on_disconnected(error);
    }
}

struct Inner<S, R>
where
    S: PubSubSendValue,
    R: ReceiveValue,
{
    link_id: String,
    data_package: DataPackage<S, R>,
    transport_factory: Arc<dyn TransportFactory>,
    app_sink: SharedEventSink<S, R>,
    retransmission_role: RetransmissionRole,
    queue_wait_time: Duration,
    connect_retry_delay: Duration,
    stop_flag: Arc<AtomicBool>,
    retry_flag: Arc<AtomicBool>,
    started: AtomicBool,
    outbound_queue_capacity: usize,
    outbound_tx: SyncMutex<OutboundSender<S>>,
    outbound_rx: AsyncMutex<Option<OutboundReceiver<S>>>,
    lifecycle: AsyncMutex<Option<JoinHandle<()>>>,
}

/// Owns one link's transport, outbound queue, and worker pair, and drives
/// its connect/run/reconnect lifecycle.
///
/// Cheaply cloneable: every clone shares the same underlying link, queue,
/// and lifecycle task.
pub struct Supervisor<S, R>
where
    S: PubSubSendValue,
    R: ReceiveValue,
{
    inner: Arc<Inner<S, R>>,
}

impl<S, R> Clone for Supervisor<S, R>
where
    S: PubSubSendValue,
    R: ReceiveValue,
{
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S, R> Supervisor<S, R>
where
    S: PubSubSendValue,
    R: ReceiveValue,
{
    /// Builds a supervisor. The outbound queue is created once, here, and
    /// survives every reconnect for as long as this supervisor lives.
    #[must_use]
    pub fn new(config: SupervisorConfig<S, R>) -> Self {
        let (outbound_tx, outbound_rx) = outbound_queue(config.outbound_queue_capacity);
        let inner = Inner {
            link_id: config.link_id,
            data_package: config.data_package,
            transport_factory: config.transport_factory,
            app_sink: config.sink,
            retransmission_role: config.retransmission_role,
            queue_wait_time: config.queue_wait_time,
            connect_retry_delay: config.connect_retry_delay,
            stop_flag: Arc::new(AtomicBool::new(false)),
            retry_flag: Arc::new(AtomicBool::new(true)),
            started: AtomicBool::new(false),
            outbound_queue_capacity: config.outbound_queue_capacity,
            outbound_tx: SyncMutex::new(outbound_tx),
            outbound_rx: AsyncMutex::new(Some(outbound_rx)),
            lifecycle: AsyncMutex::new(None),
        };
        Self { inner: Arc::new(inner) }
    }

    /// The link identifier this supervisor was built with.
    #[must_use]
    pub fn link_id(&self) -> &str {
        &self.inner.link_id
    }

    /// Starts the connect/run/reconnect lifecycle task. Idempotent: a
    /// second call while already started is a no-op.
    pub async fn start(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        if lifecycle.is_some() {
            return;
        }
        self.inner.stop_flag.store(false, Ordering::Relaxed);
        self.inner.started.store(true, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        *lifecycle = Some(tokio::spawn(run_lifecycle(inner)));
    }

    /// Enqueues `value` for the requester to send. Returns `false` if the
    /// outbound queue is full (back-pressure) or the lifecycle task has
    /// not been started.
    pub fn send(&self, value: S) -> bool {
        if !self.inner.started.load(Ordering::Relaxed) {
            return false;
        }
        self.inner
            .outbound_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .try_send(value)
    }

    /// `true` once a connection has been established and no disconnect has
    /// been observed since.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.started.load(Ordering::Relaxed) && !self.inner.retry_flag.load(Ordering::Relaxed)
    }

    /// Signals the lifecycle task to stop and waits for it to finish
    /// tearing down the current connection.
    pub async fn stop(&self) {
        self.inner.stop_flag.store(true, Ordering::Relaxed);
        let mut lifecycle = self.inner.lifecycle.lock().await;
        if let Some(handle) = lifecycle.take() {
            if let Err(err) = handle.await {
                tracing::warn!(link_id = %self.inner.link_id, error = %err, "lifecycle task panicked while stopping");
            }
        }
        self.inner.started.store(false, Ordering::Relaxed);
    }
}

async fn run_lifecycle<S, R>(inner: Arc<Inner<S, R>>)
where
    S: PubSubSendValue,
    R: ReceiveValue,
{
    while !inner.stop_flag.load(Ordering::Relaxed) {
        let transport_kind = inner.transport_factory.create();
        if !connect_with_retry(&transport_kind, &inner).await {
            break;
        }
        inner.retry_flag.store(false, Ordering::Relaxed);
        tracing::info!(link_id = %inner.link_id, "link connected");

        run_one_connection(&inner, transport_kind).await;

        if inner.stop_flag.load(Ordering::Relaxed) {
            break;
        }
        tracing::info!(link_id = %inner.link_id, "reconnecting");
        tokio::time::sleep(inner.connect_retry_delay).await;
    }
}

/// Retries `connect()` until it succeeds or `stop()` is called. Returns
/// `false` if the supervisor was stopped before a connection was made.
async fn connect_with_retry<S, R>(transport: &TransportKind, inner: &Arc<Inner<S, R>>) -> bool
where
    S: PubSubSendValue,
    R: ReceiveValue,
{
    while !inner.stop_flag.load(Ordering::Relaxed) {
        let connected = match transport {
            TransportKind::ReqRes(t) => t.connect().await,
            TransportKind::PubSub(t) => t.connect().await,
        };
        if connected {
            return true;
        }
        tracing::debug!(link_id = %inner.link_id, "connect attempt failed, retrying");
        tokio::time::sleep(inner.connect_retry_delay).await;
    }
    false
}

/// Runs one connection's worker pair to completion: spawns them, waits for
/// either a disconnect (the retry flag going high) or an external stop,
/// then signals the connection-local stop flag and joins both tasks.
async fn run_one_connection<S, R>(inner: &Arc<Inner<S, R>>, transport: TransportKind)
where
    S: PubSubSendValue,
    R: ReceiveValue,
{
    let retransmission = Arc::new(inner.retransmission_role.build());
    let (control_tx, control_rx) = control_channel(CONTROL_CHANNEL_CAPACITY);
    let conn_stop = Arc::new(AtomicBool::new(false));
    let sink: SharedEventSink<S, R> =
        Arc::new(ForwardingSink { inner: Arc::clone(&inner.app_sink), retry_flag: Arc::clone(&inner.retry_flag) });

    let mut outbound_rx_slot = inner.outbound_rx.lock().await;
    let queue = match outbound_rx_slot.take() {
        Some(queue) => queue,
        None => {
            tracing::error!(
                link_id = %inner.link_id,
                "outbound queue receiver missing, previous requester task likely panicked; rebuilding a fresh queue"
            );
            let (tx, rx) = outbound_queue(inner.outbound_queue_capacity);
            *inner.outbound_tx.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = tx;
            rx
        },
    };
    drop(outbound_rx_slot);

    let codec = Arc::clone(inner.data_package.codec());

    let (listener_handle, requester_handle) = match transport {
        TransportKind::ReqRes(transport) => {
            let listener_config = ListenerConfig {
                codec: Arc::clone(&codec),
                sink: Arc::clone(&sink),
                retransmission: Arc::clone(&retransmission),
                control: control_tx,
                stop_flag: Arc::clone(&conn_stop),
            };
            let requester_config = RequesterConfig {
                codec,
                queue,
                control: control_rx,
                sink,
                retransmission,
                stop_flag: Arc::clone(&conn_stop),
                queue_wait_time: inner.queue_wait_time,
            };
            let listener = Listener::spawn_reqres(Arc::clone(&transport), listener_config);
            let requester = Requester::spawn_reqres(transport, requester_config);
            (listener, requester)
        },
        TransportKind::PubSub(transport) => {
            let listener_config = ListenerConfig {
                codec: Arc::clone(&codec),
                sink: Arc::clone(&sink),
                retransmission: Arc::clone(&retransmission),
                control: control_tx,
                stop_flag: Arc::clone(&conn_stop),
            };
            let requester_config = RequesterConfig {
                codec,
                queue,
                control: control_rx,
                sink,
                retransmission,
                stop_flag: Arc::clone(&conn_stop),
                queue_wait_time: inner.queue_wait_time,
            };
            let listener = Listener::spawn_pubsub(Arc::clone(&transport), listener_config).await;
            let requester = Requester::spawn_pubsub(transport, requester_config);
            (listener, requester)
        },
    };

    while !inner.stop_flag.load(Ordering::Relaxed) && !inner.retry_flag.load(Ordering::Relaxed) {
        tokio::time::sleep(RECONNECT_POLL_INTERVAL).await;
    }

    conn_stop.store(true, Ordering::Relaxed);

    if let Err(err) = listener_handle.await {
        tracing::warn!(link_id = %inner.link_id, error = %err, "listener task panicked");
    }
    match requester_handle.await {
        Ok(returned_queue) => {
            *inner.outbound_rx.lock().await = Some(returned_queue);
        },
        Err(err) => {
            tracing::warn!(link_id = %inner.link_id, error = %err, "requester task panicked; outbound queue lost");
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use bytes::Bytes as B;
    use conduit_proto::SentinelCodec;

    use super::*;
    use crate::transport::{ReadOutcome, TransportOutcome};
    use crate::value::PubSubSendValue;

    #[derive(Clone)]
    struct Echo(B);

    impl SendValue for Echo {
        type Error = std::convert::Infallible;

        fn encode(&self) -> Result<B, Self::Error> {
            Ok(self.0.clone())
        }
    }

    impl PubSubSendValue for Echo {
        fn topic(&self) -> &str {
            ""
        }
    }

    impl ReceiveValue for Echo {
        type Error = std::convert::Infallible;

        fn decode(payload: &[u8]) -> Result<Self, Self::Error> {
            Ok(Echo(B::copy_from_slice(payload)))
        }
    }

    struct CountingSink {
        sent: AtomicUsize,
    }

    impl EventSink<Echo, Echo> for CountingSink {
        fn on_sent(&self, _value: Echo) {
            self.sent.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct AlwaysOnTransport;

    #[async_trait]
    impl ReqResTransport for AlwaysOnTransport {
        async fn connect(&self) -> bool {
            true
        }

        async fn disconnect(&self) {}

        async fn send(&self, _bytes: &[u8]) -> TransportOutcome {
            TransportOutcome::Ok
        }

        async fn read(&self) -> ReadOutcome {
            ReadOutcome::Empty
        }
    }

    struct AlwaysOnFactory;

    impl TransportFactory for AlwaysOnFactory {
        fn create(&self) -> TransportKind {
            TransportKind::ReqRes(Arc::new(AlwaysOnTransport))
        }
    }

    #[tokio::test]
    async fn start_connects_and_send_delivers_through_to_the_sink() {
        let sink = Arc::new(CountingSink { sent: AtomicUsize::new(0) });
        let package: DataPackage<Echo, Echo> = DataPackage::new(Arc::new(SentinelCodec::default()));
        let config = SupervisorConfig::new("test-link", package, Arc::new(AlwaysOnFactory), sink.clone());
        let supervisor = Supervisor::new(config);

        assert!(!supervisor.is_connected());
        supervisor.start().await;

        for _ in 0..200 {
            if supervisor.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(supervisor.is_connected());

        assert!(supervisor.send(Echo(B::from_static(b"hello"))));

        for _ in 0..200 {
            if sink.sent.load(Ordering::Relaxed) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(sink.sent.load(Ordering::Relaxed), 1);

        supervisor.stop().await;
        assert!(!supervisor.is_connected());
    }

    #[tokio::test]
    async fn send_before_start_is_rejected() {
        let sink: Arc<CountingSink> = Arc::new(CountingSink { sent: AtomicUsize::new(0) });
        let package: DataPackage<Echo, Echo> = DataPackage::new(Arc::new(SentinelCodec::default()));
        let config = SupervisorConfig::new("test-link", package, Arc::new(AlwaysOnFactory), sink);
        let supervisor = Supervisor::new(config);
        assert!(!supervisor.send(Echo(B::from_static(b"too early"))));
    }
}
