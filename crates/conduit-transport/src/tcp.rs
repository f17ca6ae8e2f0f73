//! TCP request/response transport, in both `client` and `server` roles.
//!
//! Grounded in `original_source/app/protocols/tcp/tcp_client.py` and
//! `.../ethernet/tcp_server.py`, rebuilt on `tokio::net::{TcpStream,
//! TcpListener}` the way the teacher's client/server crates build their
//! transports on `quinn`.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use conduit_core::error::ConnectionError;
use conduit_core::transport::{ReadOutcome, ReqResTransport, TransportOutcome};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// Largest single read, mirroring the Python original's `THRESHOLD_BYTES`.
const READ_BUFFER_SIZE: usize = 4096;

/// Which side of the connection this transport establishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpRole {
    /// Dials out to `host:port`.
    Client,
    /// Listens on `host:port` and accepts a single inbound connection per
    /// `connect()` call.
    Server,
}

/// Configuration for [`TcpTransport`].
#[derive(Debug, Clone)]
pub struct TcpTransportConfig {
    /// Which side of the connection to establish.
    pub role: TcpRole,
    /// Host to dial (client) or bind (server).
    pub host: String,
    /// Port to dial (client) or bind (server).
    pub port: u16,
    /// Bound on `connect()` and every `read()`/`send()`.
    pub timeout: Duration,
}

enum Endpoint {
    Client,
    Server(Mutex<Option<TcpListener>>),
}

/// A TCP request/response link.
///
/// `send` and `read` run on disjoint tasks against the same instance (the
/// requester and listener respectively). The connected stream is split via
/// [`TcpStream::into_split`] into an [`OwnedReadHalf`] and an
/// [`OwnedWriteHalf`], each behind its own [`tokio::sync::Mutex`], so a
/// `read()` blocked on an idle link for up to `timeout` never holds up a
/// concurrent `send()` (and vice versa) — the two halves are independent
/// sockets as far as locking is concerned. Holding either mutex across its
/// own `.await` is unavoidable (the `.await` itself is the I/O being
/// guarded), so `send`/`read`/`connect`/`disconnect` never nest another
/// lock acquisition inside their critical section.
pub struct TcpTransport {
    config: TcpTransportConfig,
    endpoint: Endpoint,
    read_half: Mutex<Option<OwnedReadHalf>>,
    write_half: Mutex<Option<OwnedWriteHalf>>,
}

impl TcpTransport {
    /// Builds a not-yet-connected transport.
    #[must_use]
    pub fn new(config: TcpTransportConfig) -> Self {
        let endpoint = match config.role {
            TcpRole::Client => Endpoint::Client,
            TcpRole::Server => Endpoint::Server(Mutex::new(None)),
        };
        Self { config, endpoint, read_half: Mutex::new(None), write_half: Mutex::new(None) }
    }

    async fn set_stream(&self, stream: TcpStream) {
        let (read_half, write_half) = stream.into_split();
        *self.read_half.lock().await = Some(read_half);
        *self.write_half.lock().await = Some(write_half);
    }

    async fn connect_client(&self) -> bool {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        match tokio::time::timeout(self.config.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                tracing::info!(addr, "TCP client connected");
                self.set_stream(stream).await;
                true
            },
            Ok(Err(err)) => {
                tracing::error!(addr, error = %err, "TCP connect failed");
                false
            },
            Err(_) => {
                tracing::error!(addr, "TCP connect timed out");
                false
            },
        }
    }

    async fn connect_server(&self, listener_slot: &Mutex<Option<TcpListener>>) -> bool {
        let mut listener_guard = listener_slot.lock().await;
        if listener_guard.is_none() {
            let addr = format!("{}:{}", self.config.host, self.config.port);
            match TcpListener::bind(&addr).await {
                Ok(listener) => *listener_guard = Some(listener),
                Err(err) => {
                    tracing::error!(addr, error = %err, "TCP listener bind failed");
                    return false;
                },
            }
        }
        let Some(listener) = listener_guard.as_ref() else { return false };

        match tokio::time::timeout(self.config.timeout, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                tracing::info!(%peer, "TCP server accepted a connection");
                self.set_stream(stream).await;
                true
            },
            Ok(Err(err)) => {
                tracing::error!(error = %err, "TCP accept failed");
                false
            },
            Err(_) => {
                tracing::debug!("TCP accept timed out; retrying");
                false
            },
        }
    }
}

#[async_trait]
impl ReqResTransport for TcpTransport {
    async fn connect(&self) -> bool {
        match &self.endpoint {
            Endpoint::Client => self.connect_client().await,
            Endpoint::Server(listener_slot) => self.connect_server(listener_slot).await,
        }
    }

    async fn disconnect(&self) {
        self.read_half.lock().await.take();
        self.write_half.lock().await.take();
    }

    async fn send(&self, bytes: &[u8]) -> TransportOutcome {
        let mut guard = self.write_half.lock().await;
        let Some(write_half) = guard.as_mut() else {
            return TransportOutcome::Disconnected(ConnectionError::Connection("not connected".into()));
        };
        match tokio::time::timeout(self.config.timeout, write_half.write_all(bytes)).await {
            Ok(Ok(())) => TransportOutcome::Ok,
            Ok(Err(err)) => {
                *guard = None;
                TransportOutcome::Disconnected(ConnectionError::Connection(err.to_string()))
            },
            Err(_) => TransportOutcome::Errored(ConnectionError::Timeout),
        }
    }

    async fn read(&self) -> ReadOutcome {
        let mut guard = self.read_half.lock().await;
        let Some(read_half) = guard.as_mut() else {
            return ReadOutcome::Disconnected(ConnectionError::Connection("not connected".into()));
        };
        let mut buf = BytesMut::zeroed(READ_BUFFER_SIZE);
        match tokio::time::timeout(self.config.timeout, read_half.read(&mut buf)).await {
            Ok(Ok(0)) => {
                *guard = None;
                ReadOutcome::Disconnected(ConnectionError::Connection("peer closed the connection".into()))
            },
            Ok(Ok(n)) => ReadOutcome::Data(Bytes::copy_from_slice(&buf[..n])),
            Ok(Err(err)) => {
                *guard = None;
                ReadOutcome::Disconnected(ConnectionError::Connection(err.to_string()))
            },
            Err(_) => ReadOutcome::Empty,
        }
    }
}

/// Resolves `host`/`port` into a [`SocketAddr`] eagerly, surfacing a parse
/// failure as a connection error rather than deferring to the first
/// `connect()` attempt. Exposed for transports that want to validate their
/// address up front; [`TcpTransport`] itself resolves lazily inside
/// `connect()` since `tokio::net::TcpStream::connect` accepts host strings
/// directly.
///
/// # Errors
///
/// Returns a [`ConnectionError::Connection`] if `host:port` does not parse
/// as a socket address.
pub fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, ConnectionError> {
    format!("{host}:{port}").parse().map_err(|err| ConnectionError::Connection(format!("invalid address: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_valid_socket_address() {
        assert!(parse_socket_addr("127.0.0.1", 9000).is_ok());
    }

    #[test]
    fn rejects_an_unparsable_host() {
        assert!(parse_socket_addr("not a host", 9000).is_err());
    }

    #[tokio::test]
    async fn client_send_and_read_before_connect_report_disconnected() {
        let transport = TcpTransport::new(TcpTransportConfig {
            role: TcpRole::Client,
            host: "127.0.0.1".into(),
            port: 0,
            timeout: Duration::from_millis(50),
        });
        assert!(matches!(transport.send(b"hi").await, TransportOutcome::Disconnected(_)));
        assert!(matches!(transport.read().await, ReadOutcome::Disconnected(_)));
    }

    #[tokio::test]
    async fn client_and_server_exchange_bytes_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let server = TcpTransport::new(TcpTransportConfig {
            role: TcpRole::Server,
            host: addr.ip().to_string(),
            port: addr.port(),
            timeout: Duration::from_secs(2),
        });
        let client = TcpTransport::new(TcpTransportConfig {
            role: TcpRole::Client,
            host: addr.ip().to_string(),
            port: addr.port(),
            timeout: Duration::from_secs(2),
        });

        let server_connected = tokio::spawn(async move {
            let connected = server.connect().await;
            (server, connected)
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(client.connect().await);
        let (server, server_connected) = server_connected.await.unwrap();
        assert!(server_connected);

        assert!(matches!(client.send(b"hello").await, TransportOutcome::Ok));
        match server.read().await {
            ReadOutcome::Data(bytes) => assert_eq!(bytes.as_ref(), b"hello"),
            other => panic!("expected data, got {other:?}"),
        }
    }
}
