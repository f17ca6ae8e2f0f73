//! Deterministic two-node network simulation, grounded in
//! `kalandra-harness`'s `SimServer`: that type wraps a Sans-IO driver around
//! a `turmoil::net::TcpListener`/`TcpStream` pair so tests can drive a whole
//! server without a real socket. `SimTcpTransport` plays the same role for
//! a [`conduit_core::transport::ReqResTransport`]: it is the exact same
//! `connect`/`disconnect`/`send`/`read` shape `conduit-transport::tcp`
//! implements, built on `turmoil::net` instead of `tokio::net`, so a whole
//! [`conduit_core::supervisor::Supervisor`] can run against it unmodified
//! inside a `turmoil::Sim`. The scenario and property tests that only need
//! an in-process link use `LoopbackTransport` instead; this module's own
//! tests below cover what a real partitionable network adds: a byte-level
//! exchange and a `turmoil::partition` surfacing as a disconnect.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use conduit_core::error::ConnectionError;
use conduit_core::transport::{ReadOutcome, ReqResTransport, TransportOutcome};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use turmoil::net::{TcpListener, TcpStream};

/// Largest single read, mirroring `conduit-transport::tcp`'s constant.
const READ_BUFFER_SIZE: usize = 4096;

/// Which side of the connection a [`SimTcpTransport`] plays.
pub enum SimTcpRole {
    /// Connects to `address` on every connect attempt.
    Client {
        /// The server's turmoil host address, e.g. `"server:9000"`.
        address: String,
    },
    /// Binds `address` and accepts exactly one connection per connect
    /// attempt, mirroring `conduit-transport::tcp`'s server role.
    Server {
        /// The local bind address, e.g. `"0.0.0.0:9000"`.
        address: String,
    },
}

/// A [`ReqResTransport`] backed by `turmoil::net`, for use inside a
/// `turmoil::Sim` host closure.
pub struct SimTcpTransport {
    role: SimTcpRole,
    timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
}

impl SimTcpTransport {
    /// Builds a not-yet-connected simulated TCP transport.
    #[must_use]
    pub fn new(role: SimTcpRole, timeout: Duration) -> Self {
        Self { role, timeout, stream: Mutex::new(None) }
    }
}

#[async_trait]
impl ReqResTransport for SimTcpTransport {
    async fn connect(&self) -> bool {
        let mut guard = self.stream.lock().await;
        if guard.is_some() {
            return true;
        }
        let attempt = async {
            match &self.role {
                SimTcpRole::Client { address } => TcpStream::connect(address.as_str()).await,
                SimTcpRole::Server { address } => {
                    let listener = TcpListener::bind(address.as_str()).await?;
                    let (stream, _peer) = listener.accept().await?;
                    Ok(stream)
                },
            }
        };
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(stream)) => {
                *guard = Some(stream);
                true
            },
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "simulated tcp connect failed");
                false
            },
            Err(_) => false,
        }
    }

    async fn disconnect(&self) {
        self.stream.lock().await.take();
    }

    async fn send(&self, bytes: &[u8]) -> TransportOutcome {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return TransportOutcome::Disconnected(ConnectionError::Connection("not connected".into()));
        };
        match tokio::time::timeout(self.timeout, stream.write_all(bytes)).await {
            Ok(Ok(())) => TransportOutcome::Ok,
            Ok(Err(err)) => {
                *guard = None;
                TransportOutcome::Disconnected(ConnectionError::Connection(err.to_string()))
            },
            Err(_) => TransportOutcome::Errored(ConnectionError::Timeout),
        }
    }

    async fn read(&self) -> ReadOutcome {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return ReadOutcome::Disconnected(ConnectionError::Connection("not connected".into()));
        };
        let mut buf = BytesMut::zeroed(READ_BUFFER_SIZE);
        match tokio::time::timeout(self.timeout, stream.read(&mut buf)).await {
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn client_and_server_exchange_bytes_over_a_simulated_network() {
        let mut sim = turmoil::Builder::new().build();

        sim.host("server", || async {
            let transport = SimTcpTransport::new(SimTcpRole::Server { address: "0.0.0.0:9000".into() }, Duration::from_secs(5));
            assert!(transport.connect().await);
            match transport.read().await {
                ReadOutcome::Data(bytes) => assert_eq!(&bytes[..], b"ping"),
                other => panic!("expected data, got {other:?}"),
            }
            assert!(matches!(transport.send(b"pong").await, TransportOutcome::Ok));
            Ok(())
        });

        sim.client("client", async {
            let transport = SimTcpTransport::new(SimTcpRole::Client { address: "server:9000".into() }, Duration::from_secs(5));
            assert!(transport.connect().await);
            assert!(matches!(transport.send(b"ping").await, TransportOutcome::Ok));
            match transport.read().await {
                ReadOutcome::Data(bytes) => assert_eq!(&bytes[..], b"pong"),
                other => panic!("expected data, got {other:?}"),
            }
            Ok(())
        });

        sim.run().unwrap();
    }

    #[test]
    fn a_network_partition_surfaces_as_a_disconnect() {
        let mut sim = turmoil::Builder::new().build();

        sim.host("server", || async {
            let transport = SimTcpTransport::new(SimTcpRole::Server { address: "0.0.0.0:9000".into() }, Duration::from_secs(5));
            assert!(transport.connect().await);
            loop {
                match transport.read().await {
                    ReadOutcome::Disconnected(_) => break,
                    ReadOutcome::Empty => continue,
                    ReadOutcome::Data(_) => continue,
                }
            }
            Ok(())
        });

        sim.client("client", async {
            let transport = Arc::new(SimTcpTransport::new(SimTcpRole::Client { address: "server:9000".into() }, Duration::from_secs(5)));
            assert!(transport.connect().await);
            turmoil::partition("client", "server");
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        });

        sim.run().unwrap();
    }
}
