//! Serial-line request/response transport (feature `serial`).
//!
//! Grounded in `original_source/app/protocols/serial/serial_protocol.py`.
//! No example repo in the pack talks to a serial device, so this reaches
//! for `tokio-serial`, the ecosystem-standard async serial crate, rather
//! than hand-rolling one.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use conduit_core::error::ConnectionError;
use conduit_core::transport::{ReadOutcome, ReqResTransport, TransportOutcome};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// Largest single read.
const READ_BUFFER_SIZE: usize = 4096;

/// Configuration for [`SerialTransport`].
#[derive(Debug, Clone)]
pub struct SerialTransportConfig {
    /// OS device path (`/dev/ttyUSB0`, `COM3`, ...).
    pub port_name: String,
    /// Line rate in bits per second.
    pub baud_rate: u32,
    /// Bound on every `read()`/`send()`.
    pub timeout: Duration,
}

/// A serial-line request/response link.
///
/// Serial ports are inherently single-ended (there is no separate
/// client/server role, unlike TCP): `connect()` opens the device, and
/// `send`/`read` write to and poll the same stream thereafter.
pub struct SerialTransport {
    config: SerialTransportConfig,
    stream: Mutex<Option<SerialStream>>,
}

impl SerialTransport {
    /// Builds a not-yet-opened transport.
    #[must_use]
    pub fn new(config: SerialTransportConfig) -> Self {
        Self { config, stream: Mutex::new(None) }
    }
}

#[async_trait]
impl ReqResTransport for SerialTransport {
    async fn connect(&self) -> bool {
        let mut guard = self.stream.lock().await;
        if guard.is_some() {
            return true;
        }
        match tokio_serial::new(&self.config.port_name, self.config.baud_rate).open_native_async() {
            Ok(stream) => {
                tracing::info!(port = %self.config.port_name, baud = self.config.baud_rate, "serial port opened");
                *guard = Some(stream);
                true
            },
            Err(err) => {
                tracing::error!(port = %self.config.port_name, error = %err, "failed to open serial port");
                false
            },
        }
    }

    async fn disconnect(&self) {
        if let Some(stream) = self.stream.lock().await.take() {
            drop(stream);
        }
    }

    async fn send(&self, bytes: &[u8]) -> TransportOutcome {
        let mut guard = self.stream.lock().await;
        let Some(stream) = guard.as_mut() else {
            return TransportOutcome::Disconnected(ConnectionError::Connection("serial port not open".into()));
        };
        match tokio::time::timeout(self.config.timeout, stream.write_all(bytes)).await {
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
            return ReadOutcome::Disconnected(ConnectionError::Connection("serial port not open".into()));
        };
        let mut buf = BytesMut::zeroed(READ_BUFFER_SIZE);
        match tokio::time::timeout(self.config.timeout, stream.read(&mut buf)).await {
            Ok(Ok(0)) => ReadOutcome::Empty,
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
    use super::*;

    #[tokio::test]
    async fn send_and_read_before_connect_report_disconnected() {
        let transport = SerialTransport::new(SerialTransportConfig {
            port_name: "/dev/null-not-a-serial-port".into(),
            baud_rate: 9600,
            timeout: Duration::from_millis(20),
        });
        assert!(matches!(transport.send(b"hi").await, TransportOutcome::Disconnected(_)));
        assert!(matches!(transport.read().await, ReadOutcome::Disconnected(_)));
    }

    #[tokio::test]
    async fn connect_to_a_nonexistent_device_fails_cleanly() {
        let transport = SerialTransport::new(SerialTransportConfig {
            port_name: "/dev/this-device-does-not-exist".into(),
            baud_rate: 9600,
            timeout: Duration::from_millis(20),
        });
        assert!(!transport.connect().await);
    }
}
