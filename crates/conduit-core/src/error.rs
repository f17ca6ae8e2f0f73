//! Error types for the messaging runtime core.
//!
//! One flat enum for the whole error taxonomy. Message-level failures
//! (`Framing`, `Value`, `Timeout`) are reported through the event sink and
//! never abort a worker; `Connection`/`Authentication` drive the
//! supervisor's reconnect path; `TransportInternal` is the default bucket
//! for opaque transport-library failures.

use thiserror::Error;

/// Errors surfaced by the listener, requester, and supervisor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The link could not be established, or was lost during I/O.
    #[error("connection lost or could not be established: {0}")]
    Connection(String),

    /// A bounded operation elapsed without completing. Never implies
    /// disconnection.
    #[error("operation timed out")]
    Timeout,

    /// Received bytes violated a codec's framing invariants.
    #[error("framing error: {0}")]
    Framing(#[from] conduit_proto::FramingError),

    /// A structurally valid frame failed an application-level value decode.
    #[error("value codec error: {0}")]
    Value(String),

    /// Credentials were rejected during a connect or subscribe.
    #[error("authentication rejected")]
    Authentication,

    /// An opaque transport-library failure, classified as a connection
    /// error by default.
    #[error("transport-internal error: {0}")]
    TransportInternal(String),
}

impl ConnectionError {
    /// Returns `true` if this error is a link-level failure that should
    /// trigger the supervisor's reconnect path (`on_disconnected`), as
    /// opposed to a per-message failure reported via `on_failed_send` /
    /// `on_failed_recv`.
    #[must_use]
    pub fn is_disconnecting(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::TransportInternal(_))
    }
}

/// Errors raised while building a [`crate::data_package::DataPackage`] or
/// validating configuration at construction time. Fatal; never recovered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required configuration key was missing.
    #[error("missing required configuration key: {0}")]
    MissingKey(String),

    /// A configuration value could not be parsed into the expected type.
    #[error("invalid value for configuration key {key}: {reason}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The `method` key named a transport family this build does not
    /// support (e.g. the `serial`/`mqtt` cargo feature was not enabled).
    #[error("unsupported transport method: {0}")]
    UnsupportedMethod(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_and_transport_internal_trigger_reconnect() {
        assert!(ConnectionError::Connection("reset".into()).is_disconnecting());
        assert!(ConnectionError::TransportInternal("broker crashed".into()).is_disconnecting());
    }

    #[test]
    fn message_level_failures_do_not_trigger_reconnect() {
        assert!(!ConnectionError::Timeout.is_disconnecting());
        assert!(!ConnectionError::Authentication.is_disconnecting());
        assert!(!ConnectionError::Value("bad json".into()).is_disconnecting());
    }
}
