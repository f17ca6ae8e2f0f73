//! Dispatches a [`NetworkConfig`] to a concrete transport, mirroring
//! `original_source/app/manager/protocol_factory.py#create_protocol`: reads
//! the `method` key, validates the required keys for that family, and
//! builds the matching transport. Implements
//! [`conduit_core::supervisor::TransportFactory`] so a
//! [`NetworkTransportFactory`] can be handed directly to a
//! [`conduit_core::supervisor::SupervisorConfig`].

use std::sync::Arc;
use std::time::Duration;

use conduit_core::error::ConfigError;
use conduit_core::supervisor::{TransportFactory, TransportKind};

use crate::config::NetworkConfig;
use crate::tcp::{TcpRole, TcpTransport, TcpTransportConfig};

#[cfg(feature = "serial")]
use crate::serial::{SerialTransport, SerialTransportConfig};

#[cfg(feature = "mqtt")]
use crate::mqtt::{MqttTransport, MqttTransportConfig};

/// Default connect/read/send timeout, in seconds, when `timeout` is absent.
const DEFAULT_TIMEOUT_SECS: f64 = 5.0;
/// Default MQTT keepalive, in seconds, when `keepalive` is absent.
const DEFAULT_KEEPALIVE_SECS: i64 = 60;

enum TransportChoice {
    Tcp(TcpTransportConfig),
    #[cfg(feature = "serial")]
    Serial(SerialTransportConfig),
    #[cfg(feature = "mqtt")]
    Mqtt(MqttTransportConfig),
}

/// Builds a fresh concrete transport instance from a [`NetworkConfig`] on
/// every `create()` call (i.e. on every supervisor connect attempt).
pub struct NetworkTransportFactory {
    choice: TransportChoice,
}

impl NetworkTransportFactory {
    /// Parses `config`'s `method` key and the keys that family requires.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] if `method` or a family-specific
    /// required key is absent, [`ConfigError::InvalidValue`] if a present
    /// key has the wrong shape, or [`ConfigError::UnsupportedMethod`] if
    /// `method` does not name a known family (or names one whose cargo
    /// feature is not enabled in this build).
    pub fn from_config(config: &NetworkConfig) -> Result<Self, ConfigError> {
        let method = config.get_string("method")?.to_lowercase();
        let choice = match method.as_str() {
            "tcp" => TransportChoice::Tcp(tcp_config_from(config)?),
            "serial" => serial_choice(config)?,
            "mqtt" => mqtt_choice(config)?,
            other => return Err(ConfigError::UnsupportedMethod(other.to_owned())),
        };
        Ok(Self { choice })
    }
}

impl TransportFactory for NetworkTransportFactory {
    fn create(&self) -> TransportKind {
        match &self.choice {
            TransportChoice::Tcp(config) => TransportKind::ReqRes(Arc::new(TcpTransport::new(config.clone()))),
            #[cfg(feature = "serial")]
            TransportChoice::Serial(config) => TransportKind::ReqRes(Arc::new(SerialTransport::new(config.clone()))),
            #[cfg(feature = "mqtt")]
            TransportChoice::Mqtt(config) => TransportKind::PubSub(Arc::new(MqttTransport::new(config.clone()))),
        }
    }
}

fn tcp_config_from(config: &NetworkConfig) -> Result<TcpTransportConfig, ConfigError> {
    config.require_all(&["host", "port"])?;
    let role = config.get_string("role").unwrap_or_else(|_| "client".to_owned()).to_lowercase();
    let role = match role.as_str() {
        "client" => TcpRole::Client,
        "server" => TcpRole::Server,
        other => {
            return Err(ConfigError::InvalidValue {
                key: "role".to_owned(),
                reason: format!("expected `client` or `server`, got `{other}`"),
            })
        },
    };
    Ok(TcpTransportConfig {
        role,
        host: config.get_string("host")?,
        port: port_from(config)?,
        timeout: timeout_from(config)?,
    })
}

fn port_from(config: &NetworkConfig) -> Result<u16, ConfigError> {
    let port = config.get_int("port")?;
    u16::try_from(port)
        .map_err(|_| ConfigError::InvalidValue { key: "port".to_owned(), reason: format!("{port} is out of range for a port") })
}

fn timeout_from(config: &NetworkConfig) -> Result<Duration, ConfigError> {
    let secs = config.get_float_or("timeout", DEFAULT_TIMEOUT_SECS)?;
    if secs <= 0.0 {
        return Err(ConfigError::InvalidValue { key: "timeout".to_owned(), reason: "must be positive".to_owned() });
    }
    Ok(Duration::from_secs_f64(secs))
}

#[cfg(feature = "serial")]
fn serial_choice(config: &NetworkConfig) -> Result<TransportChoice, ConfigError> {
    config.require_all(&["port_name", "baud_rate"])?;
    Ok(TransportChoice::Serial(SerialTransportConfig {
        port_name: config.get_string("port_name")?,
        baud_rate: u32::try_from(config.get_int("baud_rate")?)
            .map_err(|_| ConfigError::InvalidValue { key: "baud_rate".to_owned(), reason: "must be a positive integer".to_owned() })?,
        timeout: timeout_from(config)?,
    }))
}

#[cfg(not(feature = "serial"))]
fn serial_choice(_config: &NetworkConfig) -> Result<TransportChoice, ConfigError> {
    Err(ConfigError::UnsupportedMethod("serial".to_owned()))
}

#[cfg(feature = "mqtt")]
fn mqtt_choice(config: &NetworkConfig) -> Result<TransportChoice, ConfigError> {
    config.require_all(&["broker_address", "port"])?;
    let keepalive_secs = config.get_int_or("keepalive", DEFAULT_KEEPALIVE_SECS)?;
    let client_id = config.get_string("client_id").unwrap_or_else(|_| format!("conduit-mqtt-{}", std::process::id()));
    Ok(TransportChoice::Mqtt(MqttTransportConfig {
        broker_address: config.get_string("broker_address")?,
        port: port_from(config)?,
        keepalive: Duration::from_secs(keepalive_secs.max(0) as u64),
        client_id,
    }))
}

#[cfg(not(feature = "mqtt"))]
fn mqtt_choice(_config: &NetworkConfig) -> Result<TransportChoice, ConfigError> {
    Err(ConfigError::UnsupportedMethod("mqtt".to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> NetworkConfig {
        NetworkConfig::new(pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())))
    }

    #[test]
    fn missing_method_is_a_config_error() {
        let cfg = config(&[]);
        assert_eq!(NetworkTransportFactory::from_config(&cfg).err(), Some(ConfigError::MissingKey("method".to_owned())));
    }

    #[test]
    fn unknown_method_is_rejected() {
        let cfg = config(&[("method", "carrier-pigeon")]);
        assert_eq!(
            NetworkTransportFactory::from_config(&cfg).err(),
            Some(ConfigError::UnsupportedMethod("carrier-pigeon".to_owned()))
        );
    }

    #[test]
    fn tcp_requires_host_and_port() {
        let cfg = config(&[("method", "tcp")]);
        assert!(matches!(NetworkTransportFactory::from_config(&cfg), Err(ConfigError::MissingKey(_))));
    }

    #[test]
    fn tcp_defaults_role_to_client() {
        let cfg = config(&[("method", "tcp"), ("host", "localhost"), ("port", "9000")]);
        assert!(NetworkTransportFactory::from_config(&cfg).is_ok());
    }

    #[test]
    fn tcp_rejects_an_unknown_role() {
        let cfg = config(&[("method", "tcp"), ("host", "localhost"), ("port", "9000"), ("role", "peer")]);
        assert!(matches!(NetworkTransportFactory::from_config(&cfg), Err(ConfigError::InvalidValue { .. })));
    }
}
