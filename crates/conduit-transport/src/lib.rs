//! Concrete link implementations for the conduit messaging runtime.
//!
//! `conduit-core` specifies the [`conduit_core::transport::ReqResTransport`]
//! / [`conduit_core::transport::PubSubTransport`] contracts and treats
//! concrete links as an external collaborator; this crate supplies three of
//! them, plus the network configuration parser that selects and builds one
//! from a plain string map.
//!
//! - [`tcp`]: a request/response transport in `client` or `server` role.
//! - [`serial`] (feature `serial`): a request/response transport over a
//!   serial line.
//! - [`mqtt`] (feature `mqtt`): a publish/subscribe transport over an MQTT
//!   broker connection.
//! - [`config`]: [`config::NetworkConfig`], the case-insensitive,
//!   type-coercing parameter map §6 specifies.
//! - [`factory`]: [`factory::NetworkTransportFactory`], which dispatches a
//!   `NetworkConfig`'s `method` key to one of the above.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod factory;
pub mod tcp;

#[cfg(feature = "serial")]
pub mod serial;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use config::NetworkConfig;
pub use factory::NetworkTransportFactory;
pub use tcp::{TcpRole, TcpTransport, TcpTransportConfig};
