//! Transport-agnostic messaging runtime core.
//!
//! This crate sits between application code and a concrete transport
//! implementation (`conduit-transport`). It owns the worker pair that
//! drains/frames a link, the connection supervisor that drives the
//! connect/run/reconnect lifecycle, and the retransmission subsystem that
//! recovers packets dropped by a sequenced binary-framed link.
//!
//! # Layering
//!
//! - [`value`]: the `SendValue`/`ReceiveValue` contracts an application's
//!   message types must satisfy, and [`data_package::DataPackage`], the
//!   triple that parameterises a [`supervisor::Supervisor`].
//! - [`transport`]: the request/response and publish/subscribe contracts a
//!   concrete link implementation satisfies.
//! - [`queue`]: the bounded outbound queue.
//! - [`sync_gen`], [`gap_detector`], [`packet_buffer`]: the primitives the
//!   retransmission subsystem composes.
//! - [`retransmission`]: binds those primitives to a supervisor in a
//!   server or client role.
//! - [`worker`]: the listener and requester tasks.
//! - [`events`]: the application-facing callback contract.
//! - [`supervisor`]: the per-link coordinator that owns everything above.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod data_package;
pub mod error;
pub mod events;
pub mod gap_detector;
pub mod packet_buffer;
pub mod queue;
pub mod retransmission;
pub mod supervisor;
pub mod sync_gen;
pub mod transport;
pub mod value;
pub mod worker;

pub use data_package::DataPackage;
pub use error::{ConfigError, ConnectionError};
pub use events::EventSink;
pub use gap_detector::GapDetector;
pub use packet_buffer::PacketBuffer;
pub use queue::{outbound_queue, OutboundReceiver, OutboundSender};
pub use retransmission::{ClientRetransmission, Retransmission, RetransmissionRole, ServerRetransmission};
pub use supervisor::{Supervisor, SupervisorConfig};
pub use sync_gen::SyncNumberGenerator;
pub use value::{PubSubSendValue, ReceiveValue, SendValue};
