//! Test-only transports for exercising the messaging runtime without real
//! sockets: an in-process loopback pair, a fault-injecting wrapper around
//! it, and a `turmoil`-backed deterministic TCP simulation.
//!
//! Not part of the public contract any application crate depends on; this
//! crate exists purely to give `conduit-core`'s scenario and property tests
//! something to run a [`conduit_core::supervisor::Supervisor`] against.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod fault;
pub mod loopback;
pub mod sim;

pub use fault::{DropPredicate, FaultInjectingTransport};
pub use loopback::LoopbackTransport;
pub use sim::{SimTcpRole, SimTcpTransport};
