//! The listener and requester worker pair.
//!
//! Each lives on its own `tokio` task, driven purely by a shared
//! `stop_flag`, and reports every outcome through a shared
//! [`crate::events::EventSink`].

pub mod listener;
pub mod requester;

pub use listener::{Listener, ListenerConfig};
pub use requester::{control_channel, ControlReceiver, ControlSender, Requester, RequesterConfig};
