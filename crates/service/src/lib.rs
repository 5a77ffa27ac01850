//! Session bookkeeping for the broker server.
//!
//! This crate knows nothing about the wire protocol's byte layout or
//! about how sockets are read from; it owns only the registry of live
//! sessions, the liveness ("hp") watchdog, and the handoff mechanism
//! used to move an accepted socket from the task that received it to
//! the task waiting to splice it.

pub mod session;

pub use session::{Error, Registry, Role, Session, SessionId, spawn_watchdog};
