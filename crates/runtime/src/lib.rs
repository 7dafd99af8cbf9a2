//! Session lifecycle for a single logical connection to the coordination
//! service.
//!
//! [`NamespaceClient`] owns the authoritative [`SessionState`] and gates every
//! read/write primitive on it. The service itself sits behind the
//! [`Coordinator`] / [`RemoteSession`] seam: [`TcpCoordinator`] speaks the
//! binary wire protocol, [`MemoryCoordinator`] serves an in-process namespace
//! for tests and demos.

pub mod address;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod state;
pub mod watcher;
pub mod wire;

use std::time::Duration;

/// Hard ceiling on a single `connect` attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Session timeout requested from the server.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Outer bound on the automatic reconnect that follows a session expiry.
pub const DEFAULT_RECONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Port the coordination service listens on by default.
pub const DEFAULT_PORT: u16 = 2181;

pub use address::ConnectionDescriptor;
pub use client::NamespaceClient;
pub use config::ClientConfig;
pub use coordinator::{Coordinator, RemoteSession};
pub use error::{Error, Result};
pub use memory::MemoryCoordinator;
pub use state::{DisconnectReason, SessionEvent, SessionState};
pub use watcher::Watcher;
pub use wire::TcpCoordinator;
pub use zkb_protocol as protocol;
