//! Browse a ZooKeeper-style coordination namespace incrementally.
//!
//! A [`BrowseSession`] binds one [`NamespaceClient`] to one
//! [`TreeSynchronizer`]: connecting loads the root's children, each
//! [`expand`](BrowseSession::expand) materializes one more level, and a
//! disconnect discards the local tree. Network work runs on a bounded pool of
//! tokio tasks; tree changes are announced as [`TreeEvent`]s.
//!
//! ```ignore
//! use std::sync::Arc;
//! use zkb::{BrowseSession, SessionConfig, runtime::{ConnectionDescriptor, TcpCoordinator}};
//!
//! let session = BrowseSession::new(Arc::new(TcpCoordinator::new()), SessionConfig::default());
//! session.connect("localhost:2181".parse()?).await?;
//! for child in session.expand(&session.tree().root()).await? {
//!     println!("{}", child.path());
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod node;
pub mod session;
pub mod tree;

/// Default number of concurrent network operations per session.
pub const DEFAULT_WORKERS: usize = 5;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use events::TreeEvent;
pub use node::{LoadStatus, NodeRef, NodeView};
pub use session::{BrowseSession, ExpandRequest};
pub use tree::TreeSynchronizer;
pub use zkb_runtime::{self as runtime, NamespaceClient, SessionState, protocol};
