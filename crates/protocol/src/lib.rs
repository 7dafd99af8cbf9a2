//! Data types for the coordination-service namespace.
//!
//! This crate contains the serde-serializable shapes exchanged between the
//! namespace client, the tree synchronizer, and presentation layers: node
//! metadata, payloads, ACL records, create modes, watcher states, and the
//! server's error codes.
//!
//! Types in this crate are pure data. Session handling and wire encoding live
//! in `zkb-runtime`.

pub mod acl;
pub mod code;
pub mod event;
pub mod mode;
pub mod path;
pub mod payload;
pub mod stat;

pub use acl::*;
pub use code::ErrorCode;
pub use event::KeeperState;
pub use mode::CreateMode;
pub use path::{PathError, ROOT_PATH, child_path, last_segment, parent_path, validate_path};
pub use payload::NodePayload;
pub use stat::NodeStat;
