//! Session watcher callback handed to a coordinator when a session opens.

use std::fmt;
use std::sync::Arc;

use zkb_protocol::KeeperState;

/// Callback through which an underlying session reports state changes.
///
/// Coordinators may invoke it from any task or thread; the receiving side is
/// responsible for synchronization.
#[derive(Clone)]
pub struct Watcher {
	notify: Arc<dyn Fn(KeeperState) + Send + Sync>,
}

impl Watcher {
	pub fn new(notify: impl Fn(KeeperState) + Send + Sync + 'static) -> Self {
		Self { notify: Arc::new(notify) }
	}

	pub fn notify(&self, state: KeeperState) {
		(self.notify)(state)
	}
}

impl fmt::Debug for Watcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Watcher").finish_non_exhaustive()
	}
}
