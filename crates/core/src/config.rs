//! Browse session configuration.

use zkb_runtime::ClientConfig;

use crate::DEFAULT_WORKERS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
	/// Settings for the owned namespace client.
	pub client: ClientConfig,
	/// Upper bound on concurrent network operations.
	pub workers: usize,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			client: ClientConfig::default(),
			workers: DEFAULT_WORKERS,
		}
	}
}

impl SessionConfig {
	pub fn with_client(mut self, client: ClientConfig) -> Self {
		self.client = client;
		self
	}

	/// Sets the worker count; values below one are raised to one.
	pub fn with_workers(mut self, workers: usize) -> Self {
		self.workers = workers.max(1);
		self
	}
}
