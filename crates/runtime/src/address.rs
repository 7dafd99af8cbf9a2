//! Connection descriptor: where to connect and how long to wait.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;

use crate::error::Error;
use crate::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT};

/// Address of the coordination service plus the connect ceiling.
///
/// Identity is the `(host, port)` pair; the timeout does not participate in
/// equality.
#[derive(Debug, Clone)]
pub struct ConnectionDescriptor {
	pub host: String,
	pub port: u16,
	/// Ceiling for a single connect attempt.
	pub timeout: Duration,
}

impl ConnectionDescriptor {
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			timeout: DEFAULT_CONNECT_TIMEOUT,
		}
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	/// `host:port` form, bracketing IPv6 literals.
	pub fn connect_string(&self) -> String {
		self.to_string()
	}
}

impl PartialEq for ConnectionDescriptor {
	fn eq(&self, other: &Self) -> bool {
		self.host == other.host && self.port == other.port
	}
}

impl Eq for ConnectionDescriptor {}

impl Hash for ConnectionDescriptor {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.host.hash(state);
		self.port.hash(state);
	}
}

impl fmt::Display for ConnectionDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.host.contains(':') {
			write!(f, "[{}]:{}", self.host, self.port)
		} else {
			write!(f, "{}:{}", self.host, self.port)
		}
	}
}

impl FromStr for ConnectionDescriptor {
	type Err = Error;

	/// Parses `host`, `host:port`, or `[v6]:port`. The port defaults to 2181.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(Error::InvalidAddress("empty address".to_string()));
		}

		let (host, port) = if let Some(rest) = s.strip_prefix('[') {
			let (host, tail) = rest
				.split_once(']')
				.ok_or_else(|| Error::InvalidAddress(format!("unterminated IPv6 literal: {s}")))?;
			match tail.strip_prefix(':') {
				Some(port) => (host, Some(port)),
				None if tail.is_empty() => (host, None),
				None => return Err(Error::InvalidAddress(format!("unexpected text after IPv6 literal: {s}"))),
			}
		} else {
			match s.rsplit_once(':') {
				Some((host, port)) if !host.contains(':') => (host, Some(port)),
				Some(_) => return Err(Error::InvalidAddress(format!("IPv6 literals must be bracketed: {s}"))),
				None => (s, None),
			}
		};

		if host.is_empty() {
			return Err(Error::InvalidAddress(format!("missing host: {s}")));
		}

		let port = match port {
			Some(port) => port.parse::<u16>().map_err(|_| Error::InvalidAddress(format!("invalid port in {s}")))?,
			None => DEFAULT_PORT,
		};

		Ok(Self::new(host, port))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_host_and_port() {
		let desc: ConnectionDescriptor = "zk1.internal:2182".parse().unwrap();
		assert_eq!(desc.host, "zk1.internal");
		assert_eq!(desc.port, 2182);
		assert_eq!(desc.timeout, DEFAULT_CONNECT_TIMEOUT);
	}

	#[test]
	fn port_defaults_when_missing() {
		let desc: ConnectionDescriptor = "localhost".parse().unwrap();
		assert_eq!(desc.port, DEFAULT_PORT);
		assert_eq!(desc.to_string(), "localhost:2181");
	}

	#[test]
	fn parses_bracketed_ipv6() {
		let desc: ConnectionDescriptor = "[::1]:2190".parse().unwrap();
		assert_eq!(desc.host, "::1");
		assert_eq!(desc.port, 2190);
		assert_eq!(desc.connect_string(), "[::1]:2190");
	}

	#[test]
	fn rejects_malformed_addresses() {
		assert!("".parse::<ConnectionDescriptor>().is_err());
		assert!(":2181".parse::<ConnectionDescriptor>().is_err());
		assert!("host:notaport".parse::<ConnectionDescriptor>().is_err());
		assert!("::1:2181".parse::<ConnectionDescriptor>().is_err());
	}

	#[test]
	fn identity_ignores_timeout() {
		let a = ConnectionDescriptor::new("h", 1).with_timeout(Duration::from_secs(1));
		let b = ConnectionDescriptor::new("h", 1).with_timeout(Duration::from_secs(9));
		assert_eq!(a, b);
		assert_ne!(a, ConnectionDescriptor::new("h", 2));
	}
}
