//! Per-invocation settings and server resolution.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use zkb::runtime::{ConnectionDescriptor, Coordinator, TcpCoordinator};
use zkb::{BrowseSession, SessionConfig};

use crate::cli::GlobalArgs;
use crate::error::{CliError, Result};
use crate::output::OutputFormat;
use crate::profiles::{PROFILES_ENV, ProfileStore};

/// Environment variable naming the server when no flag is given.
pub const SERVER_ENV: &str = "ZKB_SERVER";

/// Where the target server came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerSource {
	Flag,
	Env,
	Profile(String),
	DefaultProfile(String),
}

pub struct CommandContext {
	pub format: OutputFormat,
	server: Option<String>,
	env_server: Option<String>,
	profile: Option<String>,
	profiles_path: PathBuf,
	timeout: Option<Duration>,
	coordinator: Arc<dyn Coordinator>,
}

impl CommandContext {
	/// Builds the context from flags and the process environment.
	pub fn new(args: GlobalArgs) -> Self {
		let env_server = std::env::var(SERVER_ENV).ok().filter(|value| !value.trim().is_empty());
		let env_profiles = std::env::var_os(PROFILES_ENV).map(PathBuf::from);
		Self::from_parts(args, env_server, env_profiles)
	}

	pub fn from_parts(args: GlobalArgs, env_server: Option<String>, env_profiles: Option<PathBuf>) -> Self {
		let profiles_path = args.profiles.or(env_profiles).unwrap_or_else(ProfileStore::default_path);
		Self {
			format: args.format,
			server: args.server,
			env_server,
			profile: args.profile,
			profiles_path,
			timeout: args.timeout.map(Duration::from_secs),
			coordinator: Arc::new(TcpCoordinator::new()),
		}
	}

	/// Replaces the transport used to open sessions.
	pub fn with_coordinator(mut self, coordinator: Arc<dyn Coordinator>) -> Self {
		self.coordinator = coordinator;
		self
	}

	pub fn profiles_path(&self) -> &Path {
		&self.profiles_path
	}

	/// Resolves the target: `--server`, then the environment, then
	/// `--profile`, then the default profile.
	pub fn resolve_server(&self) -> Result<(ConnectionDescriptor, ServerSource)> {
		let (descriptor, source) = if let Some(server) = &self.server {
			(server.parse::<ConnectionDescriptor>()?, ServerSource::Flag)
		} else if let Some(server) = &self.env_server {
			(server.parse::<ConnectionDescriptor>()?, ServerSource::Env)
		} else {
			let store = ProfileStore::load(&self.profiles_path);
			match &self.profile {
				Some(alias) => {
					let profile = store.get(alias).ok_or_else(|| CliError::UnknownProfile(alias.clone()))?;
					(profile.descriptor(), ServerSource::Profile(alias.clone()))
				}
				None => {
					let profile = store.default_profile().ok_or(CliError::NoServer)?;
					(profile.descriptor(), ServerSource::DefaultProfile(profile.alias.clone()))
				}
			}
		};

		let descriptor = match self.timeout {
			Some(timeout) => descriptor.with_timeout(timeout),
			None => descriptor,
		};
		debug!(target = "zkb.cli", server = %descriptor, source = ?source, "resolved server");
		Ok((descriptor, source))
	}

	/// An unconnected session over the configured transport.
	pub fn new_session(&self) -> BrowseSession {
		BrowseSession::new(Arc::clone(&self.coordinator), SessionConfig::default())
	}

	/// Connects a fresh browse session to the resolved server.
	pub async fn open_session(&self) -> Result<BrowseSession> {
		let (descriptor, _) = self.resolve_server()?;
		let session = self.new_session();
		let address = descriptor.to_string();
		session.connect(descriptor).await?;
		info!(target = "zkb.cli", %address, state = %session.state(), "connected");
		Ok(session)
	}
}

#[cfg(test)]
mod tests {
	use std::fs;

	use tempfile::TempDir;

	use super::*;

	fn args(profiles: &Path) -> GlobalArgs {
		GlobalArgs {
			profiles: Some(profiles.to_path_buf()),
			..Default::default()
		}
	}

	fn write_profiles(dir: &TempDir) -> PathBuf {
		let path = dir.path().join("profiles.json");
		fs::write(
			&path,
			r#"[{"alias":"local","host":"localhost","port":2181,"isDefault":false},
			    {"alias":"prod","host":"zk.prod","port":2182,"isDefault":true}]"#,
		)
		.unwrap();
		path
	}

	#[test]
	fn flag_beats_environment_and_profiles() {
		let tmp = TempDir::new().unwrap();
		let path = write_profiles(&tmp);
		let ctx = CommandContext::from_parts(
			GlobalArgs {
				server: Some("flag-host:1000".into()),
				profile: Some("prod".into()),
				..args(&path)
			},
			Some("env-host:2000".into()),
			None,
		);
		let (descriptor, source) = ctx.resolve_server().unwrap();
		assert_eq!(descriptor.to_string(), "flag-host:1000");
		assert_eq!(source, ServerSource::Flag);
	}

	#[test]
	fn environment_beats_profiles() {
		let tmp = TempDir::new().unwrap();
		let path = write_profiles(&tmp);
		let ctx = CommandContext::from_parts(
			GlobalArgs {
				profile: Some("prod".into()),
				..args(&path)
			},
			Some("env-host".into()),
			None,
		);
		let (descriptor, source) = ctx.resolve_server().unwrap();
		assert_eq!(descriptor.to_string(), "env-host:2181");
		assert_eq!(source, ServerSource::Env);
	}

	#[test]
	fn named_profile_then_default_profile() {
		let tmp = TempDir::new().unwrap();
		let path = write_profiles(&tmp);

		let named = CommandContext::from_parts(
			GlobalArgs {
				profile: Some("local".into()),
				..args(&path)
			},
			None,
			None,
		);
		assert_eq!(named.resolve_server().unwrap().0.to_string(), "localhost:2181");

		let fallback = CommandContext::from_parts(args(&path), None, None);
		let (descriptor, source) = fallback.resolve_server().unwrap();
		assert_eq!(descriptor.to_string(), "zk.prod:2182");
		assert_eq!(source, ServerSource::DefaultProfile("prod".into()));
	}

	#[test]
	fn unknown_profile_and_bad_address_fail() {
		let tmp = TempDir::new().unwrap();
		let path = write_profiles(&tmp);
		let ctx = CommandContext::from_parts(
			GlobalArgs {
				profile: Some("missing".into()),
				..args(&path)
			},
			None,
			None,
		);
		assert!(matches!(ctx.resolve_server(), Err(CliError::UnknownProfile(_))));

		let ctx = CommandContext::from_parts(
			GlobalArgs {
				server: Some("host:notaport".into()),
				..args(&path)
			},
			None,
			None,
		);
		assert!(matches!(ctx.resolve_server(), Err(CliError::Client(_))));
	}

	#[test]
	fn timeout_flag_sets_connect_ceiling() {
		let tmp = TempDir::new().unwrap();
		let ctx = CommandContext::from_parts(
			GlobalArgs {
				server: Some("h".into()),
				timeout: Some(3),
				..args(&tmp.path().join("p.json"))
			},
			None,
			None,
		);
		assert_eq!(ctx.resolve_server().unwrap().0.timeout, Duration::from_secs(3));
	}

	#[test]
	fn profiles_flag_beats_environment_path() {
		let ctx = CommandContext::from_parts(args(Path::new("/tmp/flag.json")), None, Some(PathBuf::from("/tmp/env.json")));
		assert_eq!(ctx.profiles_path(), Path::new("/tmp/flag.json"));

		let ctx = CommandContext::from_parts(GlobalArgs::default(), None, Some(PathBuf::from("/tmp/env.json")));
		assert_eq!(ctx.profiles_path(), Path::new("/tmp/env.json"));
	}
}
