//! Saved connection profiles.
//!
//! Profiles live in a pretty-printed JSON array. A missing or unreadable file
//! yields a store holding only the `local` profile, so the CLI always has a
//! server to fall back to.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zkb::runtime::{ConnectionDescriptor, DEFAULT_PORT};

use crate::error::{CliError, Result};

/// Environment variable overriding the store location.
pub const PROFILES_ENV: &str = "ZKB_PROFILES";

const LOCAL_ALIAS: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
	pub alias: String,
	pub host: String,
	pub port: u16,
	#[serde(default)]
	pub is_default: bool,
}

impl Profile {
	pub fn new(alias: impl Into<String>, descriptor: &ConnectionDescriptor) -> Self {
		Self {
			alias: alias.into(),
			host: descriptor.host.clone(),
			port: descriptor.port,
			is_default: false,
		}
	}

	pub fn descriptor(&self) -> ConnectionDescriptor {
		ConnectionDescriptor::new(self.host.clone(), self.port)
	}

	/// Profiles are the same server when host and port match.
	pub fn same_server(&self, other: &Profile) -> bool {
		self.host == other.host && self.port == other.port
	}

	fn local() -> Self {
		Self {
			alias: LOCAL_ALIAS.to_string(),
			host: "localhost".to_string(),
			port: DEFAULT_PORT,
			is_default: true,
		}
	}
}

#[derive(Debug)]
pub struct ProfileStore {
	path: PathBuf,
	profiles: Vec<Profile>,
}

impl ProfileStore {
	/// `<config dir>/zkb/profiles.json`, or a file in the working directory
	/// when the platform has no config dir.
	pub fn default_path() -> PathBuf {
		match dirs::config_dir() {
			Some(dir) => dir.join("zkb").join("profiles.json"),
			None => PathBuf::from("zkb-profiles.json"),
		}
	}

	/// Loads the store at `path`, falling back to the built-in profile.
	pub fn load(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let profiles = match fs::read_to_string(&path) {
			Ok(raw) => match serde_json::from_str::<Vec<Profile>>(&raw) {
				Ok(profiles) => {
					debug!(target = "zkb.cli", path = %path.display(), count = profiles.len(), "loaded profiles");
					profiles
				}
				Err(err) => {
					warn!(target = "zkb.cli", path = %path.display(), error = %err, "profile store unreadable; using defaults");
					vec![Profile::local()]
				}
			},
			Err(_) => vec![Profile::local()],
		};
		Self { path, profiles }
	}

	/// Like [`load`](Self::load) but fails on a corrupt file instead of
	/// replacing it. Used before writing.
	pub fn load_strict(path: impl Into<PathBuf>) -> Result<Self> {
		let path = path.into();
		let profiles = match fs::read_to_string(&path) {
			Ok(raw) => serde_json::from_str(&raw).map_err(|source| CliError::ProfileStore { path: path.clone(), source })?,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => vec![Profile::local()],
			Err(err) => return Err(err.into()),
		};
		Ok(Self { path, profiles })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn profiles(&self) -> &[Profile] {
		&self.profiles
	}

	pub fn get(&self, alias: &str) -> Option<&Profile> {
		self.profiles.iter().find(|profile| profile.alias == alias)
	}

	pub fn default_profile(&self) -> Option<&Profile> {
		self.profiles.iter().find(|profile| profile.is_default)
	}

	/// Adds a profile. The first profile, or one flagged default, becomes the
	/// only default.
	pub fn add(&mut self, mut profile: Profile) -> Result<&Profile> {
		if self.get(&profile.alias).is_some() {
			return Err(CliError::ProfileExists(profile.alias));
		}
		if let Some(existing) = self.profiles.iter().find(|other| other.same_server(&profile)) {
			return Err(CliError::DuplicateServer {
				existing: existing.alias.clone(),
				server: profile.descriptor().to_string(),
			});
		}

		if self.default_profile().is_none() {
			profile.is_default = true;
		}
		if profile.is_default {
			self.clear_default();
		}
		self.profiles.push(profile);
		Ok(&self.profiles[self.profiles.len() - 1])
	}

	/// Removes a profile. When it was the default, the first remaining
	/// profile takes over.
	pub fn remove(&mut self, alias: &str) -> Result<Profile> {
		let index = self
			.profiles
			.iter()
			.position(|profile| profile.alias == alias)
			.ok_or_else(|| CliError::UnknownProfile(alias.to_string()))?;
		let removed = self.profiles.remove(index);
		if removed.is_default {
			if let Some(next) = self.profiles.first_mut() {
				next.is_default = true;
			}
		}
		Ok(removed)
	}

	pub fn set_default(&mut self, alias: &str) -> Result<&Profile> {
		let index = self
			.profiles
			.iter()
			.position(|profile| profile.alias == alias)
			.ok_or_else(|| CliError::UnknownProfile(alias.to_string()))?;
		self.clear_default();
		self.profiles[index].is_default = true;
		Ok(&self.profiles[index])
	}

	pub fn save(&self) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			if !parent.as_os_str().is_empty() {
				fs::create_dir_all(parent)?;
			}
		}
		let json = serde_json::to_string_pretty(&self.profiles)?;
		fs::write(&self.path, json)?;
		debug!(target = "zkb.cli", path = %self.path.display(), count = self.profiles.len(), "saved profiles");
		Ok(())
	}

	fn clear_default(&mut self) {
		for profile in &mut self.profiles {
			profile.is_default = false;
		}
	}
}
