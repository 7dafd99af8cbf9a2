//! `profile list|add|remove|default`.

use zkb::runtime::ConnectionDescriptor;

use crate::context::CommandContext;
use crate::error::Result;
use crate::output::{ProfileChange, ProfileList};
use crate::profiles::{Profile, ProfileStore};

pub fn list(ctx: &CommandContext) -> Result<ProfileList> {
	let store = ProfileStore::load(ctx.profiles_path());
	Ok(ProfileList {
		path: store.path().display().to_string(),
		profiles: store.profiles().to_vec(),
	})
}

pub fn add(ctx: &CommandContext, alias: String, server: &str, default: bool) -> Result<ProfileChange> {
	let descriptor: ConnectionDescriptor = server.parse()?;
	let mut store = ProfileStore::load_strict(ctx.profiles_path())?;
	let mut profile = Profile::new(alias, &descriptor);
	profile.is_default = default;
	let profile = store.add(profile)?.clone();
	store.save()?;
	Ok(ProfileChange { action: "added", profile })
}

pub fn remove(ctx: &CommandContext, alias: &str) -> Result<ProfileChange> {
	let mut store = ProfileStore::load_strict(ctx.profiles_path())?;
	let profile = store.remove(alias)?;
	store.save()?;
	Ok(ProfileChange { action: "removed", profile })
}

pub fn set_default(ctx: &CommandContext, alias: &str) -> Result<ProfileChange> {
	let mut store = ProfileStore::load_strict(ctx.profiles_path())?;
	let profile = store.set_default(alias)?.clone();
	store.save()?;
	Ok(ProfileChange { action: "default", profile })
}
