//! Helpers for `/`-delimited node paths.

use thiserror::Error;

/// Path of the namespace root.
pub const ROOT_PATH: &str = "/";

/// Reasons a node path is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
	#[error("path is empty")]
	Empty,
	#[error("path must start with '/': {0}")]
	NotAbsolute(String),
	#[error("path must not end with '/': {0}")]
	TrailingSlash(String),
	#[error("path contains an empty segment: {0}")]
	EmptySegment(String),
	#[error("path contains a relative segment: {0}")]
	RelativeSegment(String),
	#[error("path contains a NUL character")]
	NulCharacter,
}

/// Validates an absolute node path.
pub fn validate_path(path: &str) -> Result<(), PathError> {
	if path.is_empty() {
		return Err(PathError::Empty);
	}
	if !path.starts_with('/') {
		return Err(PathError::NotAbsolute(path.to_string()));
	}
	if path == ROOT_PATH {
		return Ok(());
	}
	if path.ends_with('/') {
		return Err(PathError::TrailingSlash(path.to_string()));
	}
	if path.contains('\0') {
		return Err(PathError::NulCharacter);
	}
	for segment in path[1..].split('/') {
		match segment {
			"" => return Err(PathError::EmptySegment(path.to_string())),
			"." | ".." => return Err(PathError::RelativeSegment(path.to_string())),
			_ => {}
		}
	}
	Ok(())
}

/// Joins a child name onto its parent's path.
///
/// Children of the root are `/name`, never `//name`.
pub fn child_path(parent: &str, name: &str) -> String {
	if parent == ROOT_PATH {
		format!("/{name}")
	} else {
		format!("{parent}/{name}")
	}
}

/// Returns the parent path, or `None` for the root.
pub fn parent_path(path: &str) -> Option<&str> {
	if path == ROOT_PATH {
		return None;
	}
	match path.rfind('/') {
		Some(0) => Some(ROOT_PATH),
		Some(idx) => Some(&path[..idx]),
		None => None,
	}
}

/// Display name of a node: its last segment, or `/` for the root.
pub fn last_segment(path: &str) -> &str {
	if path == ROOT_PATH {
		return ROOT_PATH;
	}
	path.rsplit('/').next().unwrap_or(path)
}
