//! Workspace identifier validation.
//!
//! Every workspace name that arrives from outside the process goes through
//! [`normalize`] before it is used as a registry key or joined onto the
//! storage root. The allowed alphabet has no path separators and no dots, so a
//! valid [`WorkspaceId`] can never escape its parent directory.

use crate::error::{GraphspaceError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::path::Path;

/// Workspace used when a caller does not name one.
pub const DEFAULT_WORKSPACE: &str = "default";

/// Longest accepted workspace name, in characters.
pub const MAX_WORKSPACE_LEN: usize = 64;

pub const WORKSPACE_PATTERN: &str = r"^[A-Za-z0-9_-]{1,64}$";

static WORKSPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(WORKSPACE_PATTERN).expect("workspace pattern is a valid regex"));

/// A validated workspace name.
///
/// Only constructible through [`normalize`], [`WorkspaceId::parse`] or
/// [`WorkspaceId::default_workspace`], so holding one proves the name matches
/// [`WORKSPACE_PATTERN`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Validate a concrete workspace name. Unlike [`normalize`], an empty
    /// string is rejected rather than mapped to the default workspace.
    pub fn parse(name: &str) -> Result<Self> {
        if name.chars().count() > MAX_WORKSPACE_LEN {
            return Err(GraphspaceError::InvalidWorkspace {
                name: name.to_string(),
                reason: format!("longer than {} characters", MAX_WORKSPACE_LEN),
            });
        }
        if !WORKSPACE_RE.is_match(name) {
            return Err(GraphspaceError::InvalidWorkspace {
                name: name.to_string(),
                reason: format!("must match pattern {}", WORKSPACE_PATTERN),
            });
        }
        Ok(WorkspaceId(name.to_string()))
    }

    pub fn default_workspace() -> Self {
        WorkspaceId(DEFAULT_WORKSPACE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_WORKSPACE
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Normalize a raw workspace name from a request.
///
/// `None`, `""` and whitespace-only input map to [`DEFAULT_WORKSPACE`].
/// Anything else is trimmed and must match [`WORKSPACE_PATTERN`].
pub fn normalize(raw: Option<&str>) -> Result<WorkspaceId> {
    let trimmed = match raw {
        None => return Ok(WorkspaceId::default_workspace()),
        Some(s) => s.trim(),
    };
    if trimmed.is_empty() {
        return Ok(WorkspaceId::default_workspace());
    }
    WorkspaceId::parse(trimmed)
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for WorkspaceId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for WorkspaceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for WorkspaceId {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl Borrow<str> for WorkspaceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for WorkspaceId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for WorkspaceId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::str::FromStr for WorkspaceId {
    type Err = GraphspaceError;

    fn from_str(s: &str) -> Result<Self> {
        WorkspaceId::parse(s)
    }
}

impl<'de> Deserialize<'de> for WorkspaceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        WorkspaceId::parse(&raw).map_err(serde::de::Error::custom)
    }
}
